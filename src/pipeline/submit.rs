//! Webhook exchange: upload one image as a multipart form and return the
//! raw response body.
//!
//! This is the only pipeline stage with network I/O. It knows nothing about
//! the response shape; interpreting the body is left to
//! [`crate::pipeline::run`] and [`crate::pipeline::normalize`].

use crate::config::{OUTPUT_FORMAT, OUTPUT_QUALITY};
use crate::error::ConvertError;
use crate::pipeline::input::SourceFile;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Form field carrying the image bytes.
pub const IMAGE_FIELD: &str = "image";

/// Build the HTTP client shared by every run of a batch.
///
/// No cookie store and no auth headers: the webhook is called anonymously.
pub fn build_client(timeout: Option<Duration>) -> Result<Client, ConvertError> {
    let mut builder = Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().map_err(|e| ConvertError::Transport {
        reason: e.to_string(),
    })
}

/// Read the file and assemble the upload form.
///
/// Fields: `image` (bytes, original name, MIME type), `format=avif`,
/// `quality=80`.
pub async fn build_form(file: &SourceFile) -> Result<Form, ConvertError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|source| ConvertError::ReadFailed {
            path: file.path.clone(),
            source,
        })?;

    let part = Part::bytes(bytes)
        .file_name(file.name.clone())
        .mime_str(file.kind.mime_type())
        .map_err(|e| ConvertError::Transport {
            reason: format!("invalid MIME type: {e}"),
        })?;

    Ok(Form::new()
        .part(IMAGE_FIELD, part)
        .text("format", OUTPUT_FORMAT)
        .text("quality", OUTPUT_QUALITY))
}

/// POST `file` to `endpoint` and return the response body text.
///
/// # Errors
/// - [`ConvertError::ReadFailed`] if the file cannot be read
/// - [`ConvertError::Transport`] if no response arrives or the body cannot be read
/// - [`ConvertError::Remote`] for any non-2xx status, with the body text
///   (or `"unknown error"` if even that cannot be read)
pub async fn submit(
    client: &Client,
    endpoint: &Url,
    file: &SourceFile,
) -> Result<String, ConvertError> {
    let form = build_form(file).await?;

    info!("Sending '{}' ({} bytes) to webhook", file.name, file.size);
    let response = client
        .post(endpoint.clone())
        .multipart(form)
        .send()
        .await
        .map_err(|e| ConvertError::Transport {
            reason: e.to_string(),
        })?;

    let status = response.status();
    debug!("Webhook answered {} for '{}'", status, file.name);

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ConvertError::Remote {
            status: status.as_u16(),
            body,
        });
    }

    response.text().await.map_err(|e| ConvertError::Transport {
        reason: format!("failed to read response body: {e}"),
    })
}
