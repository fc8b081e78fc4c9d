//! Error types for the avifhook library.
//!
//! Three error families reflect three distinct failure scopes:
//!
//! * [`AvifError`] — **Fatal** for a whole batch: the intake surface is inert
//!   (no webhook configured), the output directory cannot be created, and so
//!   on. Returned as `Err(AvifError)` from the top-level `convert*` functions.
//!
//! * [`ConvertError`] — **Per file**: one conversion run failed. It never
//!   escapes the run; the pipeline turns it into the record's `Error` status
//!   and every other file carries on.
//!
//! * [`DownloadError`] — **Post-completion**: fetching the converted asset
//!   failed. The downloader handles it by falling back to the next strategy;
//!   the record stays `Completed` because the conversion itself succeeded.

use std::path::PathBuf;
use thiserror::Error;

/// The webhook endpoint is missing or unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No webhook URL was configured.
    #[error(
        "Webhook URL is not configured.\nSet AVIF_WEBHOOK_URL or pass --webhook <URL>."
    )]
    NotConfigured,

    /// A webhook URL was configured but is not an absolute http(s) address.
    #[error("Invalid webhook URL '{url}': {reason}\nExpected an absolute address such as https://...")]
    InvalidEndpoint { url: String, reason: String },
}

/// Broad category of a [`ConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Remote,
    MalformedResponse,
    Io,
}

/// A failure inside a single conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Configuration ─────────────────────────────────────────────────────
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The webhook answered with a non-success HTTP status.
    #[error("Conversion failed (HTTP {status}): {body}")]
    Remote { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, connection reset…).
    #[error("Could not reach the webhook: {reason}")]
    Transport { reason: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// The body was not empty but could not be parsed as JSON.
    #[error("Invalid response from webhook: {detail}\nCheck that the webhook returns valid JSON.")]
    MalformedResponse { detail: String },

    /// Valid JSON, but neither an object nor a list starting with an object.
    #[error("Invalid response format from webhook: expected a JSON object")]
    InvalidResponseFormat,

    // ── I/O ───────────────────────────────────────────────────────────────
    /// The source image could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::Configuration(_) => ErrorKind::Configuration,
            ConvertError::Remote { .. } | ConvertError::Transport { .. } => ErrorKind::Remote,
            ConvertError::MalformedResponse { .. } | ConvertError::InvalidResponseFormat => {
                ErrorKind::MalformedResponse
            }
            ConvertError::ReadFailed { .. } => ErrorKind::Io,
        }
    }
}

/// A failed attempt to retrieve a converted asset.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request could not be sent or the body could not be read.
    #[error("Failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// The server answered, but not with a 2xx status.
    #[error("Fetching '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The bytes arrived but could not be written locally.
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The system browser could not be launched.
    #[error("Failed to open '{url}' in a browser: {reason}")]
    Open { url: String, reason: String },

    /// Every configured strategy failed.
    #[error("All download strategies failed for '{url}':\n{}", attempts.join("\n"))]
    AllStrategiesFailed { url: String, attempts: Vec<String> },
}

/// Fatal errors returned by the batch entry points.
#[derive(Debug, Error)]
pub enum AvifError {
    /// The intake surface is inert because the endpoint is unusable.
    #[error("Configuration required: {0}")]
    Configuration(#[from] ConfigurationError),

    /// None of the given paths could be accepted.
    #[error("No supported images among {rejected} input path(s)\nSupported: {supported}")]
    NoSupportedImages { rejected: usize, supported: String },

    /// A given path does not exist or cannot be listed.
    #[error("Input not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create the directory that receives downloads.
    #[error("Failed to prepare output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display_carries_status() {
        let e = ConvertError::Remote {
            status: 502,
            body: "bad gateway".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("502"), "got: {msg}");
        assert!(msg.contains("bad gateway"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::Remote);
    }

    #[test]
    fn configuration_error_is_transparent() {
        let e: ConvertError = ConfigurationError::NotConfigured.into();
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.to_string().contains("not configured"));
    }

    #[test]
    fn malformed_response_kinds() {
        let e = ConvertError::MalformedResponse {
            detail: "expected value at line 1".into(),
        };
        assert_eq!(e.kind(), ErrorKind::MalformedResponse);
        assert!(e.to_string().contains("Invalid response"));
        assert_eq!(
            ConvertError::InvalidResponseFormat.kind(),
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn all_strategies_failed_lists_attempts() {
        let e = DownloadError::AllStrategiesFailed {
            url: "https://x/y.avif".into(),
            attempts: vec!["blob: 403".into(), "link: 403".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("blob: 403"));
        assert!(msg.contains("link: 403"));
    }
}
