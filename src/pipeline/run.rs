//! One conversion run: drive a single record from `Uploading` to a terminal
//! status.
//!
//! ```text
//! Uploading ─▶ (endpoint check) ─▶ Converting ─▶ ramp 0..100 ─▶ POST
//!                                                               │
//!        ┌───────────────────────────┬──────────────────────────┤
//!   empty body                   JSON body                 non-2xx / bad JSON
//!        │                           │                          │
//!  Completed (no URL,        normalise ─▶ Completed            Error
//!  estimated size, note)
//! ```
//!
//! [`run_conversion`] is the run boundary: every [`ConvertError`] raised
//! inside is caught there and written to the record as its `Error` status,
//! so one bad file never affects another.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::pipeline::input::SourceFile;
use crate::pipeline::normalize::{self, Normalized};
use crate::pipeline::submit;
use crate::record::{estimated_converted_size, ConversionStatus, ConvertedUrl, ImageRecord, RecordId};
use crate::registry::Registry;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Attached to a record when the webhook accepted the file but sent an
/// empty body, so no download location is known.
pub const DEGRADED_MESSAGE: &str = "Webhook processed the image but returned no download URL. \
Configure the workflow to respond with JSON containing the URL, e.g. \
{\"url\": \"https://...\", \"size\": 12345}.";

/// Step size of the synthetic progress ramp.
const RAMP_STEP: usize = 10;

/// Everything a run needs besides its file and id. Shared by all runs of a batch.
#[derive(Clone)]
pub struct RunContext {
    pub registry: Registry,
    pub client: Client,
    pub config: ConverterConfig,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Completion {
    /// Empty body: completed, but without a location.
    Degraded,
    /// JSON body, normalised.
    Converted(Normalized),
}

/// Convert one file and record the outcome on `id`.
///
/// Never fails: errors become the record's `Error` status. Returns the final
/// record, or `None` if the record was removed while the run was in flight.
pub async fn run_conversion(ctx: &RunContext, file: &SourceFile, id: RecordId) -> Option<ImageRecord> {
    match convert_record(ctx, file, &id).await {
        Ok(completion) => {
            let estimate = estimated_converted_size(file.size);
            ctx.registry.update(&id, |r| {
                r.status = ConversionStatus::Completed;
                r.progress = 100;
                match completion {
                    Completion::Degraded => {
                        r.converted_url = ConvertedUrl::Missing;
                        r.converted_size = Some(estimate);
                        r.error = Some(DEGRADED_MESSAGE.to_string());
                    }
                    Completion::Converted(found) => {
                        r.converted_url = ConvertedUrl::from_option(found.url);
                        r.converted_size = Some(found.size.unwrap_or(estimate));
                        r.error = None;
                    }
                }
            });
        }
        Err(e) => {
            warn!("'{}' failed: {}", file.name, e);
            ctx.registry.update(&id, |r| {
                r.status = ConversionStatus::Error;
                r.error = Some(e.to_string());
            });
        }
    }

    let record = ctx.registry.get(&id);
    if let Some(ref r) = record {
        info!("'{}' finished: {:?}", r.original_name, r.status);
    }
    record
}

async fn convert_record(
    ctx: &RunContext,
    file: &SourceFile,
    id: &RecordId,
) -> Result<Completion, ConvertError> {
    // ── Step 1–2: Endpoint ───────────────────────────────────────────────
    let endpoint = ctx.config.endpoint()?;

    // ── Step 3: Converting ───────────────────────────────────────────────
    ctx.registry
        .update(id, |r| r.status = ConversionStatus::Converting);

    // ── Step 4: Synthetic progress ramp ──────────────────────────────────
    let delay = ctx.config.progress_step_delay();
    for progress in (0..=100u8).step_by(RAMP_STEP) {
        sleep(delay).await;
        ctx.registry
            .update(id, |r| r.progress = r.progress.max(progress));
    }

    // ── Step 5–6: Upload ─────────────────────────────────────────────────
    let body = submit::submit(&ctx.client, &endpoint, file).await?;

    // ── Step 7: Empty body is a degraded success ─────────────────────────
    if body.trim().is_empty() {
        debug!("'{}': empty response body", file.name);
        return Ok(Completion::Degraded);
    }

    let payload: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| ConvertError::MalformedResponse {
            detail: e.to_string(),
        })?;

    // ── Step 8–10: Unwrap and normalise ──────────────────────────────────
    let found = normalize::normalize_payload(&payload)?;
    if found.url.is_none() {
        let keys: Vec<&String> = normalize::result_object(&payload)?.keys().collect();
        warn!("'{}': no download URL among fields {:?}", file.name, keys);
    }
    Ok(Completion::Converted(found))
}
