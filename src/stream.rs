//! Streaming conversion API: emit records as their runs settle.
//!
//! Unlike the eager [`crate::convert::convert_files`], which returns only
//! after every run is terminal, [`convert_stream`] yields each
//! [`ImageRecord`] as soon as it reaches `Completed` or `Error`. Records
//! arrive in completion order; sort by position in the input if order
//! matters.

use crate::config::ConverterConfig;
use crate::convert;
use crate::error::AvifError;
use crate::record::ImageRecord;
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of terminal records.
pub type RecordStream = Pin<Box<dyn Stream<Item = ImageRecord> + Send>>;

/// Accept `paths` and return a stream that drives one run per record.
///
/// Nothing is uploaded until the stream is polled; from then on every run
/// is in flight at once unless `config.concurrency` sets a cap.
///
/// # Returns
/// - `Ok(RecordStream)` — one item per accepted file, in completion order
/// - `Err(AvifError)` — fatal intake error (endpoint missing or malformed,
///   input not found, no supported images)
pub async fn convert_stream<P: AsRef<Path>>(
    paths: &[P],
    config: &ConverterConfig,
) -> Result<RecordStream, AvifError> {
    info!("Starting streaming batch of {} input path(s)", paths.len());
    let (surface, intake) = convert::intake(paths, config).await?;
    let s = surface.run_stream(intake.pending);
    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_stream_fails_before_yielding() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        std::fs::write(&png, b"x").unwrap();

        let config = ConverterConfig::default();
        let result = convert_stream(&[&png], &config).await;
        assert!(matches!(result, Err(AvifError::Configuration(_))));
    }
}
