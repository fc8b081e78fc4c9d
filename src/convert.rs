//! Eager (whole-batch) conversion entry points.
//!
//! [`convert_files`] waits for every run to settle and returns the final
//! records in insertion order. Use [`crate::stream::convert_stream`] instead
//! to receive records as they finish.
//!
//! Downloads are a separate step: a finished [`BatchOutput`] can be passed to
//! [`download_all`], or single records to [`download_record`].

use crate::config::ConverterConfig;
use crate::download::{DownloadOutcome, Downloader};
use crate::error::{AvifError, DownloadError};
use crate::output::{BatchOutput, BatchStats};
use crate::pipeline::input::SUPPORTED_EXTENSIONS;
use crate::preview::PreviewStore;
use crate::record::{ConversionStatus, ImageRecord, RecordId};
use crate::registry::Registry;
use crate::surface::{Intake, Surface};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert every supported image among `paths`.
///
/// Directories contribute their immediate files. Unsupported files are
/// listed in `output.rejected` and never uploaded.
///
/// # Returns
/// `Ok(BatchOutput)` once every run is terminal, even if some runs failed
/// (check `output.stats.failed`). Preview handles belong to the batch and are
/// cleared from the returned records.
///
/// # Errors
/// Only fatal errors:
/// - the webhook endpoint is missing or malformed (nothing is uploaded)
/// - an input path does not exist
/// - no input is a supported image
pub async fn convert_files<P: AsRef<Path>>(
    paths: &[P],
    config: &ConverterConfig,
) -> Result<BatchOutput, AvifError> {
    let start = Instant::now();
    info!("Starting batch of {} input path(s)", paths.len());

    // ── Step 1: Surface + intake ─────────────────────────────────────────
    let (surface, intake) = intake(paths, config).await?;
    let rejected = intake.rejected;

    // ── Step 2: One run per record ───────────────────────────────────────
    let settled = surface.run_all(intake.pending).await;
    debug!("{} run(s) settled", settled.len());

    // ── Step 3: Collect in insertion order ───────────────────────────────
    let records: Vec<ImageRecord> = surface
        .registry()
        .snapshot()
        .into_iter()
        .map(|mut r| {
            r.thumbnail = None;
            r
        })
        .collect();

    let stats = BatchStats::from_records(
        &records,
        rejected.len(),
        start.elapsed().as_millis() as u64,
    );
    info!(
        "Batch complete: {} converted, {} without URL, {} failed, {}ms",
        stats.completed, stats.degraded, stats.failed, stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&stats);
    }

    Ok(BatchOutput {
        records,
        rejected,
        stats,
    })
}

/// Convert a single image file.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<ImageRecord, AvifError> {
    let path = path.as_ref();
    if path.is_dir() {
        return Err(AvifError::InvalidConfig(format!(
            "'{}' is a directory; use convert_files",
            path.display()
        )));
    }
    let output = convert_files(&[path], config).await?;
    output
        .records
        .into_iter()
        .next()
        .ok_or_else(|| AvifError::Internal("batch finished without a record".to_string()))
}

/// Synchronous wrapper around [`convert_files`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync<P: AsRef<Path>>(
    paths: &[P],
    config: &ConverterConfig,
) -> Result<BatchOutput, AvifError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AvifError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_files(paths, config))
}

/// Result of downloading one record.
#[derive(Debug)]
pub struct DownloadReport {
    pub id: RecordId,
    pub original_name: String,
    pub result: Result<DownloadOutcome, DownloadError>,
}

/// Download the asset of one record into `config.output_dir`.
pub async fn download_record(
    record: &ImageRecord,
    config: &ConverterConfig,
) -> Result<DownloadOutcome, AvifError> {
    prepare_output_dir(&config.output_dir).await?;
    let downloader = Downloader::from_config(config)?;
    downloader.download_record(record).await.map_err(|e| {
        AvifError::Internal(format!("Download of '{}' failed: {}", record.original_name, e))
    })
}

/// Download every completed record, one after another.
///
/// Failed and unfinished records are skipped. A failed download is reported
/// in its [`DownloadReport`] and does not stop the others.
pub async fn download_all(
    records: &[ImageRecord],
    config: &ConverterConfig,
) -> Result<Vec<DownloadReport>, AvifError> {
    prepare_output_dir(&config.output_dir).await?;
    let downloader = Downloader::from_config(config)?;

    let mut reports = Vec::new();
    for record in records
        .iter()
        .filter(|r| r.status == ConversionStatus::Completed)
    {
        let result = downloader.download_record(record).await;
        reports.push(DownloadReport {
            id: record.id,
            original_name: record.original_name.clone(),
            result,
        });
    }
    Ok(reports)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Build a fresh surface for `config` and accept `paths` into it.
///
/// Fires `on_batch_start` once intake has settled.
pub(crate) async fn intake<P: AsRef<Path>>(
    paths: &[P],
    config: &ConverterConfig,
) -> Result<(Surface, Intake), AvifError> {
    let previews = PreviewStore::new()
        .map_err(|e| AvifError::Internal(format!("Failed to create preview store: {}", e)))?;
    let registry =
        Registry::new(Arc::new(previews)).with_callback(config.progress_callback.clone());
    let surface = Surface::new(registry, config.clone())?;

    let intake = surface.accept(paths).await?;
    if intake.pending.is_empty() {
        return Err(AvifError::NoSupportedImages {
            rejected: intake.rejected.len(),
            supported: SUPPORTED_EXTENSIONS.join(", "),
        });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(intake.pending.len(), intake.rejected.len());
    }
    Ok((surface, intake))
}

async fn prepare_output_dir(dir: &Path) -> Result<(), AvifError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| AvifError::OutputDir {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;

    fn config(webhook: Option<&str>) -> ConverterConfig {
        let mut builder = ConverterConfig::builder().progress_step_delay_ms(0);
        if let Some(url) = webhook {
            builder = builder.webhook_url(url);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn unconfigured_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        std::fs::write(&png, b"x").unwrap();

        let err = convert_files(&[&png], &config(None)).await.unwrap_err();
        assert!(matches!(
            err,
            AvifError::Configuration(ConfigurationError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn batch_without_images_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"x").unwrap();

        let err = convert_files(&[&txt], &config(Some("https://hook.example.com/a")))
            .await
            .unwrap_err();
        match err {
            AvifError::NoSupportedImages { rejected, supported } => {
                assert_eq!(rejected, 1);
                assert!(supported.contains("png"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn convert_file_refuses_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_file(dir.path(), &config(Some("https://hook.example.com/a")))
            .await
            .unwrap_err();
        assert!(matches!(err, AvifError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn download_all_skips_unfinished_records() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ConverterConfig::builder()
            .output_dir(dir.path().join("out"))
            .open_in_browser(false)
            .build()
            .unwrap();

        let mut failed = ImageRecord::pending("a.png", 10, None);
        failed.status = ConversionStatus::Error;
        let uploading = ImageRecord::pending("b.png", 10, None);

        let reports = download_all(&[failed, uploading], &cfg).await.unwrap();
        assert!(reports.is_empty());
        assert!(dir.path().join("out").is_dir());
    }
}
