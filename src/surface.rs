//! The intake surface: where files enter the system.
//!
//! A [`Surface`] is bound to one [`Registry`] and one configuration. When the
//! webhook endpoint is missing or malformed the surface is inert: it reports
//! [`ConfigurationError`](crate::error::ConfigurationError) and never touches
//! the registry. Otherwise each accepted file gets a preview handle and a
//! pending record, and [`Surface::run_all`] starts one conversion run per
//! file.

use crate::config::ConverterConfig;
use crate::error::AvifError;
use crate::pipeline::input::{self, SourceFile};
use crate::pipeline::run::{run_conversion, RunContext};
use crate::pipeline::submit;
use crate::record::{ImageRecord, RecordId};
use crate::registry::Registry;
use futures::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A record waiting for its run.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub id: RecordId,
    pub file: SourceFile,
}

/// What an intake produced.
#[derive(Debug, Default)]
pub struct Intake {
    pub pending: Vec<PendingRun>,
    /// Paths that exist but are not a supported image type.
    pub rejected: Vec<PathBuf>,
}

pub struct Surface {
    ctx: RunContext,
}

impl Surface {
    pub fn new(registry: Registry, config: ConverterConfig) -> Result<Self, AvifError> {
        let client = submit::build_client(config.request_timeout_secs.map(Duration::from_secs))
            .map_err(|e| AvifError::Internal(e.to_string()))?;
        Ok(Self {
            ctx: RunContext {
                registry,
                client,
                config,
            },
        })
    }

    /// False when the webhook endpoint is absent or malformed.
    pub fn is_enabled(&self) -> bool {
        self.ctx.config.is_configured()
    }

    pub fn registry(&self) -> &Registry {
        &self.ctx.registry
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.ctx.config
    }

    /// Resolve `paths` and accept every supported image among them.
    pub async fn accept<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Intake, AvifError> {
        self.ctx.config.endpoint()?;

        let resolved = input::resolve_inputs(paths)?;
        for path in &resolved.rejected {
            warn!("Skipping unsupported file: {}", path.display());
        }

        let pending = self.accept_files(resolved.accepted).await?;
        Ok(Intake {
            pending,
            rejected: resolved.rejected,
        })
    }

    /// Create a pending record (and preview) for each already-resolved file.
    pub async fn accept_files(&self, files: Vec<SourceFile>) -> Result<Vec<PendingRun>, AvifError> {
        self.ctx.config.endpoint()?;

        let mut pending = Vec::with_capacity(files.len());
        for file in files {
            let thumbnail = match self.ctx.registry.previews().create(&file.path).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("No preview for '{}': {}", file.name, e);
                    None
                }
            };
            let record = ImageRecord::pending(file.name.clone(), file.size, thumbnail);
            let id = record.id;
            self.ctx.registry.insert(record);
            pending.push(PendingRun { id, file });
        }

        info!("Accepted {} file(s)", pending.len());
        Ok(pending)
    }

    /// Yield each record as its run settles, in completion order.
    ///
    /// Runs are polled concurrently by whoever drives the stream. Without a
    /// `config.concurrency` cap every run starts on the first poll. Records
    /// removed mid-run are skipped.
    pub fn run_stream(
        &self,
        pending: Vec<PendingRun>,
    ) -> impl Stream<Item = ImageRecord> + Send + 'static {
        let ctx = Arc::new(self.ctx.clone());
        let concurrency = ctx.config.max_in_flight();
        stream::iter(pending.into_iter().map(move |run| {
            let ctx = Arc::clone(&ctx);
            async move { run_conversion(&ctx, &run.file, run.id).await }
        }))
        .buffer_unordered(concurrency)
        .filter_map(|record| async move { record })
    }

    /// Run every pending conversion to a terminal state.
    pub async fn run_all(&self, pending: Vec<PendingRun>) -> Vec<ImageRecord> {
        self.run_stream(pending).collect().await
    }
}
