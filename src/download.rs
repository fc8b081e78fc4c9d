//! Downloading converted assets.
//!
//! The webhook hands back a URL on some storage host we do not control, so a
//! single retrieval method is not always enough. [`Downloader`] holds an
//! ordered list of [`DownloadStrategy`] objects and tries them in turn; the
//! first success ends the sequence:
//!
//! 1. [`BlobFetch`]    — buffered GET, no redirects, no cookies; bytes land in
//!    a temp file that is persisted under the `.avif` name.
//! 2. [`DirectLink`]   — navigation-style GET that follows redirects and
//!    streams chunks into a temp file, persisted the same way.
//! 3. [`ExternalOpen`] — give the URL to the system browser. The `.avif`
//!    rename cannot be enforced on this path.
//!
//! Saved files never replace an existing one; see [`free_destination`].
//!
//! A record without a URL never reaches the strategies: the caller gets
//! [`DownloadOutcome::Unavailable`] with instructions for fixing the webhook.

use crate::config::ConverterConfig;
use crate::error::{AvifError, DownloadError};
use crate::record::ImageRecord;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown instead of downloading when the webhook returned no URL.
pub const NO_URL_GUIDANCE: &str = "Download URL not available.

To fix this:

1. Make your workflow respond with JSON containing the URL:
   { \"url\": \"https://res.cloudinary.com/...\", \"size\": 12345 }

2. In n8n, add a 'Respond to Webhook' node at the end of the flow.

3. Make sure your storage returns public URLs.

4. Call the webhook directly to check what it returns.

Run with --verbose to see the raw webhook responses.";

static TRAILING_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[^/.]+$").expect("static regex"));

/// Local file name for a converted asset: the display name's last path
/// component with its extension replaced by (or extended with) `.avif`.
pub fn avif_file_name(display_name: &str) -> String {
    let base = display_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("image");

    if TRAILING_EXTENSION.is_match(base) {
        TRAILING_EXTENSION.replace(base, ".avif").into_owned()
    } else {
        format!("{base}.avif")
    }
}

/// First path in `dir` for `file_name` that is not already taken:
/// `photo.avif`, then `photo (1).avif`, `photo (2).avif`, ...
pub fn free_destination(dir: &Path, file_name: &str) -> PathBuf {
    let first = dir.join(file_name);
    if !first.exists() {
        return first;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Move a finished temp file to `dest`, refusing to replace anything there.
fn persist_new(blob: tempfile::NamedTempFile, dest: &Path) -> io::Result<()> {
    blob.persist_noclobber(dest).map(|_| ()).map_err(|e| e.error)
}

/// What a download attempt achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// No URL was known; nothing was fetched.
    Unavailable { guidance: &'static str },
    /// The asset was written to `path`.
    Saved {
        path: PathBuf,
        bytes: u64,
        strategy: &'static str,
    },
    /// The URL was handed to the system browser.
    Opened { url: String },
}

/// One download attempt: where from, and where to.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
}

/// One way of retrieving a converted asset.
pub trait DownloadStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt<'a>(
        &'a self,
        request: &'a DownloadRequest,
    ) -> BoxFuture<'a, Result<DownloadOutcome, DownloadError>>;
}

// ── Strategy 1: buffered fetch into a temp file ──────────────────────────

pub struct BlobFetch {
    client: Client,
}

impl BlobFetch {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let url = &request.url;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Fetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| DownloadError::Fetch {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        // The temp file is the ephemeral handle: dropped (and deleted) on any
        // error, consumed by `persist` on success.
        let write_err = |source: io::Error| DownloadError::Write {
            path: request.dest.clone(),
            source,
        };
        let dir = request.dest.parent().unwrap_or_else(|| Path::new("."));
        let mut blob = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        blob.write_all(&bytes).map_err(write_err)?;
        persist_new(blob, &request.dest).map_err(write_err)?;

        Ok(DownloadOutcome::Saved {
            path: request.dest.clone(),
            bytes: bytes.len() as u64,
            strategy: self.name(),
        })
    }
}

impl DownloadStrategy for BlobFetch {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn attempt<'a>(
        &'a self,
        request: &'a DownloadRequest,
    ) -> BoxFuture<'a, Result<DownloadOutcome, DownloadError>> {
        self.fetch(request).boxed()
    }
}

// ── Strategy 2: streamed direct link ─────────────────────────────────────

pub struct DirectLink {
    client: Client,
}

impl DirectLink {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder().redirect(Policy::limited(10)).build()?;
        Ok(Self { client })
    }

    async fn stream_to_file(
        &self,
        request: &DownloadRequest,
    ) -> Result<DownloadOutcome, DownloadError> {
        let url = &request.url;
        let fetch_err = |e: reqwest::Error| DownloadError::Fetch {
            url: url.clone(),
            reason: e.to_string(),
        };
        let write_err = |source: io::Error| DownloadError::Write {
            path: request.dest.clone(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        // Chunks land in a temp file next to `dest`; a stream that breaks
        // off drops it, leaving whatever was at `dest` untouched.
        let dir = request.dest.parent().unwrap_or_else(|| Path::new("."));
        let mut blob = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        let mut chunks = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(fetch_err)?;
            blob.write_all(&chunk).map_err(write_err)?;
            written += chunk.len() as u64;
        }
        blob.flush().map_err(write_err)?;
        persist_new(blob, &request.dest).map_err(write_err)?;

        Ok(DownloadOutcome::Saved {
            path: request.dest.clone(),
            bytes: written,
            strategy: self.name(),
        })
    }
}

impl DownloadStrategy for DirectLink {
    fn name(&self) -> &'static str {
        "link"
    }

    fn attempt<'a>(
        &'a self,
        request: &'a DownloadRequest,
    ) -> BoxFuture<'a, Result<DownloadOutcome, DownloadError>> {
        self.stream_to_file(request).boxed()
    }
}

// ── Strategy 3: system browser ───────────────────────────────────────────

/// Function used to hand a URL to the desktop environment.
pub type Opener = fn(&str) -> io::Result<()>;

fn open_in_browser(url: &str) -> io::Result<()> {
    open::that(url)
}

pub struct ExternalOpen {
    opener: Opener,
}

impl ExternalOpen {
    pub fn new() -> Self {
        Self {
            opener: open_in_browser,
        }
    }

    pub fn with_opener(opener: Opener) -> Self {
        Self { opener }
    }
}

impl Default for ExternalOpen {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStrategy for ExternalOpen {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn attempt<'a>(
        &'a self,
        request: &'a DownloadRequest,
    ) -> BoxFuture<'a, Result<DownloadOutcome, DownloadError>> {
        let opener = self.opener;
        let url = request.url.clone();
        async move {
            let target = url.clone();
            let opened = match tokio::task::spawn_blocking(move || opener(&target)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match opened {
                Ok(()) => Ok(DownloadOutcome::Opened { url }),
                Err(reason) => Err(DownloadError::Open { url, reason }),
            }
        }
        .boxed()
    }
}

// ── Downloader ───────────────────────────────────────────────────────────

pub struct Downloader {
    output_dir: PathBuf,
    strategies: Vec<Box<dyn DownloadStrategy>>,
}

impl Downloader {
    pub fn new(output_dir: impl Into<PathBuf>, strategies: Vec<Box<dyn DownloadStrategy>>) -> Self {
        Self {
            output_dir: output_dir.into(),
            strategies,
        }
    }

    /// Blob fetch, then direct link, then (if allowed) the system browser.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, AvifError> {
        let internal = |e: reqwest::Error| AvifError::Internal(format!("HTTP client: {e}"));
        let mut strategies: Vec<Box<dyn DownloadStrategy>> = vec![
            Box::new(
                BlobFetch::new(Duration::from_secs(config.download_timeout_secs))
                    .map_err(internal)?,
            ),
            Box::new(DirectLink::new().map_err(internal)?),
        ];
        if config.open_in_browser {
            strategies.push(Box::new(ExternalOpen::new()));
        }
        Ok(Self::new(config.output_dir.clone(), strategies))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Retrieve `url` and store it as `<stem>.avif` in the output directory.
    ///
    /// Existing files are never replaced: a taken name gets a ` (n)` suffix
    /// before the extension.
    ///
    /// `None` is not a failure: it yields [`DownloadOutcome::Unavailable`]
    /// without any network call.
    pub async fn download(
        &self,
        url: Option<&str>,
        display_name: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        let Some(url) = url else {
            info!("No download URL for '{}'", display_name);
            return Ok(DownloadOutcome::Unavailable {
                guidance: NO_URL_GUIDANCE,
            });
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| DownloadError::Write {
                path: self.output_dir.clone(),
                source,
            })?;
        let dest = free_destination(&self.output_dir, &avif_file_name(display_name));

        let request = DownloadRequest {
            url: url.to_string(),
            dest,
        };

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            debug!("Downloading {} via {}", url, strategy.name());
            match strategy.attempt(&request).await {
                Ok(outcome) => {
                    info!("Downloaded {} via {}", url, strategy.name());
                    return Ok(outcome);
                }
                Err(e) => {
                    warn!("Download via {} failed: {}", strategy.name(), e);
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(DownloadError::AllStrategiesFailed {
            url: url.to_string(),
            attempts,
        })
    }

    /// Download the asset of a completed record.
    pub async fn download_record(
        &self,
        record: &ImageRecord,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.download(record.download_url(), &record.original_name)
            .await
    }
}
