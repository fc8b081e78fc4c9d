//! Configuration types for webhook-driven AVIF conversion.
//!
//! All behaviour is controlled through [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. The webhook location is resolved from the
//! config through [`ConverterConfig::endpoint`], so a missing or malformed
//! address surfaces as a [`ConfigurationError`] in exactly one place.

use crate::error::{AvifError, ConfigurationError};
use crate::progress::ProgressCallback;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Output format requested from the webhook. Sent as the `format` form field.
pub const OUTPUT_FORMAT: &str = "avif";

/// Quality requested from the webhook. Sent as the `quality` form field.
pub const OUTPUT_QUALITY: &str = "80";

/// Configuration for a conversion batch.
///
/// # Example
/// ```rust
/// use avifhook::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .webhook_url("https://n8n.example.com/webhook/avif")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert!(config.endpoint().is_ok());
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Absolute http(s) address of the conversion webhook. `None` leaves the
    /// intake surface inert.
    pub webhook_url: Option<String>,

    /// Optional cap on files in flight at once. Default: `None`, every
    /// accepted file starts converting immediately.
    pub concurrency: Option<usize>,

    /// Pause before each step of the synthetic progress ramp. Default: 100 ms.
    ///
    /// The ramp is cosmetic: it runs before the upload and does not reflect
    /// transfer progress, because the webhook reports none.
    pub progress_step_delay_ms: u64,

    /// Whole-request timeout for the webhook call in seconds.
    /// Default: `None` (transport default, no explicit limit).
    pub request_timeout_secs: Option<u64>,

    /// Timeout for fetching a converted asset in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory that receives downloaded `.avif` files. Default: `.`.
    pub output_dir: PathBuf,

    /// Allow the last-resort download strategy to open the system browser.
    /// Default: true.
    pub open_in_browser: bool,

    /// Receives registry events (record added, updated, removed).
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            concurrency: None,
            progress_step_delay_ms: 100,
            request_timeout_secs: None,
            download_timeout_secs: 120,
            output_dir: PathBuf::from("."),
            open_in_browser: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("webhook_url", &self.webhook_url)
            .field("concurrency", &self.concurrency)
            .field("progress_step_delay_ms", &self.progress_step_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("open_in_browser", &self.open_in_browser)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve and validate the webhook address.
    pub fn endpoint(&self) -> Result<Url, ConfigurationError> {
        resolve_endpoint(self.webhook_url.as_deref())
    }

    /// True when a usable webhook address is configured.
    pub fn is_configured(&self) -> bool {
        self.endpoint().is_ok()
    }

    pub fn progress_step_delay(&self) -> Duration {
        Duration::from_millis(self.progress_step_delay_ms)
    }

    /// Runs allowed in flight together; unbounded without a cap.
    pub fn max_in_flight(&self) -> usize {
        self.concurrency.unwrap_or(usize::MAX)
    }
}

/// Validate a raw webhook address.
///
/// Blank strings count as absent. Anything else must parse as an absolute
/// `http` or `https` URL with a host.
pub fn resolve_endpoint(raw: Option<&str>) -> Result<Url, ConfigurationError> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Err(ConfigurationError::NotConfigured),
    };

    let url = Url::parse(raw).map_err(|e| ConfigurationError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if !url.has_host() {
        return Err(ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = Some(url.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = Some(n.max(1));
        self
    }

    pub fn progress_step_delay_ms(mut self, ms: u64) -> Self {
        self.config.progress_step_delay_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn open_in_browser(mut self, v: bool) -> Self {
        self.config.open_in_browser = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The webhook address is deliberately not validated here: an unusable
    /// address is a runtime state (inert surface), not a build failure.
    pub fn build(self) -> Result<ConverterConfig, AvifError> {
        let c = &self.config;
        if c.concurrency == Some(0) {
            return Err(AvifError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(AvifError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(AvifError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
