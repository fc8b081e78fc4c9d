//! Per-file record types.
//!
//! One [`ImageRecord`] exists per accepted file. It is created by the intake
//! surface, mutated only through the [`crate::registry::Registry`] (by the
//! conversion pipeline), and removed by user action.

use crate::preview::PreviewHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, unique identity of a record. Stable for the record's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell cards apart in logs.
        write!(f, "{}", &self.0.simple().to_string()[..9])
    }
}

/// Where a record is in its conversion run.
///
/// ```text
/// Uploading ──▶ Converting ──▶ Completed
///     │              │
///     └──────────────┴───────▶ Error
/// ```
///
/// `Completed` and `Error` are terminal; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Uploading,
    Converting,
    Completed,
    Error,
}

impl ConversionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionStatus::Completed | ConversionStatus::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            ConversionStatus::Uploading => "Uploading…",
            ConversionStatus::Converting => "Converting…",
            ConversionStatus::Completed => "Completed",
            ConversionStatus::Error => "Error",
        }
    }
}

/// The converted asset's location as far as we know it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "url", rename_all = "snake_case")]
pub enum ConvertedUrl {
    /// The run has not finished yet.
    #[default]
    Unknown,
    /// The webhook finished but reported no retrievable location.
    Missing,
    /// A download location reported by the webhook.
    Available(String),
}

impl ConvertedUrl {
    pub fn from_option(url: Option<String>) -> Self {
        match url {
            Some(u) => ConvertedUrl::Available(u),
            None => ConvertedUrl::Missing,
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            ConvertedUrl::Available(u) => Some(u),
            _ => None,
        }
    }
}

/// State of one accepted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: RecordId,
    pub original_name: String,
    pub original_size: u64,
    pub status: ConversionStatus,
    /// 0–100. Only meaningful while uploading or converting.
    pub progress: u8,
    pub converted_url: ConvertedUrl,
    pub converted_size: Option<u64>,
    /// Failure text, or the explanation attached to a degraded success.
    pub error: Option<String>,
    pub thumbnail: Option<PreviewHandle>,
}

impl ImageRecord {
    /// A freshly accepted file: `Uploading`, progress 0.
    pub fn pending(
        original_name: impl Into<String>,
        original_size: u64,
        thumbnail: Option<PreviewHandle>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            original_name: original_name.into(),
            original_size,
            status: ConversionStatus::Uploading,
            progress: 0,
            converted_url: ConvertedUrl::Unknown,
            converted_size: None,
            error: None,
            thumbnail,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completed, but without a download location.
    pub fn is_degraded(&self) -> bool {
        self.status == ConversionStatus::Completed && self.converted_url == ConvertedUrl::Missing
    }

    pub fn download_url(&self) -> Option<&str> {
        self.converted_url.as_deref()
    }
}

/// Size guess used when the webhook does not report one: 60 % of the
/// original, rounded down.
pub fn estimated_converted_size(original_size: u64) -> u64 {
    (u128::from(original_size) * 3 / 5) as u64
}
