//! # avifhook
//!
//! Convert images to AVIF by handing them to a remote conversion webhook
//! (an n8n flow, a Cloudinary upload function, anything that accepts a
//! multipart POST) and fetching the result.
//!
//! ## Why this crate?
//!
//! Conversion webhooks are easy to stand up but inconsistent to talk to: one
//! flow answers `{"secure_url": ...}`, another `[{"data": {"url": ...}}]`,
//! a third answers with an empty 200 because nobody added a response node.
//! This crate tracks every file through an explicit status machine, reads
//! the location and size out of whatever shape the webhook returns, and
//! falls back through several download methods when the storage host is
//! picky about how it is fetched.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths
//!  │
//!  ├─ 1. Intake     allow-list by extension, preview handle, pending record
//!  ├─ 2. Run        Uploading → Converting → progress ramp (per file, concurrent)
//!  ├─ 3. Submit     multipart POST: image + format=avif + quality=80
//!  ├─ 4. Normalise  first non-empty URL field, first positive size field
//!  ├─ 5. Record     Completed / Completed-without-URL / Error in the registry
//!  └─ 6. Download   blob fetch → direct link → system browser
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use avifhook::{convert_files, download_all, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder()
//!         .webhook_url("https://n8n.example.com/webhook/avif")
//!         .output_dir("converted")
//!         .build()?;
//!     let output = convert_files(&["photos/"], &config).await?;
//!     eprintln!("{} converted, {} failed", output.stats.completed, output.stats.failed);
//!     for report in download_all(&output.records, &config).await? {
//!         println!("{}: {:?}", report.original_name, report.result);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `avifhook` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! avifhook = { version = "0.1", default-features = false }
//! ```
//!
//! ## Webhook contract
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | request   | `multipart/form-data`: `image` (file), `format=avif`, `quality=80` |
//! | response  | empty body, a JSON object, or a JSON list whose first item is an object |
//! | URL field | `secure_url`, `url`, `downloadUrl`, `file_url`, `download_url`, `public_url`, `link`, `href`, `data.*`, `file.*` |
//! | size field| `bytes`, `size`, `file_size` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod record;
pub mod registry;
pub mod stream;
pub mod surface;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{convert_file, convert_files, convert_sync, download_all, download_record, DownloadReport};
pub use download::{avif_file_name, DownloadOutcome, DownloadStrategy, Downloader};
pub use error::{AvifError, ConfigurationError, ConvertError, DownloadError, ErrorKind};
pub use output::{format_file_size, savings_percent, BatchOutput, BatchStats};
pub use preview::{PreviewHandle, PreviewStore};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{ConversionStatus, ConvertedUrl, ImageRecord, RecordId};
pub use registry::Registry;
pub use stream::{convert_stream, RecordStream};
pub use surface::{Intake, PendingRun, Surface};
