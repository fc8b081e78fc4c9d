//! CLI binary for avifhook.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, renders one status card per image and downloads the
//! results.

use anyhow::{Context, Result};
use avifhook::config::resolve_endpoint;
use avifhook::{
    convert_files, download_all, format_file_size, savings_percent, ConversionProgressCallback,
    ConversionStatus, ConverterConfig, DownloadOutcome, ImageRecord, ProgressCallback, RecordId,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Status cards ─────────────────────────────────────────────────────────────

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

/// One line (two for degraded results) describing a terminal record.
fn status_card(record: &ImageRecord) -> String {
    let name = bold(&truncate(&record.original_name, 40));
    let original = format_file_size(record.original_size);

    match record.status {
        ConversionStatus::Completed => {
            let converted = record.converted_size.unwrap_or(0);
            let sizes = format!(
                "{} → {}  ({}%)",
                original,
                format_file_size(converted),
                -savings_percent(record.original_size, converted)
            );
            if record.is_degraded() {
                format!(
                    "  {} {}  {}  {}\n      {}",
                    yellow("⚠"),
                    name,
                    dim(&sizes),
                    yellow("completed, no download URL"),
                    dim(record.error.as_deref().unwrap_or_default()),
                )
            } else {
                format!(
                    "  {} {}  {}  {}",
                    green("✓"),
                    name,
                    dim(&sizes),
                    dim(record.download_url().unwrap_or_default()),
                )
            }
        }
        ConversionStatus::Error => format!(
            "  {} {}  {}  {}",
            red("✗"),
            name,
            dim(&original),
            red(&truncate(record.error.as_deref().unwrap_or("Unknown error"), 80)),
        ),
        ConversionStatus::Uploading | ConversionStatus::Converting => format!(
            "  {} {}  {}  {}%",
            cyan("…"),
            name,
            record.status.label(),
            record.progress
        ),
    }
}

fn configuration_card(reason: &str) -> String {
    format!(
        "{} {}\n\n  {}\n\n  Set the webhook address and try again:\n    {}\n    {}\n",
        red("✘"),
        bold("Configuration required"),
        reason.replace('\n', "\n  "),
        cyan("export AVIF_WEBHOOK_URL=https://your-n8n-host/webhook/avif"),
        cyan("avifhook --webhook https://your-n8n-host/webhook/avif photo.png"),
    )
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar anchored at the bottom of the terminal
/// and a status card printed above it as each record settles. Records finish
/// out of order, so settled ids are tracked to count each one once.
struct CliProgressCallback {
    bar: ProgressBar,
    settled: Mutex<HashSet<RecordId>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_batch_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            settled: Mutex::new(HashSet::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.set_message("");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, accepted: usize, rejected: usize) {
        self.activate_bar(accepted);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {accepted} image(s) to AVIF…"))
        ));
        if rejected > 0 {
            self.bar.println(format!(
                "  {} {}",
                yellow("⚠"),
                dim(&format!("{rejected} unsupported file(s) skipped"))
            ));
        }
    }

    fn on_record_updated(&self, record: &ImageRecord) {
        if !record.is_terminal() {
            self.bar
                .set_message(format!("{} {}%", record.original_name, record.progress));
            return;
        }
        let first = self
            .settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id);
        if first {
            self.bar.println(status_card(record));
            self.bar.inc(1);
        }
    }

    fn on_batch_complete(&self, stats: &avifhook::BatchStats) {
        self.bar.finish_and_clear();

        let done = stats.completed + stats.degraded;
        if stats.failed == 0 {
            eprintln!(
                "{} {} image(s) converted  {}",
                green("✔"),
                bold(&done.to_string()),
                dim(&format!(
                    "{} → {}",
                    format_file_size(stats.total_original_bytes),
                    format_file_size(stats.total_converted_bytes)
                )),
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) converted  ({} failed)",
                if done == 0 { red("✘") } else { cyan("⚠") },
                bold(&done.to_string()),
                stats.accepted,
                red(&stats.failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one image, save photo.avif in the current directory
  avifhook --webhook https://n8n.example.com/webhook/avif photo.png

  # Convert a whole folder into ./converted
  avifhook photos/ -o converted

  # Convert only, print the resulting records as JSON
  avifhook --no-download --json *.jpg > results.json

  # Never hand URLs to the browser
  avifhook --no-browser photo.webp

SUPPORTED INPUTS:
  .jpg .jpeg .png .webp .gif .bmp .tiff  (other files are skipped)

WEBHOOK CONTRACT:
  Request   multipart/form-data: image=<file>, format=avif, quality=80
  Response  JSON object (or a list starting with one) carrying a URL in
            secure_url, url, downloadUrl, file_url, download_url, public_url,
            link, href, data.url, data.downloadUrl, data.file_url, file.url
            or file.downloadUrl, and optionally a size in bytes, size or
            file_size. An empty 200 response counts as success without a URL.

ENVIRONMENT VARIABLES:
  AVIF_WEBHOOK_URL          Conversion webhook address
  AVIFHOOK_OUTPUT_DIR       Directory for downloaded files
  AVIFHOOK_CONCURRENCY      Cap on images in flight (default: no cap)
  RUST_LOG                  Override log filter (e.g. avifhook=debug)

SETUP:
  1. Point at your webhook:  export AVIF_WEBHOOK_URL=https://.../webhook/avif
  2. Convert:                avifhook photo.png
"#;

/// Convert images to AVIF through a conversion webhook.
#[derive(Parser, Debug)]
#[command(
    name = "avifhook",
    version,
    about = "Convert images to AVIF through a conversion webhook",
    long_about = "Upload images to an AVIF conversion webhook (n8n, Cloudinary, or any endpoint \
accepting multipart uploads), track each file through its conversion, and download the results.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files or directories.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Conversion webhook URL.
    #[arg(long, env = "AVIF_WEBHOOK_URL")]
    webhook: Option<String>,

    /// Directory for downloaded .avif files.
    #[arg(short, long, env = "AVIFHOOK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Convert only; do not download the results.
    #[arg(long, env = "AVIFHOOK_NO_DOWNLOAD")]
    no_download: bool,

    /// Never open a result in the system browser.
    #[arg(long, env = "AVIFHOOK_NO_BROWSER")]
    no_browser: bool,

    /// Cap on images converted concurrently. Without it every image starts
    /// at once.
    #[arg(short, long, env = "AVIFHOOK_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..=64))]
    concurrency: Option<u64>,

    /// Pause between steps of the progress ramp, in milliseconds.
    #[arg(long, env = "AVIFHOOK_PROGRESS_DELAY_MS", default_value_t = 100)]
    progress_delay_ms: u64,

    /// Webhook request timeout in seconds (default: none).
    #[arg(long, env = "AVIFHOOK_TIMEOUT")]
    timeout: Option<u64>,

    /// Download timeout in seconds.
    #[arg(long, env = "AVIFHOOK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the batch result as JSON on stdout.
    #[arg(long, env = "AVIFHOOK_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "AVIFHOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "AVIFHOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "AVIFHOOK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and status cards replace INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Configuration required ───────────────────────────────────────────
    if let Err(e) = resolve_endpoint(cli.webhook.as_deref()) {
        if !cli.quiet {
            eprintln!("{}", configuration_card(&e.to_string()));
        }
        return Err(e).context("No usable webhook URL");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_files(&cli.paths, &config)
        .await
        .context("Conversion failed")?;

    if !cli.quiet && !show_progress && !cli.json {
        for record in &output.records {
            eprintln!("{}", status_card(record));
        }
        eprintln!(
            "Converted {}/{} image(s) in {}ms",
            output.stats.completed + output.stats.degraded,
            output.stats.accepted,
            output.stats.duration_ms
        );
        if !output.rejected.is_empty() {
            eprintln!("  {} unsupported file(s) skipped", output.rejected.len());
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    // ── Downloads ────────────────────────────────────────────────────────
    if !cli.no_download {
        let reports = download_all(&output.records, &config)
            .await
            .context("Download failed")?;

        let mut guidance_shown = false;
        for report in reports {
            if cli.quiet {
                continue;
            }
            match report.result {
                Ok(DownloadOutcome::Saved {
                    path,
                    bytes,
                    strategy,
                }) => eprintln!(
                    "  {} {}  {}",
                    green("↓"),
                    bold(&path.display().to_string()),
                    dim(&format!("{} via {}", format_file_size(bytes), strategy)),
                ),
                Ok(DownloadOutcome::Opened { url }) => eprintln!(
                    "  {} {}  {}",
                    cyan("↗"),
                    report.original_name,
                    dim(&format!("opened in browser: {url}")),
                ),
                Ok(DownloadOutcome::Unavailable { guidance }) => {
                    eprintln!(
                        "  {} {}  {}",
                        yellow("⚠"),
                        report.original_name,
                        yellow("download URL not available"),
                    );
                    if !guidance_shown {
                        eprintln!("\n{}\n", dim(guidance));
                        guidance_shown = true;
                    }
                }
                Err(e) => eprintln!(
                    "  {} {}  {}",
                    red("✗"),
                    report.original_name,
                    red(&truncate(&e.to_string(), 120)),
                ),
            }
        }
    }

    if output.stats.failed > 0 && output.stats.failed == output.stats.accepted {
        anyhow::bail!("All {} conversion(s) failed", output.stats.failed);
    }

    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .progress_step_delay_ms(cli.progress_delay_ms)
        .download_timeout_secs(cli.download_timeout)
        .output_dir(cli.output_dir.clone())
        .open_in_browser(!cli.no_browser);

    if let Some(ref url) = cli.webhook {
        builder = builder.webhook_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n as usize);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
