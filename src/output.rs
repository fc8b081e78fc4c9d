//! Batch results and the small formatting helpers status cards need.

use crate::record::{ConversionStatus, ImageRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a finished batch produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Final records, in insertion order.
    pub records: Vec<ImageRecord>,
    /// Inputs skipped because of their file type.
    pub rejected: Vec<PathBuf>,
    pub stats: BatchStats,
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Completed with a download URL.
    pub completed: usize,
    /// Completed without a download URL.
    pub degraded: usize,
    pub failed: usize,
    pub total_original_bytes: u64,
    /// Sum of converted (or estimated) sizes of completed records.
    pub total_converted_bytes: u64,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn from_records(records: &[ImageRecord], rejected: usize, duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            accepted: records.len(),
            rejected,
            duration_ms,
            ..Default::default()
        };
        for r in records {
            stats.total_original_bytes += r.original_size;
            match r.status {
                ConversionStatus::Completed => {
                    if r.is_degraded() {
                        stats.degraded += 1;
                    } else {
                        stats.completed += 1;
                    }
                    stats.total_converted_bytes += r.converted_size.unwrap_or(0);
                }
                ConversionStatus::Error => stats.failed += 1,
                ConversionStatus::Uploading | ConversionStatus::Converting => {}
            }
        }
        stats
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`, `3 GB`.
///
/// Two decimals at most, trailing zeros dropped; GB is the largest unit.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Size reduction in whole percent, e.g. `40` for 1000 → 600.
///
/// Negative when the converted file is larger; 0 for an empty original.
pub fn savings_percent(original: u64, converted: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    ((1.0 - converted as f64 / original as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ConvertedUrl;

    #[test]
    fn file_sizes_format_like_status_cards() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576 + 262_144), "1.25 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn savings() {
        assert_eq!(savings_percent(1000, 600), 40);
        assert_eq!(savings_percent(1000, 1500), -50);
        assert_eq!(savings_percent(3, 1), 67);
        assert_eq!(savings_percent(0, 10), 0);
    }

    #[test]
    fn stats_count_each_outcome() {
        let mut ok = ImageRecord::pending("a.png", 1000, None);
        ok.status = ConversionStatus::Completed;
        ok.converted_url = ConvertedUrl::Available("https://x/a.avif".into());
        ok.converted_size = Some(400);

        let mut degraded = ImageRecord::pending("b.png", 100, None);
        degraded.status = ConversionStatus::Completed;
        degraded.converted_url = ConvertedUrl::Missing;
        degraded.converted_size = Some(60);

        let mut failed = ImageRecord::pending("c.png", 10, None);
        failed.status = ConversionStatus::Error;

        let stats = BatchStats::from_records(&[ok, degraded, failed], 2, 77);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.degraded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_original_bytes, 1110);
        assert_eq!(stats.total_converted_bytes, 460);
        assert_eq!(stats.duration_ms, 77);
    }
}
