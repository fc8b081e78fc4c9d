//! Progress-callback trait for registry events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to observe
//! every change the pipeline makes to the [`crate::registry::Registry`]. The
//! registry is the single source of truth; a presentation layer (the CLI's
//! status cards, a web socket, a log) only renders what these events carry.
//!
//! # Example
//!
//! ```rust
//! use avifhook::{ConversionProgressCallback, ConverterConfig, ImageRecord};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_record_updated(&self, record: &ImageRecord) {
//!         if record.is_terminal() {
//!             self.finished.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::BatchStats;
use crate::record::{ImageRecord, RecordId};
use std::sync::Arc;

/// Called by the registry and the batch drivers as records change.
///
/// Implementations must be `Send + Sync`. All methods have default no-op
/// implementations so callers only override what they care about. Events for
/// one record arrive in mutation order; events for different records
/// interleave arbitrarily.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after intake, before any run starts.
    ///
    /// # Arguments
    /// * `accepted` — files that became records
    /// * `rejected` — paths skipped because of their extension
    fn on_batch_start(&self, accepted: usize, rejected: usize) {
        let _ = (accepted, rejected);
    }

    /// Called when a record is appended to the registry.
    fn on_record_added(&self, record: &ImageRecord) {
        let _ = record;
    }

    /// Called after every replace-by-id update with the new record state.
    fn on_record_updated(&self, record: &ImageRecord) {
        let _ = record;
    }

    /// Called after a record was removed and its preview released.
    fn on_record_removed(&self, id: &RecordId) {
        let _ = id;
    }

    /// Called once after every run of the batch reached a terminal state.
    fn on_batch_complete(&self, stats: &BatchStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ConversionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        added: AtomicUsize,
        updated: AtomicUsize,
        removed: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_record_added(&self, _record: &ImageRecord) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_updated(&self, _record: &ImageRecord) {
            self.updated.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_removed(&self, _id: &RecordId) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let record = ImageRecord::pending("a.png", 10, None);
        cb.on_batch_start(1, 0);
        cb.on_record_added(&record);
        cb.on_record_updated(&record);
        cb.on_record_removed(&record.id);
        cb.on_batch_complete(&BatchStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let mut record = ImageRecord::pending("a.png", 10, None);

        tracker.on_record_added(&record);
        record.status = ConversionStatus::Converting;
        tracker.on_record_updated(&record);
        tracker.on_record_removed(&record.id);

        assert_eq!(tracker.added.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.updated.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3, 1);
    }
}
