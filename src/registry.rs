//! The image registry: the ordered collection of records every other
//! component reads from and writes through.
//!
//! Updates are copy-on-write: the closure receives a clone of the latest
//! state, and the result replaces the stored record wholesale. Because the
//! lock is only held for the clone and the swap (never across an `.await`),
//! concurrent runs each touching their own id cannot trample one another.

use crate::preview::PreviewStore;
use crate::progress::ProgressCallback;
use crate::record::{ImageRecord, RecordId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Shared, cheaply cloneable handle to the record collection.
#[derive(Clone)]
pub struct Registry {
    records: Arc<Mutex<Vec<ImageRecord>>>,
    previews: Arc<PreviewStore>,
    callback: Option<ProgressCallback>,
}

impl Registry {
    pub fn new(previews: Arc<PreviewStore>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            previews,
            callback: None,
        }
    }

    /// Attach an observer notified after every mutation.
    pub fn with_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn previews(&self) -> &Arc<PreviewStore> {
        &self.previews
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ImageRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record. Returns `false` (and stores nothing) if the id is taken.
    pub fn insert(&self, record: ImageRecord) -> bool {
        {
            let mut records = self.lock();
            if records.iter().any(|r| r.id == record.id) {
                warn!("Refusing duplicate record id {}", record.id);
                return false;
            }
            records.push(record.clone());
        }
        debug!("Record {} added: {}", record.id, record.original_name);
        if let Some(ref cb) = self.callback {
            cb.on_record_added(&record);
        }
        true
    }

    /// Replace the record matching `id` with `f` applied to a copy of it.
    ///
    /// Returns the new state, or `None` when the id is unknown (e.g. the user
    /// removed the record while its run was in flight) or when the update
    /// would move a terminal record to another status.
    pub fn update<F>(&self, id: &RecordId, f: F) -> Option<ImageRecord>
    where
        F: FnOnce(&mut ImageRecord),
    {
        let updated = {
            let mut records = self.lock();
            let slot = records.iter_mut().find(|r| r.id == *id)?;
            let mut next = slot.clone();
            f(&mut next);
            if slot.is_terminal() && next.status != slot.status {
                warn!(
                    "Record {} is {:?}; ignoring transition to {:?}",
                    id, slot.status, next.status
                );
                return None;
            }
            *slot = next.clone();
            next
        };
        if let Some(ref cb) = self.callback {
            cb.on_record_updated(&updated);
        }
        Some(updated)
    }

    pub fn get(&self, id: &RecordId) -> Option<ImageRecord> {
        self.lock().iter().find(|r| r.id == *id).cloned()
    }

    /// All records in insertion order.
    pub fn snapshot(&self) -> Vec<ImageRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove a record and release its preview handle.
    ///
    /// Unknown ids are a no-op and return `None`.
    pub fn remove(&self, id: &RecordId) -> Option<ImageRecord> {
        let removed = {
            let mut records = self.lock();
            let pos = records.iter().position(|r| r.id == *id)?;
            records.remove(pos)
        };
        if let Some(ref handle) = removed.thumbnail {
            self.previews.release(handle);
        }
        debug!("Record {} removed", id);
        if let Some(ref cb) = self.callback {
            cb.on_record_removed(id);
        }
        Some(removed)
    }

    /// Remove every record, releasing all previews.
    pub fn clear(&self) {
        let ids: Vec<RecordId> = self.lock().iter().map(|r| r.id).collect();
        for id in ids {
            self.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ConversionProgressCallback;
    use crate::record::ConversionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Registry {
        Registry::new(Arc::new(PreviewStore::new().unwrap()))
    }

    #[test]
    fn insert_preserves_order() {
        let reg = registry();
        let a = ImageRecord::pending("a.png", 1, None);
        let b = ImageRecord::pending("b.png", 2, None);
        let c = ImageRecord::pending("c.png", 3, None);
        assert!(reg.insert(a.clone()));
        assert!(reg.insert(b.clone()));
        assert!(reg.insert(c.clone()));

        reg.remove(&b.id);
        let names: Vec<_> = reg.snapshot().into_iter().map(|r| r.original_name).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let reg = registry();
        let a = ImageRecord::pending("a.png", 1, None);
        assert!(reg.insert(a.clone()));
        assert!(!reg.insert(a));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn update_touches_only_matching_record() {
        let reg = registry();
        let a = ImageRecord::pending("a.png", 1, None);
        let b = ImageRecord::pending("b.png", 2, None);
        reg.insert(a.clone());
        reg.insert(b.clone());

        let updated = reg
            .update(&a.id, |r| {
                r.status = ConversionStatus::Converting;
                r.progress = 40;
            })
            .unwrap();
        assert_eq!(updated.progress, 40);
        assert_eq!(reg.get(&b.id).unwrap(), b);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let reg = registry();
        assert!(reg.update(&RecordId::new(), |r| r.progress = 50).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn terminal_status_cannot_be_left() {
        let reg = registry();
        let a = ImageRecord::pending("a.png", 1, None);
        reg.insert(a.clone());
        reg.update(&a.id, |r| r.status = ConversionStatus::Error);

        assert!(reg
            .update(&a.id, |r| r.status = ConversionStatus::Converting)
            .is_none());
        assert_eq!(reg.get(&a.id).unwrap().status, ConversionStatus::Error);
    }

    #[tokio::test]
    async fn remove_releases_preview_exactly_once() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("a.png");
        std::fs::write(&src, b"png").unwrap();

        let reg = registry();
        let handle = reg.previews().create(&src).await.unwrap();
        let record = ImageRecord::pending("a.png", 3, Some(handle.clone()));
        let id = record.id;
        reg.insert(record);
        assert_eq!(reg.previews().live_count(), 1);

        assert!(reg.remove(&id).is_some());
        assert_eq!(reg.previews().live_count(), 0);
        assert!(!handle.path().exists());
        assert!(reg.get(&id).is_none());

        // Second removal: no panic, nothing released.
        assert!(reg.remove(&id).is_none());
        assert_eq!(reg.previews().live_count(), 0);
    }

    #[tokio::test]
    async fn clear_releases_every_preview() {
        let src_dir = tempfile::tempdir().unwrap();
        let reg = registry();
        let mut handles = Vec::new();
        for name in ["a.png", "b.jpg", "c.webp"] {
            let src = src_dir.path().join(name);
            std::fs::write(&src, b"img").unwrap();
            let handle = reg.previews().create(&src).await.unwrap();
            reg.insert(ImageRecord::pending(name, 3, Some(handle.clone())));
            handles.push(handle);
        }
        assert_eq!(reg.previews().live_count(), 3);

        reg.clear();

        assert!(reg.snapshot().is_empty());
        assert_eq!(reg.previews().live_count(), 0);
        assert!(handles.iter().all(|h| !h.path().exists()));

        // Clearing an empty registry is a no-op.
        reg.clear();
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn callback_sees_every_mutation() {
        #[derive(Default)]
        struct Counter(AtomicUsize);
        impl ConversionProgressCallback for Counter {
            fn on_record_added(&self, _r: &ImageRecord) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn on_record_updated(&self, _r: &ImageRecord) {
                self.0.fetch_add(10, Ordering::SeqCst);
            }
            fn on_record_removed(&self, _id: &RecordId) {
                self.0.fetch_add(100, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let reg = registry().with_callback(Some(counter.clone() as ProgressCallback));
        let a = ImageRecord::pending("a.png", 1, None);
        reg.insert(a.clone());
        reg.update(&a.id, |r| r.progress = 10);
        reg.remove(&a.id);
        reg.remove(&a.id);
        assert_eq!(counter.0.load(Ordering::SeqCst), 111);
    }
}
