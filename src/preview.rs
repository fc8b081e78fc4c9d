//! Ephemeral preview handles.
//!
//! Each accepted file gets a private copy inside a [`TempDir`] owned by the
//! [`PreviewStore`]. The copy is the record's thumbnail source: it stays
//! valid while the record exists, even if the original file is moved, and is
//! deleted when the record is removed. Anything still live when the store is
//! dropped goes away with the temp directory.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A local, short-lived reference to a preview copy.
///
/// Cloning the handle does not duplicate the resource; release goes through
/// [`PreviewStore::release`], which frees it at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewHandle {
    id: u64,
    path: PathBuf,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Allocates and releases preview handles.
#[derive(Debug)]
pub struct PreviewStore {
    dir: TempDir,
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl PreviewStore {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("avifhook-previews-").tempdir()?;
        debug!("Preview store at {}", dir.path().display());
        Ok(Self {
            dir,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Copy `source` into the store and return a handle to the copy.
    pub async fn create(&self, source: &Path) -> io::Result<PreviewHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "preview".to_string());
        let path = self.dir.path().join(format!("{id}-{name}"));

        tokio::fs::copy(source, &path).await?;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);

        Ok(PreviewHandle { id, path })
    }

    /// Release a handle. Returns `true` only for the call that actually freed it.
    pub fn release(&self, handle: &PreviewHandle) -> bool {
        let was_live = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);
        if !was_live {
            return false;
        }

        match std::fs::remove_file(&handle.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete preview {}: {}", handle.path.display(), e),
        }
        true
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_copies_and_release_deletes_once() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("cat.png");
        std::fs::write(&src, b"not really a png").unwrap();

        let store = PreviewStore::new().unwrap();
        let handle = store.create(&src).await.unwrap();

        assert!(handle.path().starts_with(store.dir()));
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"not really a png");
        assert_eq!(store.live_count(), 1);

        assert!(store.release(&handle));
        assert!(!handle.path().exists());
        assert!(!store.is_live(&handle));

        // A clone of a released handle cannot free it again.
        assert!(!store.release(&handle.clone()));
        assert_eq!(store.live_count(), 0);
    }

    #[tokio::test]
    async fn create_fails_for_missing_source() {
        let store = PreviewStore::new().unwrap();
        let err = store.create(Path::new("/definitely/not/here.png")).await;
        assert!(err.is_err());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn store_directory_goes_away_on_drop() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("dog.jpg");
        std::fs::write(&src, b"woof").unwrap();

        let store = PreviewStore::new().unwrap();
        let dir = store.dir().to_path_buf();
        let handle = tokio_test::block_on(store.create(&src)).unwrap();
        assert!(handle.path().exists());

        drop(store);
        assert!(!dir.exists());
    }
}
