//! Client-local persistent key/value storage.
//!
//! The client keeps three independently recoverable pieces of state, each
//! under its own key: the journal, the sequence counter, and the batch
//! cursor. [`LocalStore`] dispatches between a directory of files (one per
//! key) and an in-process map used by tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{ClientError, storage};

/// Key holding the journal (JSON array of entries).
pub const JOURNAL_KEY: &str = "animEvents";

/// Key holding the sequence counter.
pub const SEQUENCE_KEY: &str = "animEventSeq";

/// Key holding the batch cursor.
pub const BATCH_CURSOR_KEY: &str = "animEventBatchSeq";

/// Local key/value storage backend.
///
/// Uses enum dispatch instead of a trait object since the operations are
/// async.
#[derive(Debug, Clone)]
pub enum LocalStore {
    /// One file per key inside a directory.
    Fs(FsStore),
    /// In-process map.
    Memory(MemoryStore),
}

impl LocalStore {
    /// File-backed store rooted at `dir`.
    pub fn fs(dir: impl Into<PathBuf>) -> Self {
        Self::Fs(FsStore::new(dir))
    }

    /// Empty in-memory store.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::default())
    }

    /// Read the value stored under `key`, if any.
    pub async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        match self {
            Self::Fs(store) => store.get(key).await,
            Self::Memory(store) => Ok(store.get(key).await),
        }
    }

    /// Durably store `value` under `key`, replacing any previous value.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), ClientError> {
        match self {
            Self::Fs(store) => store.put(key, value).await,
            Self::Memory(store) => store.put(key, value).await,
        }
    }

    /// Remove `key`. Removing a missing key succeeds.
    pub async fn del(&self, key: &str) -> Result<(), ClientError> {
        match self {
            Self::Fs(store) => store.del(key).await,
            Self::Memory(store) => store.del(key).await,
        }
    }

    /// Read `key` as an unsigned counter.
    ///
    /// A missing or unparsable value reads as 0.
    pub async fn get_counter(&self, key: &str) -> Result<u64, ClientError> {
        let raw = self.get(key).await?;
        Ok(raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Key/value store using one file per key.
///
/// Writes go to a sibling temp file which is synced and then renamed over
/// the target, so a crash leaves either the old value or the new one.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage("error reading", path, e)),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage("error creating directory", &self.dir, e))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.tmp"));

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| storage("error creating", &tmp, e))?;
        file.write_all(value.as_bytes())
            .await
            .map_err(|e| storage("error writing", &tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage("error syncing", &tmp, e))?;
        drop(file);

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage("error replacing", &path, e))
    }

    async fn del(&self, key: &str) -> Result<(), ClientError> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage("error deleting", path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-process key/value store.
///
/// Clones share the same map. Writes can be made to fail on demand to
/// simulate an unavailable or full storage area.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Make subsequent `put` and `del` calls fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, key: &str) -> Result<(), ClientError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientError::StorageUnavailable(key.to_owned()));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.check_writable(key)?;
        self.values
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), ClientError> {
        self.check_writable(key)?;
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::fs(dir.path().join("state"));

        store.put(SEQUENCE_KEY, "12").await.unwrap();

        assert_eq!(store.get(SEQUENCE_KEY).await.unwrap().as_deref(), Some("12"));
        assert_eq!(store.get_counter(SEQUENCE_KEY).await.unwrap(), 12);
        assert!(!dir.path().join("state").join("animEventSeq.tmp").exists());
    }

    #[tokio::test]
    async fn fs_missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::fs(dir.path());

        assert_eq!(store.get(JOURNAL_KEY).await.unwrap(), None);
        assert_eq!(store.get_counter(BATCH_CURSOR_KEY).await.unwrap(), 0);
        store.del(JOURNAL_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn fs_put_replaces_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::fs(dir.path());

        store.put(BATCH_CURSOR_KEY, "3").await.unwrap();
        store.put(BATCH_CURSOR_KEY, "4").await.unwrap();
        store.del(SEQUENCE_KEY).await.unwrap();

        assert_eq!(store.get_counter(BATCH_CURSOR_KEY).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn garbage_counter_reads_as_zero() {
        let store = LocalStore::memory();
        store.put(SEQUENCE_KEY, "not a number").await.unwrap();
        assert_eq!(store.get_counter(SEQUENCE_KEY).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn memory_write_failure_is_reported() {
        let inner = MemoryStore::default();
        let store = LocalStore::Memory(inner.clone());
        store.put(SEQUENCE_KEY, "1").await.unwrap();

        inner.set_fail_writes(true);
        let err = store.put(SEQUENCE_KEY, "2").await.unwrap_err();

        assert!(matches!(err, ClientError::StorageUnavailable(ref key) if key == SEQUENCE_KEY));
        assert_eq!(store.get_counter(SEQUENCE_KEY).await.unwrap(), 1);
    }
}
