//! Persistent consent store
//!
//! Key-value text storage for the consent record. The store only moves
//! strings; encoding the record is the consent service's job.
//!
//! Implementations:
//! - `FileStore`: one file per key under a directory, atomic writes
//! - `MemoryStore`: in-process map with an optional byte quota

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

/// Failure reading or writing the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing storage could not be read or written
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] io::Error),

    /// Write rejected because it would exceed the storage quota
    #[error("storage quota exceeded writing '{key}' ({size} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },
}

/// Synchronous key-value text store
pub trait ConsentStore: Send + Sync {
    /// Read the value under `key`; `Ok(None)` when nothing is stored
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// File-backed store, one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::Unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{}'", key),
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl ConsentStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Unavailable(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        // temp + rename so a crash mid-write never leaves a torn record
        let tmp_path = self.dir.join(format!("{}.tmp", key));
        std::fs::write(&tmp_path, value)?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::Unavailable(e));
        }

        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }
}

/// In-process store, optionally limited to a total number of bytes
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values exceed `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Store pre-populated with one entry
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl ConsentStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(limit) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let size = key.len() + value.len();
            if others + size > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_missing_key_reads_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        assert!(store.read("cookie-consent").unwrap().is_none());
    }

    #[test]
    fn test_file_store_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("store"));

        store.write("cookie-consent", r#"{"analytics":true}"#).unwrap();
        assert_eq!(
            store.read("cookie-consent").unwrap().as_deref(),
            Some(r#"{"analytics":true}"#)
        );
        assert!(!temp_dir.path().join("store").join("cookie-consent.tmp").exists());

        // Survives a new handle on the same directory (process restart)
        let reopened = FileStore::new(temp_dir.path().join("store"));
        assert!(reopened.read("cookie-consent").unwrap().is_some());
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(store.write(key, "{}"), Err(StoreError::Unavailable(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_file_store_unwritable_directory() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the directory should be
        let blocker = temp_dir.path().join("store");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileStore::new(&blocker);
        assert!(matches!(
            store.write("cookie-consent", "{}"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.read("k").unwrap().is_none());
        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(8);
        store.write("k", "1234567").unwrap();

        // Replacing an entry only counts the new value
        store.write("k", "abcdefg").unwrap();

        let err = store.write("k", "12345678").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { size: 9, limit: 8, .. }));
        assert_eq!(store.read("k").unwrap().as_deref(), Some("abcdefg"));
    }
}
