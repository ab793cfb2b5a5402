//! Durable key/value storage for persisted client state.
//!
//! Each key holds one JSON document. `FileStorage` keeps them as
//! `{dir}/{key}.json`; `MemoryStorage` keeps them in a map and is used by
//! tests and ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Storage key for the task collection.
pub const TASKS_KEY: &str = "veo_tasks";

/// Storage key for the connection settings.
pub const SETTINGS_KEY: &str = "veo_config";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Backend that persisted state is loaded from and saved to.
pub trait Storage: Send + Sync {
    /// Read the raw document stored under `key`, or `None` if nothing was saved.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the document stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Shared storage backend.
pub type SharedStorage = Arc<dyn Storage>;

/// Stores each key as a JSON file in one directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| StorageError::Io { path, source })
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Ensure parent directory exists
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(key);
        std::fs::write(&path, value).map_err(|source| StorageError::Io { path: path.clone(), source })?;
        tracing::debug!("Saved {} to {}", key, path.display());
        Ok(())
    }
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key with a raw document, bypassing any serialization.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_roundtrip() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path().join("state"));

        // Missing key reads as absent, and the directory is created lazily
        assert!(storage.load(TASKS_KEY).unwrap().is_none());
        assert!(!storage.dir().exists());

        storage.save(TASKS_KEY, "[]").unwrap();
        assert_eq!(storage.load(TASKS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(temp.path().join("state/veo_tasks.json").exists());

        storage.save(TASKS_KEY, "[1]").unwrap();
        assert_eq!(storage.load(TASKS_KEY).unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_memory_storage_keys_are_independent() {
        let storage = MemoryStorage::new().with_entry(SETTINGS_KEY, "{}");

        assert_eq!(storage.load(SETTINGS_KEY).unwrap().as_deref(), Some("{}"));
        assert!(storage.load(TASKS_KEY).unwrap().is_none());

        storage.save(TASKS_KEY, "[]").unwrap();
        assert_eq!(storage.load(SETTINGS_KEY).unwrap().as_deref(), Some("{}"));
    }
}
