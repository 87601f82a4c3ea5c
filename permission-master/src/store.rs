//! Key-value persistence for cached statuses, prompt counters and app values
//!
//! Provides a trait-based store that hosts can back with whatever durable
//! dictionary their platform offers. Values are arbitrary JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Error type for key-value store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse store file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store is read-only")]
    ReadOnly,

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Trait for durable string-keyed JSON storage
///
/// Hosts implement this to plug in their own persistence (user defaults,
/// shared preferences, a database table). Implementations serialize their
/// own reads and writes.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove `key` (no-op when absent)
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key
    fn clear(&self) -> Result<(), StoreError>;

    /// Check whether `key` holds a value
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

// ============================================================================
// File-based Store
// ============================================================================

/// Persistent file data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFileData {
    version: u32,
    entries: BTreeMap<String, Value>,
}

impl StoreFileData {
    fn new() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// File-based key-value store
///
/// Keeps the whole dictionary in memory and rewrites the JSON file after
/// every mutation. Default: `~/.config/<app>/storage.json`
pub struct FileKeyValueStore {
    path: PathBuf,
    data: RwLock<StoreFileData>,
}

impl FileKeyValueStore {
    /// Open (or start) a store at the specified path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let data = if path.exists() {
            let file = File::open(&path)?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            StoreFileData::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Create a store in the default location for an application
    pub fn default_for_app(app_name: &str) -> Result<Self, StoreError> {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        Self::new(config_dir.join(app_name).join("storage.json"))
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreFileData>, StoreError> {
        self.data.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreFileData>, StoreError> {
        self.data.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Write the dictionary to disk while the caller still holds the lock
    fn save(&self, data: &StoreFileData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writer.flush()?;
        Ok(())
    }

    /// Apply `change` to a copy, persist it, then publish it
    ///
    /// The in-memory map only changes once the file is written. `change`
    /// returns false when there is nothing to save.
    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, Value>) -> bool,
    ) -> Result<(), StoreError> {
        let mut data = self.write()?;
        let mut next = data.clone();
        if !change(&mut next.entries) {
            return Ok(());
        }
        self.save(&next)?;
        *data = next;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.clear();
            true
        })
    }
}

impl std::fmt::Debug for FileKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyValueStore")
            .field("path", &self.path)
            .finish()
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory store for tests or hosts without durable storage
#[derive(Default)]
pub struct MemoryKeyValueStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        data.clear();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyValueStore")
            .field("count", &self.len())
            .finish()
    }
}

// ============================================================================
// Read-Only Store
// ============================================================================

/// Read-only wrapper for any store
///
/// Every mutation fails with [`StoreError::ReadOnly`]. Useful for
/// inspecting a snapshot, or for checking that callers tolerate a store
/// that refuses writes.
pub struct ReadOnlyKeyValueStore<S: KeyValueStore> {
    inner: S,
}

impl<S: KeyValueStore> ReadOnlyKeyValueStore<S> {
    /// Create a read-only wrapper
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: KeyValueStore> KeyValueStore for ReadOnlyKeyValueStore<S> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

impl<S: KeyValueStore + std::fmt::Debug> std::fmt::Debug for ReadOnlyKeyValueStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyKeyValueStore")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        assert!(store.is_empty());

        store.set("theme", json!("dark")).unwrap();
        assert_eq!(store.get("theme").unwrap(), Some(json!("dark")));
        assert!(store.contains("theme").unwrap());

        store.remove("theme").unwrap();
        assert!(store.get("theme").unwrap().is_none());
        assert!(!store.contains("theme").unwrap());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileKeyValueStore::new(&path).unwrap();
        store
            .set("permission_request_count_camera", json!(1))
            .unwrap();
        store
            .set("profile", json!({"name": "ada", "tags": ["a", "b"]}))
            .unwrap();

        assert!(path.exists());

        let reopened = FileKeyValueStore::new(&path).unwrap();
        assert_eq!(
            reopened.get("permission_request_count_camera").unwrap(),
            Some(json!(1))
        );
        assert_eq!(
            reopened.get("profile").unwrap(),
            Some(json!({"name": "ada", "tags": ["a", "b"]}))
        );
    }

    #[test]
    fn test_file_store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileKeyValueStore::new(&path).unwrap();
        store.set("a", json!(1)).unwrap();
        store.set("b", json!(2)).unwrap();
        store.clear().unwrap();

        let reopened = FileKeyValueStore::new(&path).unwrap();
        assert!(!reopened.contains("a").unwrap());
        assert!(!reopened.contains("b").unwrap());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileKeyValueStore::new(&path),
            Err(StoreError::Parse(_))
        ));
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so the save cannot happen
        fs::write(dir.path().join("blocker"), "").unwrap();
        let store = FileKeyValueStore::new(dir.path().join("blocker").join("storage.json")).unwrap();

        assert!(matches!(store.set("a", json!(1)), Err(StoreError::Io(_))));
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_full_disk_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = FileKeyValueStore::new(&path).unwrap();
        store.set("kept", json!(true)).unwrap();

        fs::remove_file(&path).unwrap();
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        assert!(matches!(store.set("a", json!(1)), Err(StoreError::Io(_))));
        assert!(store.get("a").unwrap().is_none());

        assert!(matches!(store.clear(), Err(StoreError::Io(_))));
        assert_eq!(store.get("kept").unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_read_only_store() {
        let inner = MemoryKeyValueStore::new();
        inner.set("pre-existing", json!(true)).unwrap();

        let store = ReadOnlyKeyValueStore::new(inner);

        // Can read
        assert_eq!(store.get("pre-existing").unwrap(), Some(json!(true)));
        assert!(store.contains("pre-existing").unwrap());

        // Cannot write
        assert!(matches!(
            store.set("new", json!(1)),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(
            store.remove("pre-existing"),
            Err(StoreError::ReadOnly)
        ));
        assert!(matches!(store.clear(), Err(StoreError::ReadOnly)));
    }
}
