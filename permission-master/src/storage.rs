//! JSON value storage exposed to the app
//!
//! Thin facade over a [`KeyValueStore`] that enforces what may be stored
//! and applies caller-supplied defaults on read.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::store::{KeyValueStore, StoreError};

/// Error type for storage facade operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Value is not JSON serializable: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// App-facing key-value storage
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn KeyValueStore>,
}

impl Storage {
    /// Wrap a store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Serialize `value` and store it under `key`
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value =
            serde_json::to_value(value).map_err(|e| StorageError::InvalidValue(e.to_string()))?;
        self.write_value(key, value)
    }

    /// Store an already-built JSON value under `key`
    ///
    /// `null` is rejected: absence is expressed with [`Storage::remove`].
    pub fn write_value(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if value.is_null() {
            return Err(StorageError::InvalidValue(
                "null cannot be stored; remove the key instead".into(),
            ));
        }
        self.store.set(key, value)?;
        tracing::debug!(key = %key, "Stored value");
        Ok(())
    }

    /// Read the value under `key`, or `default` when absent
    pub fn read(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, StorageError> {
        Ok(self.store.get(key)?.or(default))
    }

    /// Check whether `key` holds a value
    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.store.contains(key)?)
    }

    /// Remove `key`
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)?;
        Ok(())
    }

    /// Remove every key, including cached statuses and prompt counters
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.clear()?;
        tracing::info!("Storage cleared");
        Ok(())
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}
