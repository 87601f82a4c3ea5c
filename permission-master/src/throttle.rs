//! Per-kind prompt throttle
//!
//! Operating systems stop showing a permission dialog after one or two
//! app-initiated refusals and quietly report "denied" instead. The throttle
//! counts prompts per kind so the broker stops asking once the cap is hit.

use permission_master_api::PermissionKind;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

use crate::store::{KeyValueStore, StoreError};

/// Maximum number of automatic prompts shown per permission kind
pub const MAX_PROMPT_ATTEMPTS: u64 = 2;

const REQUEST_COUNT_PREFIX: &str = "permission_request_count_";

/// Storage key holding the prompt counter for `kind`
pub fn request_count_key(kind: PermissionKind) -> String {
    format!("{}{}", REQUEST_COUNT_PREFIX, kind)
}

/// Prompt counter backed by a key-value store
pub struct RequestThrottle {
    store: Arc<dyn KeyValueStore>,
    // serializes read-modify-write of counters
    guard: Mutex<()>,
}

impl RequestThrottle {
    /// Create a throttle persisting into `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Number of prompts recorded for `kind` (zero when never recorded)
    ///
    /// Unreadable or non-numeric entries count as zero.
    pub fn attempts(&self, kind: PermissionKind) -> u64 {
        match self.store.get(&request_count_key(kind)) {
            Ok(value) => value.as_ref().and_then(Value::as_u64).unwrap_or(0),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to read prompt counter");
                0
            }
        }
    }

    /// Check whether another automatic prompt may be shown for `kind`
    pub fn can_prompt(&self, kind: PermissionKind) -> bool {
        let attempts = self.attempts(kind);
        tracing::debug!(kind = %kind, attempts, "Checked prompt throttle");
        attempts < MAX_PROMPT_ATTEMPTS
    }

    /// Claim one prompt for `kind` if the cap allows it
    ///
    /// Checks and increments under one lock, so concurrent callers can never
    /// push the counter past [`MAX_PROMPT_ATTEMPTS`]. Returns the new total,
    /// or `None` when the cap is reached. An `Err` means the cap allowed the
    /// prompt but the new total could not be persisted.
    pub fn try_record_attempt(&self, kind: PermissionKind) -> Result<Option<u64>, StoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let attempts = self.attempts(kind);
        if attempts >= MAX_PROMPT_ATTEMPTS {
            return Ok(None);
        }
        let next = attempts + 1;
        self.store.set(&request_count_key(kind), Value::from(next))?;
        Ok(Some(next))
    }

    /// Forget all recorded prompts for `kind`
    pub fn reset(&self, kind: PermissionKind) -> Result<(), StoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.remove(&request_count_key(kind))
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("max_attempts", &MAX_PROMPT_ATTEMPTS)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileKeyValueStore, MemoryKeyValueStore};
    use serde_json::json;

    fn throttle() -> (Arc<MemoryKeyValueStore>, RequestThrottle) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let throttle = RequestThrottle::new(store.clone());
        (store, throttle)
    }

    #[test]
    fn test_fresh_kind_can_prompt() {
        let (_, throttle) = throttle();
        for kind in PermissionKind::ALL {
            assert!(throttle.can_prompt(kind));
            assert_eq!(throttle.attempts(kind), 0);
        }
    }

    #[test]
    fn test_cap_after_two_attempts() {
        let (store, throttle) = throttle();
        let kind = PermissionKind::Camera;

        assert_eq!(throttle.try_record_attempt(kind).unwrap(), Some(1));
        assert!(throttle.can_prompt(kind));

        assert_eq!(throttle.try_record_attempt(kind).unwrap(), Some(2));
        assert!(!throttle.can_prompt(kind));

        assert_eq!(throttle.try_record_attempt(kind).unwrap(), None);

        assert_eq!(
            store.get("permission_request_count_camera").unwrap(),
            Some(json!(2))
        );

        // Other kinds are unaffected
        assert!(throttle.can_prompt(PermissionKind::Photos));
    }

    #[test]
    fn test_reset_restores_default() {
        let (store, throttle) = throttle();
        let kind = PermissionKind::Microphone;

        throttle.try_record_attempt(kind).unwrap();
        throttle.try_record_attempt(kind).unwrap();
        assert!(!throttle.can_prompt(kind));

        throttle.reset(kind).unwrap();
        assert!(throttle.can_prompt(kind));
        assert!(!store.contains("permission_request_count_microphone").unwrap());
    }

    #[test]
    fn test_non_numeric_counter_reads_as_zero() {
        let (store, throttle) = throttle();
        store
            .set("permission_request_count_speech", json!("two"))
            .unwrap();
        assert_eq!(throttle.attempts(PermissionKind::Speech), 0);
    }

    #[test]
    fn test_counter_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        {
            let store = Arc::new(FileKeyValueStore::new(&path).unwrap());
            let throttle = RequestThrottle::new(store);
            throttle.try_record_attempt(PermissionKind::Location).unwrap();
            throttle.try_record_attempt(PermissionKind::Location).unwrap();
        }

        let store = Arc::new(FileKeyValueStore::new(&path).unwrap());
        let throttle = RequestThrottle::new(store);
        assert!(!throttle.can_prompt(PermissionKind::Location));
    }

    #[test]
    fn test_concurrent_claims_respect_cap() {
        let (_, throttle) = throttle();
        let throttle = Arc::new(throttle);
        let kind = PermissionKind::Health;
        throttle.try_record_attempt(kind).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                std::thread::spawn(move || throttle.try_record_attempt(kind).unwrap())
            })
            .collect();
        let granted = handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();

        // Only one more prompt fits under the cap
        assert_eq!(granted, vec![2]);
        assert_eq!(throttle.attempts(kind), 2);
    }

    #[test]
    fn test_unpersisted_claim_still_allows_prompt() {
        let store = Arc::new(crate::store::ReadOnlyKeyValueStore::new(
            MemoryKeyValueStore::new(),
        ));
        let throttle = RequestThrottle::new(store);
        assert!(matches!(
            throttle.try_record_attempt(PermissionKind::Camera),
            Err(StoreError::ReadOnly)
        ));
        assert_eq!(throttle.attempts(PermissionKind::Camera), 0);
    }
}
