//! Broker construction
//!
//! [`BrokerBuilder`] wires a native layer and a store into a
//! [`PermissionBroker`]; [`BrokerPresets`] covers the two setups most hosts
//! need.

use std::sync::Arc;
use thiserror::Error;

use crate::broker::PermissionBroker;
use crate::platform::NativePermissions;
use crate::store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};

/// Application name used for the default store path
pub const DEFAULT_APP_NAME: &str = "permission-master";

/// Errors raised while building a broker
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No native permission layer configured")]
    MissingPlatform,

    #[error("Failed to initialize store: {0}")]
    StoreInit(String),
}

/// Builder for [`PermissionBroker`]
#[derive(Default)]
pub struct BrokerBuilder {
    app_name: Option<String>,
    store: Option<Arc<dyn KeyValueStore>>,
    platform: Option<Arc<dyn NativePermissions>>,
}

impl BrokerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name (used for the default store path)
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the key-value store
    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an already shared key-value store
    pub fn shared_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the native permission layer
    pub fn platform(mut self, platform: impl NativePermissions + 'static) -> Self {
        self.platform = Some(Arc::new(platform));
        self
    }

    /// Build the broker
    ///
    /// Without an explicit store, a [`FileKeyValueStore`] is opened under the
    /// user's config directory.
    pub fn build(self) -> Result<PermissionBroker, ConfigError> {
        let platform = self.platform.ok_or(ConfigError::MissingPlatform)?;

        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(s) => s,
            None => {
                let app_name = self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME);
                let store = FileKeyValueStore::default_for_app(app_name)
                    .map_err(|e| ConfigError::StoreInit(e.to_string()))?;
                tracing::debug!(path = %store.path().display(), "Opened default store");
                Arc::new(store)
            }
        };

        Ok(PermissionBroker::new(platform, store))
    }
}

impl std::fmt::Debug for BrokerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerBuilder")
            .field("app_name", &self.app_name)
            .field("store", &self.store.is_some())
            .field("platform", &self.platform.is_some())
            .finish()
    }
}

/// Ready-made broker setups
pub struct BrokerPresets;

impl BrokerPresets {
    /// Broker persisting to `<config_dir>/<app_name>/storage.json`
    pub fn persistent(
        app_name: &str,
        platform: impl NativePermissions + 'static,
    ) -> Result<PermissionBroker, ConfigError> {
        BrokerBuilder::new()
            .app_name(app_name)
            .platform(platform)
            .build()
    }

    /// Broker with an in-memory store, for tests and previews
    pub fn testing(platform: impl NativePermissions + 'static) -> PermissionBroker {
        PermissionBroker::new(Arc::new(platform), Arc::new(MemoryKeyValueStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::status_key;
    use crate::platform::SimulatedPlatform;
    use permission_master_api::{AuthorizationStatus, NativeStatus, PermissionKind};
    use tempfile::TempDir;

    #[test]
    fn test_builder_requires_platform() {
        let result = BrokerBuilder::new()
            .store(MemoryKeyValueStore::new())
            .build();
        assert!(matches!(result, Err(ConfigError::MissingPlatform)));
    }

    #[tokio::test]
    async fn test_builder_with_file_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let platform = SimulatedPlatform::new();
        platform.set_status(NativeStatus::Calendar(AuthorizationStatus::Denied));

        let broker = BrokerBuilder::new()
            .app_name("calendar-demo")
            .store(FileKeyValueStore::new(&path).unwrap())
            .platform(platform)
            .build()
            .unwrap();
        broker.request_permission(PermissionKind::Calendar).await;

        // A fresh store over the same file sees the cached status
        let reopened = FileKeyValueStore::new(&path).unwrap();
        assert_eq!(
            reopened.get(&status_key(PermissionKind::Calendar)).unwrap(),
            Some(serde_json::json!("denied"))
        );
    }

    #[test]
    fn test_shared_store_is_visible_to_caller() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let broker = BrokerBuilder::new()
            .shared_store(store.clone())
            .platform(SimulatedPlatform::new())
            .build()
            .unwrap();

        broker.storage().write("theme", "dark").unwrap();
        assert!(store.contains("theme").unwrap());
    }

    #[tokio::test]
    async fn test_testing_preset() {
        let platform = SimulatedPlatform::new();
        platform.set_status(NativeStatus::Reminders(AuthorizationStatus::Authorized));
        let broker = BrokerPresets::testing(platform);

        broker.request_permission(PermissionKind::Reminders).await;
        assert_eq!(
            broker.last_known_status(PermissionKind::Reminders),
            Some(permission_master_api::PermissionStatus::Granted)
        );
    }
}
