//! permission-master: permission-request broker
//!
//! One status vocabulary and one request protocol over native permission
//! subsystems that each answer in their own way (completion handlers,
//! delegates, update streams). Repeated prompts are throttled and the last
//! resolved status of every kind is cached in a key-value store.
//!
//! ```ignore
//! use permission_master::{BrokerPresets, PermissionKind, SimulatedPlatform};
//!
//! let broker = BrokerPresets::testing(SimulatedPlatform::new());
//! let status = broker.request_permission(PermissionKind::Camera).await;
//! ```

pub mod broker;
pub mod channel;
pub mod config;
pub mod normalize;
pub mod platform;
pub mod storage;
pub mod store;
pub mod throttle;
pub mod tracing_support;

pub use broker::{status_key, PermissionBroker};
pub use channel::{request_method, ChannelError, MethodCall, MethodChannel};
pub use config::{BrokerBuilder, BrokerPresets, ConfigError};
pub use normalize::{normalize, normalize_event, normalize_outcome};
pub use platform::{
    ActivityHandler, AuthorizationDelegate, Completion, NativePermissions, ObserverToken,
    PlatformCall, PlatformCounters, SimulatedPlatform,
};
pub use storage::{Storage, StorageError};
pub use store::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, ReadOnlyKeyValueStore, StoreError,
};
pub use throttle::{request_count_key, RequestThrottle, MAX_PROMPT_ATTEMPTS};

pub use permission_master_api::{
    DelegateEvent, NativeStatus, ParseKindError, ParseStatusError, PermissionKind,
    PermissionStatus, PromptOutcome, RequestDiscipline,
};
