//! Native permission subsystem interface
//!
//! The broker never talks to an OS API directly. A host implements
//! [`NativePermissions`] on top of its platform bindings; each method mirrors
//! one primitive the platform offers, with the platform's own callback shape:
//!
//! | Kinds | Prompt primitive | Outcome delivery |
//! |-------|------------------|------------------|
//! | camera, photos, contacts, microphone, notifications, calendar, reminders, speech, music, health | [`request_authorization`](NativePermissions::request_authorization) | one-shot [`Completion`] |
//! | location, bluetooth | [`attach_delegate`](NativePermissions::attach_delegate) | [`AuthorizationDelegate`], possibly repeated |
//! | motion | [`start_activity_updates`](NativePermissions::start_activity_updates) | [`ActivityHandler`] stream |
//!
//! Callbacks may be invoked from any thread.

use async_trait::async_trait;
use permission_master_api::{DelegateEvent, NativeStatus, PermissionKind, PromptOutcome};
use std::sync::Arc;

mod simulated;

pub use simulated::{PlatformCall, PlatformCounters, SimulatedPlatform};

/// One-shot callback handed to the native layer
pub type Completion<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Handler invoked for every motion activity update
///
/// The activity itself is not surfaced; the broker only needs to know that
/// the stream produced something.
pub type ActivityHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handle for a registered delegate or update stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

/// Receiver for push-style authorization callbacks
pub trait AuthorizationDelegate: Send + Sync {
    /// Called whenever the manager reports authorization
    fn authorization_changed(&self, event: DelegateEvent);
}

/// Native permission subsystem
#[async_trait]
pub trait NativePermissions: Send + Sync {
    /// Operating system name (e.g. "iOS")
    fn system_name(&self) -> String;

    /// Operating system version (e.g. "17.2")
    fn system_version(&self) -> String;

    /// Read the current native authorization for `kind`
    async fn authorization_status(&self, kind: PermissionKind) -> NativeStatus;

    /// Show the prompt for a completion-style kind
    fn request_authorization(&self, kind: PermissionKind, completion: Completion<PromptOutcome>);

    /// Create the manager for a delegate-style kind with `delegate` attached
    /// and trigger its prompt
    fn attach_delegate(
        &self,
        kind: PermissionKind,
        delegate: Arc<dyn AuthorizationDelegate>,
    ) -> ObserverToken;

    /// Release a manager created by [`attach_delegate`](Self::attach_delegate)
    fn detach_delegate(&self, token: ObserverToken);

    /// Start the motion activity stream (the first start triggers the prompt)
    fn start_activity_updates(&self, handler: ActivityHandler) -> ObserverToken;

    /// Stop a stream started by [`start_activity_updates`](Self::start_activity_updates)
    fn stop_activity_updates(&self, token: ObserverToken);

    /// Whether health data exists on this device at all
    fn is_health_data_available(&self) -> bool;

    /// URL of the app's page in the system settings, if the platform has one
    fn settings_url(&self) -> Option<String>;

    /// Whether `url` can be opened
    fn can_open_url(&self, url: &str) -> bool;

    /// Open `url`, reporting success through `completion`
    fn open_url(&self, url: &str, completion: Completion<bool>);
}
