//! Scriptable in-process stand-in for a native permission subsystem
//!
//! Used by tests and by hosts that want to exercise the broker without a
//! device. Every primitive call is recorded, callbacks fire on a separate
//! thread like they do on a real device, and callbacks can be held back to
//! inspect the broker while a request is suspended.

use async_trait::async_trait;
use permission_master_api::{
    CentralManagerState, DelegateEvent, NativeStatus, PermissionKind, PromptOutcome,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ActivityHandler, AuthorizationDelegate, Completion, NativePermissions, ObserverToken};
use crate::normalize::normalize;

/// A primitive invoked on the simulated platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    StatusQuery(PermissionKind),
    RequestAuthorization(PermissionKind),
    AttachDelegate(PermissionKind, ObserverToken),
    DetachDelegate(ObserverToken),
    StartActivityUpdates(ObserverToken),
    StopActivityUpdates(ObserverToken),
    HealthAvailability,
    OpenUrl(String),
}

/// Aggregated view over the recorded calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformCounters {
    pub status_queries: usize,
    pub prompts: usize,
    pub delegates_attached: usize,
    pub delegates_detached: usize,
    pub activity_started: usize,
    pub activity_stopped: usize,
}

type Deferred = Box<dyn FnOnce() + Send + 'static>;

struct SimState {
    system_name: String,
    system_version: String,
    statuses: HashMap<PermissionKind, NativeStatus>,
    answers: HashMap<PermissionKind, NativeStatus>,
    calls: Vec<PlatformCall>,
    next_token: u64,
    delegates: HashMap<ObserverToken, Arc<dyn AuthorizationDelegate>>,
    streams: HashMap<ObserverToken, ActivityHandler>,
    hold_callbacks: bool,
    drop_callbacks: bool,
    held: Vec<Deferred>,
    event_repeats: usize,
    legacy_central_state: Option<CentralManagerState>,
    health_available: bool,
    settings_url: Option<String>,
    can_open_url: bool,
    open_succeeds: bool,
}

impl SimState {
    fn status(&self, kind: PermissionKind) -> NativeStatus {
        self.statuses
            .get(&kind)
            .copied()
            .unwrap_or_else(|| NativeStatus::undetermined(kind))
    }

    /// The user "answers" the prompt: the scripted answer becomes current
    fn answer(&mut self, kind: PermissionKind) -> NativeStatus {
        if let Some(answer) = self.answers.get(&kind).copied() {
            self.statuses.insert(kind, answer);
        }
        self.status(kind)
    }

    fn token(&mut self) -> ObserverToken {
        self.next_token += 1;
        ObserverToken(self.next_token)
    }
}

/// Simulated native permission subsystem
///
/// Cloning shares the same simulated device, so a test can keep a handle
/// after passing one to the broker.
#[derive(Clone)]
pub struct SimulatedPlatform {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlatform {
    /// Every kind undetermined, callbacks delivered immediately
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                system_name: "iOS".into(),
                system_version: "17.0".into(),
                statuses: HashMap::new(),
                answers: HashMap::new(),
                calls: Vec::new(),
                next_token: 0,
                delegates: HashMap::new(),
                streams: HashMap::new(),
                hold_callbacks: false,
                drop_callbacks: false,
                held: Vec::new(),
                event_repeats: 1,
                legacy_central_state: None,
                health_available: true,
                settings_url: Some("app-settings:".into()),
                can_open_url: true,
                open_succeeds: true,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the reported OS name and version
    pub fn set_system(&self, name: impl Into<String>, version: impl Into<String>) {
        let mut state = self.state();
        state.system_name = name.into();
        state.system_version = version.into();
    }

    /// Set the current native status (as if changed in system settings)
    pub fn set_status(&self, status: NativeStatus) {
        self.state().statuses.insert(status.kind(), status);
    }

    /// Script what the user picks when prompted for `status.kind()`
    pub fn answer_with(&self, status: NativeStatus) {
        self.state().answers.insert(status.kind(), status);
    }

    /// Queue callbacks instead of delivering them
    pub fn hold_callbacks(&self, hold: bool) {
        self.state().hold_callbacks = hold;
    }

    /// Release callbacks, delegates and update handlers without invoking them
    ///
    /// Models a native layer that loses its completion or deallocates the
    /// manager before it reports anything.
    pub fn drop_callbacks(&self, enabled: bool) {
        self.state().drop_callbacks = enabled;
    }

    /// Deliver every queued callback on the calling thread
    pub fn release_callbacks(&self) -> usize {
        let held = std::mem::take(&mut self.state().held);
        let count = held.len();
        for callback in held {
            callback();
        }
        count
    }

    /// Number of callbacks currently held back
    pub fn held_callbacks(&self) -> usize {
        self.state().held.len()
    }

    /// How many times each delegate/stream callback fires
    pub fn set_event_repeats(&self, repeats: usize) {
        self.state().event_repeats = repeats.max(1);
    }

    /// Report bluetooth through the legacy central-manager state
    pub fn use_legacy_central_state(&self, state: CentralManagerState) {
        self.state().legacy_central_state = Some(state);
    }

    /// Set whether health data exists on the device
    pub fn set_health_available(&self, available: bool) {
        self.state().health_available = available;
    }

    /// Configure the settings escape hatch
    pub fn set_settings(&self, url: Option<&str>, can_open: bool, open_succeeds: bool) {
        let mut state = self.state();
        state.settings_url = url.map(str::to_string);
        state.can_open_url = can_open;
        state.open_succeeds = open_succeeds;
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// Status queries made for `kind`
    pub fn status_queries(&self, kind: PermissionKind) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| **call == PlatformCall::StatusQuery(kind))
            .count()
    }

    /// Prompts shown for `kind`, whatever primitive showed them
    pub fn prompts(&self, kind: PermissionKind) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| match call {
                PlatformCall::RequestAuthorization(k) | PlatformCall::AttachDelegate(k, _) => {
                    *k == kind
                }
                PlatformCall::StartActivityUpdates(_) => kind == PermissionKind::Motion,
                _ => false,
            })
            .count()
    }

    /// Aggregate counters over all kinds
    pub fn counters(&self) -> PlatformCounters {
        let state = self.state();
        let mut counters = PlatformCounters::default();
        for call in &state.calls {
            match call {
                PlatformCall::StatusQuery(_) => counters.status_queries += 1,
                PlatformCall::RequestAuthorization(_) => counters.prompts += 1,
                PlatformCall::AttachDelegate(..) => {
                    counters.prompts += 1;
                    counters.delegates_attached += 1;
                }
                PlatformCall::DetachDelegate(_) => counters.delegates_detached += 1,
                PlatformCall::StartActivityUpdates(_) => {
                    counters.prompts += 1;
                    counters.activity_started += 1;
                }
                PlatformCall::StopActivityUpdates(_) => counters.activity_stopped += 1,
                PlatformCall::HealthAvailability | PlatformCall::OpenUrl(_) => {}
            }
        }
        counters
    }

    /// Delegates and streams still registered
    pub fn active_observers(&self) -> usize {
        let state = self.state();
        state.delegates.len() + state.streams.len()
    }

    /// Deliver now on a separate thread, or park until released
    fn deliver(&self, mut state: MutexGuard<'_, SimState>, callback: Deferred) {
        if state.drop_callbacks {
            return;
        }
        if state.hold_callbacks {
            state.held.push(callback);
            return;
        }
        drop(state);
        std::thread::spawn(callback);
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SimulatedPlatform")
            .field("statuses", &state.statuses)
            .field("calls", &state.calls.len())
            .field("held", &state.held.len())
            .finish()
    }
}

#[async_trait]
impl NativePermissions for SimulatedPlatform {
    fn system_name(&self) -> String {
        self.state().system_name.clone()
    }

    fn system_version(&self) -> String {
        self.state().system_version.clone()
    }

    async fn authorization_status(&self, kind: PermissionKind) -> NativeStatus {
        let mut state = self.state();
        state.calls.push(PlatformCall::StatusQuery(kind));
        state.status(kind)
    }

    fn request_authorization(&self, kind: PermissionKind, completion: Completion<PromptOutcome>) {
        let mut state = self.state();
        state.calls.push(PlatformCall::RequestAuthorization(kind));
        let status = state.answer(kind);

        let outcome = match kind {
            PermissionKind::Photos | PermissionKind::Speech | PermissionKind::Music => {
                PromptOutcome::Status(status)
            }
            _ => PromptOutcome::Granted(normalize(&status).is_usable()),
        };
        self.deliver(state, Box::new(move || completion(outcome)));
    }

    fn attach_delegate(
        &self,
        kind: PermissionKind,
        delegate: Arc<dyn AuthorizationDelegate>,
    ) -> ObserverToken {
        let mut state = self.state();
        let token = state.token();
        state.calls.push(PlatformCall::AttachDelegate(kind, token));
        let status = state.answer(kind);
        if !state.drop_callbacks {
            state.delegates.insert(token, delegate.clone());
        }

        let event = match (kind, state.legacy_central_state) {
            (PermissionKind::Bluetooth, Some(central)) => DelegateEvent::CentralState(central),
            _ => DelegateEvent::Authorization(status),
        };
        let repeats = state.event_repeats;
        self.deliver(
            state,
            Box::new(move || {
                for _ in 0..repeats {
                    delegate.authorization_changed(event);
                }
            }),
        );
        token
    }

    fn detach_delegate(&self, token: ObserverToken) {
        let mut state = self.state();
        state.calls.push(PlatformCall::DetachDelegate(token));
        state.delegates.remove(&token);
    }

    fn start_activity_updates(&self, handler: ActivityHandler) -> ObserverToken {
        let mut state = self.state();
        let token = state.token();
        state.calls.push(PlatformCall::StartActivityUpdates(token));
        state.answer(PermissionKind::Motion);
        if !state.drop_callbacks {
            state.streams.insert(token, handler.clone());
        }

        let repeats = state.event_repeats;
        self.deliver(
            state,
            Box::new(move || {
                for _ in 0..repeats {
                    handler();
                }
            }),
        );
        token
    }

    fn stop_activity_updates(&self, token: ObserverToken) {
        let mut state = self.state();
        state.calls.push(PlatformCall::StopActivityUpdates(token));
        state.streams.remove(&token);
    }

    fn is_health_data_available(&self) -> bool {
        let mut state = self.state();
        state.calls.push(PlatformCall::HealthAvailability);
        state.health_available
    }

    fn settings_url(&self) -> Option<String> {
        self.state().settings_url.clone()
    }

    fn can_open_url(&self, _url: &str) -> bool {
        self.state().can_open_url
    }

    fn open_url(&self, url: &str, completion: Completion<bool>) {
        let mut state = self.state();
        state.calls.push(PlatformCall::OpenUrl(url.to_string()));
        let succeeded = state.open_succeeds;
        self.deliver(state, Box::new(move || completion(succeeded)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permission_master_api::{AuthorizationStatus, PhotoAuthorizationStatus};
    use std::sync::mpsc;

    #[tokio::test]
    async fn test_default_status_is_undetermined() {
        let platform = SimulatedPlatform::new();
        let status = platform.authorization_status(PermissionKind::Camera).await;
        assert!(status.is_undetermined());
        assert_eq!(platform.status_queries(PermissionKind::Camera), 1);
    }

    #[test]
    fn test_prompt_applies_scripted_answer() {
        let platform = SimulatedPlatform::new();
        platform.answer_with(NativeStatus::Photos(PhotoAuthorizationStatus::Limited));

        let (tx, rx) = mpsc::channel();
        platform.request_authorization(
            PermissionKind::Photos,
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        assert_eq!(
            rx.recv().unwrap(),
            PromptOutcome::Status(NativeStatus::Photos(PhotoAuthorizationStatus::Limited))
        );
        assert_eq!(platform.prompts(PermissionKind::Photos), 1);
    }

    #[test]
    fn test_boolean_outcome_kinds() {
        let platform = SimulatedPlatform::new();
        platform.answer_with(NativeStatus::Camera(AuthorizationStatus::Denied));

        let (tx, rx) = mpsc::channel();
        platform.request_authorization(
            PermissionKind::Camera,
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );
        assert_eq!(rx.recv().unwrap(), PromptOutcome::Granted(false));
    }

    #[test]
    fn test_held_callbacks() {
        let platform = SimulatedPlatform::new();
        platform.hold_callbacks(true);

        let (tx, rx) = mpsc::channel();
        platform.open_url("app-settings:", Box::new(move |ok| tx.send(ok).unwrap()));

        assert!(rx.try_recv().is_err());
        assert_eq!(platform.held_callbacks(), 1);

        assert_eq!(platform.release_callbacks(), 1);
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn test_observer_bookkeeping() {
        struct Ignore;
        impl AuthorizationDelegate for Ignore {
            fn authorization_changed(&self, _event: DelegateEvent) {}
        }

        let platform = SimulatedPlatform::new();
        let token = platform.attach_delegate(PermissionKind::Location, Arc::new(Ignore));
        assert_eq!(platform.active_observers(), 1);

        platform.detach_delegate(token);
        assert_eq!(platform.active_observers(), 0);

        let counters = platform.counters();
        assert_eq!(counters.delegates_attached, 1);
        assert_eq!(counters.delegates_detached, 1);
        assert_eq!(counters.prompts, 1);
    }

    #[test]
    fn test_dropped_callbacks_release_completion() {
        let platform = SimulatedPlatform::new();
        platform.drop_callbacks(true);

        let (tx, rx) = mpsc::channel::<PromptOutcome>();
        platform.request_authorization(
            PermissionKind::Contacts,
            Box::new(move |outcome| tx.send(outcome).unwrap()),
        );

        // Sender went away with the completion
        assert!(rx.recv().is_err());
        assert_eq!(platform.held_callbacks(), 0);
        assert_eq!(platform.prompts(PermissionKind::Contacts), 1);
    }
}
