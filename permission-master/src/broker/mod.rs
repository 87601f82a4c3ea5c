//! Permission broker
//!
//! Turns one uniform request into whatever exchange the native subsystem
//! for a kind expects, and always hands back exactly one
//! [`PermissionStatus`].
//!
//! # Request algorithm
//!
//! ```text
//! request(kind)
//!   ├─ health && data unavailable ──────────────► restricted
//!   ├─ query native status
//!   ├─ undetermined && throttle allows
//!   │    ├─ record attempt
//!   │    ├─ prompt (completion / delegate / observer)
//!   │    └─ normalize outcome ─► persist ─► resolve
//!   └─ normalize current ─► persist ─► resolve
//! ```
//!
//! Persistence is best-effort: a store that refuses writes never changes
//! the status a caller receives.

mod pending;

use permission_master_api::{
    DelegateEvent, NativeStatus, PermissionKind, PermissionStatus, RequestDiscipline,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use crate::normalize::{normalize, normalize_event, normalize_outcome};
use crate::platform::{ActivityHandler, AuthorizationDelegate, NativePermissions};
use crate::storage::Storage;
use crate::store::{KeyValueStore, StoreError};
use crate::throttle::RequestThrottle;
use pending::{Joined, PendingSlots, Waiter};

/// Storage key holding the last resolved status for `kind`
pub fn status_key(kind: PermissionKind) -> String {
    format!("permission_{}_status", kind)
}

/// Broker shared by every caller in the process
///
/// Cheap to clone; clones share the same throttle, store and pending slots.
#[derive(Clone)]
pub struct PermissionBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    platform: Arc<dyn NativePermissions>,
    store: Arc<dyn KeyValueStore>,
    throttle: RequestThrottle,
    pending: PendingSlots,
}

impl PermissionBroker {
    /// Create a broker over a native layer and a store
    pub fn new(platform: Arc<dyn NativePermissions>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                platform,
                throttle: RequestThrottle::new(store.clone()),
                store,
                pending: PendingSlots::default(),
            }),
        }
    }

    /// Human-readable OS name and version, e.g. "iOS 17.2"
    pub fn platform_version(&self) -> String {
        let platform = &self.inner.platform;
        format!("{} {}", platform.system_name(), platform.system_version())
    }

    /// Request `kind`, prompting if the user has not decided yet
    ///
    /// Resolves exactly once. If the native layer never answers a prompt the
    /// future never completes; there is no timeout.
    pub async fn request_permission(&self, kind: PermissionKind) -> PermissionStatus {
        let inner = &self.inner;

        if kind == PermissionKind::Health && !inner.platform.is_health_data_available() {
            tracing::info!(kind = %kind, "Health data unavailable on this device");
            return inner.settle(kind, PermissionStatus::Restricted);
        }

        if kind.discipline() != RequestDiscipline::Completion {
            if let Some(waiter) = inner.pending.join_existing(kind) {
                tracing::debug!(kind = %kind, "Joining request already in flight");
                return wait_for(kind, waiter).await;
            }
        }

        let current = inner.platform.authorization_status(kind).await;
        if current.is_undetermined() {
            match kind.discipline() {
                RequestDiscipline::Completion => {
                    if inner.claim_prompt(kind) {
                        return inner.prompt_with_completion(kind).await;
                    }
                }
                RequestDiscipline::Delegate | RequestDiscipline::Observer => {
                    return self.prompt_with_observer(kind, &current).await;
                }
            }
        }

        inner.settle(kind, normalize(&current))
    }

    /// Read the current status without ever prompting
    ///
    /// Only camera, photos and microphone are answered; every other kind
    /// reports `NotDetermined`.
    pub async fn check_permission_status(&self, kind: PermissionKind) -> PermissionStatus {
        if !kind.supports_status_check() {
            tracing::debug!(kind = %kind, "Status check not supported for kind");
            return PermissionStatus::NotDetermined;
        }

        let current = self.inner.platform.authorization_status(kind).await;
        self.inner.settle(kind, normalize(&current))
    }

    /// Open the app's page in the system settings
    ///
    /// Returns whether the OS reported success.
    pub async fn open_settings(&self) -> bool {
        let platform = &self.inner.platform;

        let Some(url) = platform.settings_url() else {
            tracing::warn!("No settings URL available");
            return false;
        };
        if !platform.can_open_url(&url) {
            tracing::warn!(url = %url, "Settings URL cannot be opened");
            return false;
        }

        let (tx, rx) = oneshot::channel();
        platform.open_url(
            &url,
            Box::new(move |opened| {
                let _ = tx.send(opened);
            }),
        );
        let opened = rx.await.unwrap_or(false);
        tracing::info!(url = %url, opened, "Opened settings");
        opened
    }

    /// Last status persisted for `kind`, if any
    ///
    /// This is a cache: it goes stale when the user changes the permission
    /// in the system settings.
    pub fn last_known_status(&self, kind: PermissionKind) -> Option<PermissionStatus> {
        let value = self.inner.store.get(&status_key(kind)).ok().flatten()?;
        value.as_str()?.parse().ok()
    }

    /// Allow automatic prompts for `kind` again
    pub fn reset_request_count(&self, kind: PermissionKind) -> Result<(), StoreError> {
        self.inner.throttle.reset(kind)
    }

    /// Prompt throttle used by this broker
    pub fn throttle(&self) -> &RequestThrottle {
        &self.inner.throttle
    }

    /// App-facing storage over the broker's store
    pub fn storage(&self) -> Storage {
        Storage::new(self.inner.store.clone())
    }

    /// Number of callers waiting on an in-flight delegate or observer request
    pub fn pending_requests(&self, kind: PermissionKind) -> usize {
        self.inner.pending.waiting(kind)
    }

    async fn prompt_with_observer(
        &self,
        kind: PermissionKind,
        current: &NativeStatus,
    ) -> PermissionStatus {
        let inner = &self.inner;
        match inner.pending.join(kind) {
            Joined::Follower(waiter) => wait_for(kind, waiter).await,
            Joined::Leader(waiter) => {
                if inner.claim_prompt(kind) {
                    // The exchange runs on its own task so every queued caller
                    // is answered even if this one stops polling.
                    let inner = inner.clone();
                    tokio::spawn(async move {
                        if kind.discipline() == RequestDiscipline::Observer {
                            inner.observe_once(kind).await;
                        } else {
                            inner.delegate_once(kind).await;
                        }
                    });
                } else {
                    let request = inner.pending.take(kind).unwrap_or_default();
                    request.resolve(inner.settle(kind, normalize(current)));
                }
                wait_for(kind, waiter).await
            }
        }
    }
}

impl std::fmt::Debug for PermissionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionBroker")
            .field("throttle", &self.inner.throttle)
            .finish_non_exhaustive()
    }
}

impl BrokerInner {
    /// Take one prompt from the throttle, false once the cap is reached
    ///
    /// A counter that cannot be persisted does not block the prompt.
    fn claim_prompt(&self, kind: PermissionKind) -> bool {
        match self.throttle.try_record_attempt(kind) {
            Ok(Some(attempt)) => {
                tracing::info!(kind = %kind, attempt, "Showing permission prompt");
                true
            }
            Ok(None) => {
                tracing::warn!(kind = %kind, "Prompt limit reached, reporting current status");
                false
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to persist prompt counter");
                true
            }
        }
    }

    /// Persist `status` as the last known status and hand it back
    fn settle(&self, kind: PermissionKind, status: PermissionStatus) -> PermissionStatus {
        let key = status_key(kind);
        match self.store.set(&key, Value::from(status.as_str())) {
            Ok(()) => tracing::debug!(key = %key, status = %status, "Cached permission status"),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to cache permission status")
            }
        }
        tracing::info!(kind = %kind, status = %status, "Permission resolved");
        status
    }

    async fn prompt_with_completion(&self, kind: PermissionKind) -> PermissionStatus {
        let (tx, rx) = oneshot::channel();
        self.platform.request_authorization(
            kind,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        let status = match rx.await {
            Ok(outcome) => normalize_outcome(&outcome),
            Err(_) => {
                tracing::warn!(kind = %kind, "Prompt completion dropped without a result");
                PermissionStatus::Denied
            }
        };
        self.settle(kind, status)
    }

    /// Attach a delegate, take its first event, detach, resolve
    async fn delegate_once(&self, kind: PermissionKind) {
        let slot = self.pending.guard(kind);
        let (tx, rx) = oneshot::channel();
        let delegate = Arc::new(FirstEventDelegate {
            tx: Mutex::new(Some(tx)),
        });
        let token = self.platform.attach_delegate(kind, delegate);
        self.pending.set_observer(kind, token);

        let event = rx.await;

        let request = slot.take();
        if let Some(token) = request.observer {
            self.platform.detach_delegate(token);
        }

        let status = match event {
            Ok(event) => normalize_event(&event),
            Err(_) => {
                tracing::warn!(kind = %kind, "Delegate released without reporting");
                PermissionStatus::Denied
            }
        };
        let status = self.settle(kind, status);
        request.resolve(status);
    }

    /// Start the update stream, stop it on its first update, re-query
    async fn observe_once(&self, kind: PermissionKind) {
        let slot = self.pending.guard(kind);
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        let handler: ActivityHandler = Arc::new(move || {
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(());
            }
        });
        let token = self.platform.start_activity_updates(handler);
        self.pending.set_observer(kind, token);

        let updated = rx.await.is_ok();

        let request = slot.take();
        if let Some(token) = request.observer {
            self.platform.stop_activity_updates(token);
        }

        // The update only signals that the user answered; its content is
        // irrelevant, the authorization is read fresh.
        let status = if updated {
            normalize(&self.platform.authorization_status(kind).await)
        } else {
            tracing::warn!(kind = %kind, "Update stream ended without an update");
            PermissionStatus::Denied
        };
        let status = self.settle(kind, status);
        request.resolve(status);
    }
}

/// Delegate that forwards the first event and ignores the rest
struct FirstEventDelegate {
    tx: Mutex<Option<oneshot::Sender<DelegateEvent>>>,
}

impl AuthorizationDelegate for FirstEventDelegate {
    fn authorization_changed(&self, event: DelegateEvent) {
        match self.tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => tracing::trace!(?event, "Ignoring delegate event after resolution"),
        }
    }
}

async fn wait_for(kind: PermissionKind, waiter: Waiter) -> PermissionStatus {
    waiter.await.unwrap_or_else(|_| {
        tracing::warn!(kind = %kind, "Pending request abandoned");
        PermissionStatus::Denied
    })
}
