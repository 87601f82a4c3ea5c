//! Single-slot registry for requests answered by delegates or observers
//!
//! At most one native exchange runs per kind. Callers arriving while it is
//! in flight are queued on the same slot and receive the same status.

use permission_master_api::{PermissionKind, PermissionStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::platform::ObserverToken;

/// Receiving half handed to a waiting caller
pub(crate) type Waiter = oneshot::Receiver<PermissionStatus>;

/// In-flight request for one kind
#[derive(Debug, Default)]
pub(crate) struct PendingRequest {
    waiters: Vec<oneshot::Sender<PermissionStatus>>,
    /// Delegate or stream registered for this request
    pub(crate) observer: Option<ObserverToken>,
}

impl PendingRequest {
    /// Hand `status` to every queued caller, returning how many received it
    pub(crate) fn resolve(self, status: PermissionStatus) -> usize {
        self.waiters
            .into_iter()
            .filter_map(|waiter| waiter.send(status).ok())
            .count()
    }
}

/// Outcome of joining a slot
pub(crate) enum Joined {
    /// Slot was empty; the caller must drive the native exchange
    Leader(Waiter),
    /// A request is already in flight; just wait for it
    Follower(Waiter),
}

#[derive(Debug, Default)]
pub(crate) struct PendingSlots {
    slots: Mutex<HashMap<PermissionKind, PendingRequest>>,
}

impl PendingSlots {
    fn slots(&self) -> MutexGuard<'_, HashMap<PermissionKind, PendingRequest>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a caller on the slot for `kind`, opening it if empty
    pub(crate) fn join(&self, kind: PermissionKind) -> Joined {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots();
        match slots.get_mut(&kind) {
            Some(request) => {
                request.waiters.push(tx);
                Joined::Follower(rx)
            }
            None => {
                slots.insert(
                    kind,
                    PendingRequest {
                        waiters: vec![tx],
                        observer: None,
                    },
                );
                Joined::Leader(rx)
            }
        }
    }

    /// Queue a caller only if a request for `kind` is already in flight
    pub(crate) fn join_existing(&self, kind: PermissionKind) -> Option<Waiter> {
        let mut slots = self.slots();
        let request = slots.get_mut(&kind)?;
        let (tx, rx) = oneshot::channel();
        request.waiters.push(tx);
        Some(rx)
    }

    /// Remember the observer registered for the in-flight request
    pub(crate) fn set_observer(&self, kind: PermissionKind, token: ObserverToken) {
        if let Some(request) = self.slots().get_mut(&kind) {
            request.observer = Some(token);
        }
    }

    /// Clear the slot for `kind`, returning what it held
    pub(crate) fn take(&self, kind: PermissionKind) -> Option<PendingRequest> {
        self.slots().remove(&kind)
    }

    /// Guard that clears the slot for `kind` unless taken explicitly
    pub(crate) fn guard(&self, kind: PermissionKind) -> SlotGuard<'_> {
        SlotGuard {
            slots: self,
            kind,
            armed: true,
        }
    }

    /// Number of callers waiting on `kind`
    pub(crate) fn waiting(&self, kind: PermissionKind) -> usize {
        self.slots()
            .get(&kind)
            .map(|request| request.waiters.len())
            .unwrap_or(0)
    }
}

/// Clears a slot if the exchange driving it ends without taking it
///
/// A panicking native layer would otherwise leave the slot open and every
/// later request for the kind would queue on it forever. Waiters of a
/// cleared slot see their sender dropped.
pub(crate) struct SlotGuard<'a> {
    slots: &'a PendingSlots,
    kind: PermissionKind,
    armed: bool,
}

impl SlotGuard<'_> {
    /// Take the slot, disarming the guard
    pub(crate) fn take(mut self) -> PendingRequest {
        self.armed = false;
        self.slots.take(self.kind).unwrap_or_default()
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.slots.take(self.kind).is_some() {
            tracing::error!(kind = %self.kind, "Native exchange ended abnormally, releasing waiters");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_joiner_leads() {
        let slots = PendingSlots::default();
        assert!(matches!(
            slots.join(PermissionKind::Location),
            Joined::Leader(_)
        ));
        assert!(matches!(
            slots.join(PermissionKind::Location),
            Joined::Follower(_)
        ));
        // Independent per kind
        assert!(matches!(
            slots.join(PermissionKind::Bluetooth),
            Joined::Leader(_)
        ));
        assert_eq!(slots.waiting(PermissionKind::Location), 2);
    }

    #[test]
    fn test_join_existing_requires_open_slot() {
        let slots = PendingSlots::default();
        assert!(slots.join_existing(PermissionKind::Motion).is_none());

        let _leader = slots.join(PermissionKind::Motion);
        assert!(slots.join_existing(PermissionKind::Motion).is_some());
        assert_eq!(slots.waiting(PermissionKind::Motion), 2);
    }

    #[tokio::test]
    async fn test_resolve_reaches_every_waiter() {
        let slots = PendingSlots::default();
        let Joined::Leader(first) = slots.join(PermissionKind::Location) else {
            panic!("expected leader");
        };
        let Joined::Follower(second) = slots.join(PermissionKind::Location) else {
            panic!("expected follower");
        };
        slots.set_observer(PermissionKind::Location, ObserverToken(7));

        let request = slots.take(PermissionKind::Location).unwrap();
        assert_eq!(request.observer, Some(ObserverToken(7)));
        assert_eq!(request.resolve(PermissionStatus::Granted), 2);

        assert_eq!(first.await.unwrap(), PermissionStatus::Granted);
        assert_eq!(second.await.unwrap(), PermissionStatus::Granted);
        assert_eq!(slots.waiting(PermissionKind::Location), 0);
    }

    #[test]
    fn test_resolve_skips_dropped_waiters() {
        let slots = PendingSlots::default();
        let kept = slots.join(PermissionKind::Bluetooth);
        drop(slots.join(PermissionKind::Bluetooth));

        let request = slots.take(PermissionKind::Bluetooth).unwrap();
        assert_eq!(request.resolve(PermissionStatus::Denied), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_waiters() {
        let slots = PendingSlots::default();
        let Joined::Leader(waiter) = slots.join(PermissionKind::Motion) else {
            panic!("expected leader");
        };

        drop(slots.guard(PermissionKind::Motion));

        assert_eq!(slots.waiting(PermissionKind::Motion), 0);
        assert!(waiter.await.is_err());
    }

    #[test]
    fn test_taken_guard_leaves_resolution_to_caller() {
        let slots = PendingSlots::default();
        let _leader = slots.join(PermissionKind::Location);

        let request = slots.guard(PermissionKind::Location).take();
        assert_eq!(request.resolve(PermissionStatus::Granted), 1);
        assert!(slots.take(PermissionKind::Location).is_none());
    }
}
