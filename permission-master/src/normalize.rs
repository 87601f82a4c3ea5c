//! Mapping from native authorization values to [`PermissionStatus`]
//!
//! All functions are total: values the platform adds later (`Unknown`)
//! collapse to `NotDetermined`.

use permission_master_api::{
    AuthorizationStatus, BluetoothAuthorization, CentralManagerState, DelegateEvent,
    HealthAuthorizationStatus, LocationAuthorizationStatus, NativeStatus,
    NotificationAuthorizationStatus, PermissionStatus, PhotoAuthorizationStatus, PromptOutcome,
    RecordPermission,
};

/// Normalize a native status
///
/// The kind travels in the [`NativeStatus`] tag.
pub fn normalize(status: &NativeStatus) -> PermissionStatus {
    match *status {
        NativeStatus::Camera(s)
        | NativeStatus::Contacts(s)
        | NativeStatus::Calendar(s)
        | NativeStatus::Motion(s)
        | NativeStatus::Speech(s)
        | NativeStatus::Reminders(s)
        | NativeStatus::Music(s) => authorization(s),
        NativeStatus::Photos(s) => photos(s),
        NativeStatus::Location(s) => location(s),
        NativeStatus::Bluetooth(s) => bluetooth(s),
        NativeStatus::Microphone(s) => microphone(s),
        NativeStatus::Notifications(s) => notifications(s),
        NativeStatus::Health(s) => health(s),
    }
}

/// Normalize what a prompt completion delivered
pub fn normalize_outcome(outcome: &PromptOutcome) -> PermissionStatus {
    match outcome {
        PromptOutcome::Granted(true) => PermissionStatus::Granted,
        PromptOutcome::Granted(false) => PermissionStatus::Denied,
        PromptOutcome::Status(status) => normalize(status),
    }
}

/// Normalize a delegate callback
pub fn normalize_event(event: &DelegateEvent) -> PermissionStatus {
    match event {
        DelegateEvent::Authorization(status) => normalize(status),
        DelegateEvent::CentralState(state) => central_state(*state),
    }
}

fn authorization(status: AuthorizationStatus) -> PermissionStatus {
    match status {
        AuthorizationStatus::Authorized => PermissionStatus::Granted,
        AuthorizationStatus::Denied => PermissionStatus::Denied,
        AuthorizationStatus::Restricted => PermissionStatus::Restricted,
        AuthorizationStatus::NotDetermined | AuthorizationStatus::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

fn photos(status: PhotoAuthorizationStatus) -> PermissionStatus {
    match status {
        PhotoAuthorizationStatus::Authorized => PermissionStatus::Granted,
        PhotoAuthorizationStatus::Limited => PermissionStatus::Limited,
        PhotoAuthorizationStatus::Denied => PermissionStatus::Denied,
        PhotoAuthorizationStatus::Restricted => PermissionStatus::Restricted,
        PhotoAuthorizationStatus::NotDetermined | PhotoAuthorizationStatus::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

fn location(status: LocationAuthorizationStatus) -> PermissionStatus {
    match status {
        LocationAuthorizationStatus::AuthorizedAlways
        | LocationAuthorizationStatus::AuthorizedWhenInUse => PermissionStatus::Granted,
        LocationAuthorizationStatus::Denied => PermissionStatus::Denied,
        LocationAuthorizationStatus::Restricted => PermissionStatus::Restricted,
        LocationAuthorizationStatus::NotDetermined | LocationAuthorizationStatus::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

fn bluetooth(status: BluetoothAuthorization) -> PermissionStatus {
    match status {
        BluetoothAuthorization::AllowedAlways => PermissionStatus::Granted,
        BluetoothAuthorization::Denied => PermissionStatus::Denied,
        BluetoothAuthorization::Restricted => PermissionStatus::Restricted,
        BluetoothAuthorization::NotDetermined | BluetoothAuthorization::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

fn microphone(status: RecordPermission) -> PermissionStatus {
    match status {
        RecordPermission::Granted => PermissionStatus::Granted,
        RecordPermission::Denied => PermissionStatus::Denied,
        RecordPermission::Undetermined | RecordPermission::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

fn notifications(status: NotificationAuthorizationStatus) -> PermissionStatus {
    match status {
        NotificationAuthorizationStatus::Authorized => PermissionStatus::Granted,
        NotificationAuthorizationStatus::Denied => PermissionStatus::Denied,
        NotificationAuthorizationStatus::Provisional
        | NotificationAuthorizationStatus::Ephemeral => PermissionStatus::Limited,
        NotificationAuthorizationStatus::NotDetermined
        | NotificationAuthorizationStatus::Unknown(_) => PermissionStatus::NotDetermined,
    }
}

fn health(status: HealthAuthorizationStatus) -> PermissionStatus {
    match status {
        HealthAuthorizationStatus::SharingAuthorized => PermissionStatus::Granted,
        HealthAuthorizationStatus::SharingDenied => PermissionStatus::Denied,
        HealthAuthorizationStatus::NotDetermined | HealthAuthorizationStatus::Unknown(_) => {
            PermissionStatus::NotDetermined
        }
    }
}

// Only "on" and "unauthorized" say anything about authorization; every
// other state means the radio cannot be used right now.
fn central_state(state: CentralManagerState) -> PermissionStatus {
    match state {
        CentralManagerState::PoweredOn => PermissionStatus::Granted,
        CentralManagerState::Unauthorized => PermissionStatus::Denied,
        CentralManagerState::Unsupported
        | CentralManagerState::PoweredOff
        | CentralManagerState::Resetting
        | CentralManagerState::UnknownState => PermissionStatus::Restricted,
        CentralManagerState::Unknown(_) => PermissionStatus::NotDetermined,
    }
}
