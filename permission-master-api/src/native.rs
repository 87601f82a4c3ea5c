//! Native authorization enumerations
//!
//! Each platform subsystem reports authorization with its own enumeration.
//! These mirror them case for case, including an `Unknown` case that keeps
//! the raw value of anything a newer platform release adds.

use crate::PermissionKind;

/// Declares a native enumeration with raw-value conversions.
macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $raw:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Value not known to this build
            Unknown(i64),
        }

        impl $name {
            /// Convert from the platform's raw value
            pub fn from_raw(raw: i64) -> Self {
                match raw {
                    $($raw => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            /// Raw value as the platform reports it
            pub fn raw(&self) -> i64 {
                match self {
                    $(Self::$variant => $raw,)+
                    Self::Unknown(raw) => *raw,
                }
            }
        }
    };
}

native_enum! {
    /// Four-state authorization shared by camera, contacts, calendar,
    /// reminders, motion, speech and music
    AuthorizationStatus {
        NotDetermined = 0,
        Restricted = 1,
        Denied = 2,
        Authorized = 3,
    }
}

native_enum! {
    /// Photo library authorization
    PhotoAuthorizationStatus {
        NotDetermined = 0,
        Restricted = 1,
        Denied = 2,
        Authorized = 3,
        Limited = 4,
    }
}

native_enum! {
    /// Location services authorization
    LocationAuthorizationStatus {
        NotDetermined = 0,
        Restricted = 1,
        Denied = 2,
        AuthorizedAlways = 3,
        AuthorizedWhenInUse = 4,
    }
}

native_enum! {
    /// Bluetooth manager authorization
    BluetoothAuthorization {
        NotDetermined = 0,
        Restricted = 1,
        Denied = 2,
        AllowedAlways = 3,
    }
}

native_enum! {
    /// Audio session record permission (raw values are four-char codes)
    RecordPermission {
        Undetermined = 0x756e_6474,
        Denied = 0x6465_6e79,
        Granted = 0x6772_6e74,
    }
}

native_enum! {
    /// User notification authorization
    NotificationAuthorizationStatus {
        NotDetermined = 0,
        Denied = 1,
        Authorized = 2,
        Provisional = 3,
        Ephemeral = 4,
    }
}

native_enum! {
    /// Health store sharing authorization
    HealthAuthorizationStatus {
        NotDetermined = 0,
        SharingDenied = 1,
        SharingAuthorized = 2,
    }
}

native_enum! {
    /// Bluetooth central manager power/authorization state
    CentralManagerState {
        UnknownState = 0,
        Resetting = 1,
        Unsupported = 2,
        Unauthorized = 3,
        PoweredOff = 4,
        PoweredOn = 5,
    }
}

/// Native status tagged with the kind it was read for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeStatus {
    Camera(AuthorizationStatus),
    Photos(PhotoAuthorizationStatus),
    Location(LocationAuthorizationStatus),
    Contacts(AuthorizationStatus),
    Bluetooth(BluetoothAuthorization),
    Microphone(RecordPermission),
    Notifications(NotificationAuthorizationStatus),
    Calendar(AuthorizationStatus),
    Motion(AuthorizationStatus),
    Speech(AuthorizationStatus),
    Reminders(AuthorizationStatus),
    Music(AuthorizationStatus),
    Health(HealthAuthorizationStatus),
}

impl NativeStatus {
    /// Permission kind this status belongs to
    pub fn kind(&self) -> PermissionKind {
        match self {
            Self::Camera(_) => PermissionKind::Camera,
            Self::Photos(_) => PermissionKind::Photos,
            Self::Location(_) => PermissionKind::Location,
            Self::Contacts(_) => PermissionKind::Contacts,
            Self::Bluetooth(_) => PermissionKind::Bluetooth,
            Self::Microphone(_) => PermissionKind::Microphone,
            Self::Notifications(_) => PermissionKind::Notifications,
            Self::Calendar(_) => PermissionKind::Calendar,
            Self::Motion(_) => PermissionKind::Motion,
            Self::Speech(_) => PermissionKind::Speech,
            Self::Reminders(_) => PermissionKind::Reminders,
            Self::Music(_) => PermissionKind::Music,
            Self::Health(_) => PermissionKind::Health,
        }
    }

    /// Whether this is the subsystem's "not asked yet" value
    ///
    /// Unknown raw values are never treated as undetermined, so the broker
    /// will not prompt on a state it does not understand.
    pub fn is_undetermined(&self) -> bool {
        match self {
            Self::Camera(s)
            | Self::Contacts(s)
            | Self::Calendar(s)
            | Self::Motion(s)
            | Self::Speech(s)
            | Self::Reminders(s)
            | Self::Music(s) => *s == AuthorizationStatus::NotDetermined,
            Self::Photos(s) => *s == PhotoAuthorizationStatus::NotDetermined,
            Self::Location(s) => *s == LocationAuthorizationStatus::NotDetermined,
            Self::Bluetooth(s) => *s == BluetoothAuthorization::NotDetermined,
            Self::Microphone(s) => *s == RecordPermission::Undetermined,
            Self::Notifications(s) => *s == NotificationAuthorizationStatus::NotDetermined,
            Self::Health(s) => *s == HealthAuthorizationStatus::NotDetermined,
        }
    }

    /// The undetermined value for `kind`
    pub fn undetermined(kind: PermissionKind) -> Self {
        match kind {
            PermissionKind::Camera => Self::Camera(AuthorizationStatus::NotDetermined),
            PermissionKind::Photos => Self::Photos(PhotoAuthorizationStatus::NotDetermined),
            PermissionKind::Location => Self::Location(LocationAuthorizationStatus::NotDetermined),
            PermissionKind::Contacts => Self::Contacts(AuthorizationStatus::NotDetermined),
            PermissionKind::Bluetooth => Self::Bluetooth(BluetoothAuthorization::NotDetermined),
            PermissionKind::Microphone => Self::Microphone(RecordPermission::Undetermined),
            PermissionKind::Notifications => {
                Self::Notifications(NotificationAuthorizationStatus::NotDetermined)
            }
            PermissionKind::Calendar => Self::Calendar(AuthorizationStatus::NotDetermined),
            PermissionKind::Motion => Self::Motion(AuthorizationStatus::NotDetermined),
            PermissionKind::Speech => Self::Speech(AuthorizationStatus::NotDetermined),
            PermissionKind::Reminders => Self::Reminders(AuthorizationStatus::NotDetermined),
            PermissionKind::Music => Self::Music(AuthorizationStatus::NotDetermined),
            PermissionKind::Health => Self::Health(HealthAuthorizationStatus::NotDetermined),
        }
    }
}

/// Value delivered by a one-shot prompt completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Subsystems that only report yes/no
    Granted(bool),
    /// Subsystems that report their new authorization status
    Status(NativeStatus),
}

/// Callback payload delivered to an authorization delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateEvent {
    /// The manager reported a (possibly unchanged) authorization
    Authorization(NativeStatus),
    /// Older bluetooth stacks only report the central manager state
    CentralState(CentralManagerState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_conversions() {
        assert_eq!(
            AuthorizationStatus::from_raw(3),
            AuthorizationStatus::Authorized
        );
        assert_eq!(
            PhotoAuthorizationStatus::from_raw(4),
            PhotoAuthorizationStatus::Limited
        );
        assert_eq!(RecordPermission::Granted.raw(), 0x6772_6e74);
        assert_eq!(
            AuthorizationStatus::from_raw(42),
            AuthorizationStatus::Unknown(42)
        );
        assert_eq!(AuthorizationStatus::Unknown(42).raw(), 42);
    }

    #[test]
    fn test_undetermined_matches_kind() {
        for kind in PermissionKind::ALL {
            let status = NativeStatus::undetermined(kind);
            assert_eq!(status.kind(), kind);
            assert!(status.is_undetermined());
        }
    }

    #[test]
    fn test_unknown_is_not_undetermined() {
        let status = NativeStatus::Camera(AuthorizationStatus::Unknown(9));
        assert!(!status.is_undetermined());

        let status = NativeStatus::Microphone(RecordPermission::Denied);
        assert!(!status.is_undetermined());
    }
}
