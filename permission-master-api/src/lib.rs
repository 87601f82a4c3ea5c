//! permission-master-api: Shared vocabulary for the permission broker
//!
//! This crate defines the types exchanged between the broker, the native
//! permission layer and whatever transport exposes the broker to an app.
//! It carries no behavior beyond string conversions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod native;

pub use native::{
    AuthorizationStatus, BluetoothAuthorization, CentralManagerState, DelegateEvent,
    HealthAuthorizationStatus, LocationAuthorizationStatus, NativeStatus,
    NotificationAuthorizationStatus, PhotoAuthorizationStatus, PromptOutcome, RecordPermission,
};

/// OS-guarded capability the broker can query or request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Camera,
    Photos,
    Location,
    Contacts,
    Bluetooth,
    Microphone,
    Notifications,
    Calendar,
    Motion,
    Speech,
    Reminders,
    Music,
    Health,
}

/// How the native layer delivers the outcome of a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDiscipline {
    /// One-shot completion handler
    Completion,
    /// Long-lived delegate that reports authorization changes
    Delegate,
    /// Update stream that is stopped after its first event
    Observer,
}

impl PermissionKind {
    /// Every kind, in declaration order
    pub const ALL: [PermissionKind; 13] = [
        Self::Camera,
        Self::Photos,
        Self::Location,
        Self::Contacts,
        Self::Bluetooth,
        Self::Microphone,
        Self::Notifications,
        Self::Calendar,
        Self::Motion,
        Self::Speech,
        Self::Reminders,
        Self::Music,
        Self::Health,
    ];

    /// Lowercase identifier used in storage keys and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Photos => "photos",
            Self::Location => "location",
            Self::Contacts => "contacts",
            Self::Bluetooth => "bluetooth",
            Self::Microphone => "microphone",
            Self::Notifications => "notifications",
            Self::Calendar => "calendar",
            Self::Motion => "motion",
            Self::Speech => "speech",
            Self::Reminders => "reminders",
            Self::Music => "music",
            Self::Health => "health",
        }
    }

    /// Callback shape the native subsystem uses for this kind
    pub fn discipline(&self) -> RequestDiscipline {
        match self {
            Self::Location | Self::Bluetooth => RequestDiscipline::Delegate,
            Self::Motion => RequestDiscipline::Observer,
            _ => RequestDiscipline::Completion,
        }
    }

    /// Whether `checkPermissionStatus` answers for this kind
    pub fn supports_status_check(&self) -> bool {
        matches!(self, Self::Camera | Self::Photos | Self::Microphone)
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known permission kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown permission kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for PermissionKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// The only status vocabulary ever handed back to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Restricted,
    /// Partial access (limited photo library, provisional notifications)
    Limited,
    NotDetermined,
}

impl PermissionStatus {
    /// Wire form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Restricted => "restricted",
            Self::Limited => "limited",
            Self::NotDetermined => "notDetermined",
        }
    }

    /// Check if the app may use the capability (fully or partially)
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Granted | Self::Limited)
    }
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown permission status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for PermissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            "restricted" => Ok(Self::Restricted),
            "limited" => Ok(Self::Limited),
            "notDetermined" => Ok(Self::NotDetermined),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_forms_agree() {
        for kind in PermissionKind::ALL {
            let parsed: PermissionKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);

            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "siri".parse::<PermissionKind>().unwrap_err();
        assert_eq!(err, ParseKindError("siri".into()));
        assert!(err.to_string().contains("siri"));
    }

    #[test]
    fn test_status_wire_form() {
        assert_eq!(
            serde_json::to_string(&PermissionStatus::NotDetermined).unwrap(),
            "\"notDetermined\""
        );
        assert_eq!(
            "limited".parse::<PermissionStatus>().unwrap(),
            PermissionStatus::Limited
        );
        assert!("NOT_DETERMINED".parse::<PermissionStatus>().is_err());
    }

    #[test]
    fn test_discipline_table() {
        assert_eq!(
            PermissionKind::Location.discipline(),
            RequestDiscipline::Delegate
        );
        assert_eq!(
            PermissionKind::Bluetooth.discipline(),
            RequestDiscipline::Delegate
        );
        assert_eq!(
            PermissionKind::Motion.discipline(),
            RequestDiscipline::Observer
        );
        let completion = PermissionKind::ALL
            .iter()
            .filter(|k| k.discipline() == RequestDiscipline::Completion)
            .count();
        assert_eq!(completion, 10);
    }

    #[test]
    fn test_status_check_subset() {
        let supported: Vec<_> = PermissionKind::ALL
            .into_iter()
            .filter(PermissionKind::supports_status_check)
            .collect();
        assert_eq!(
            supported,
            vec![
                PermissionKind::Camera,
                PermissionKind::Photos,
                PermissionKind::Microphone
            ]
        );
    }

    #[test]
    fn test_usable_statuses() {
        assert!(PermissionStatus::Granted.is_usable());
        assert!(PermissionStatus::Limited.is_usable());
        assert!(!PermissionStatus::Denied.is_usable());
        assert!(!PermissionStatus::NotDetermined.is_usable());
    }
}
