//! Method-call boundary surface
//!
//! Applications reach the broker through named method calls carrying a JSON
//! argument map. [`MethodChannel`] decodes the call, runs it, and encodes the
//! reply as a JSON value or a [`ChannelError`] with a stable wire code.

use permission_master_api::{PermissionKind, PermissionStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::broker::PermissionBroker;
use crate::storage::{Storage, StorageError};
use crate::store::StoreError;

/// Errors reported to the caller of a method
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    #[error("Storage write failed: {0}")]
    WriteFailed(#[source] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ChannelError {
    /// Wire code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "INVALID_ARGS",
            Self::InvalidValue(_) => "INVALID_VALUE",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::WriteFailed(_) => "WRITE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

/// A named method invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Call without arguments
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }
}

/// Method name that requests `kind`
pub fn request_method(kind: PermissionKind) -> &'static str {
    match kind {
        PermissionKind::Camera => "requestCameraPermission",
        PermissionKind::Photos => "requestPhotosPermission",
        PermissionKind::Location => "requestLocationPermission",
        PermissionKind::Contacts => "requestContactsPermission",
        PermissionKind::Bluetooth => "requestBluetoothPermission",
        PermissionKind::Microphone => "requestMicrophonePermission",
        PermissionKind::Notifications => "requestNotificationPermission",
        PermissionKind::Calendar => "requestCalendarPermission",
        PermissionKind::Motion => "requestMotionPermission",
        PermissionKind::Speech => "requestSpeechPermission",
        PermissionKind::Reminders => "requestRemindersPermission",
        PermissionKind::Music => "requestMusicPermission",
        PermissionKind::Health => "requestHealthPermission",
    }
}

fn requested_kind(method: &str) -> Option<PermissionKind> {
    PermissionKind::ALL
        .into_iter()
        .find(|kind| request_method(*kind) == method)
}

/// Dispatches method calls to a broker and its storage
#[derive(Debug, Clone)]
pub struct MethodChannel {
    broker: PermissionBroker,
    storage: Storage,
}

impl MethodChannel {
    /// Channel over `broker`, using the broker's store for storage calls
    pub fn new(broker: PermissionBroker) -> Self {
        let storage = broker.storage();
        Self { broker, storage }
    }

    pub fn broker(&self) -> &PermissionBroker {
        &self.broker
    }

    /// Run one method call
    pub async fn handle(&self, call: MethodCall) -> Result<Value, ChannelError> {
        tracing::debug!(method = %call.method, "Handling method call");

        if let Some(kind) = requested_kind(&call.method) {
            let status = self.broker.request_permission(kind).await;
            return Ok(status_value(status));
        }

        let args = &call.arguments;
        match call.method.as_str() {
            "getPlatformVersion" => Ok(Value::from(self.broker.platform_version())),
            "checkPermissionStatus" => {
                let permission = string_arg(args, "permission")?;
                let status = match permission.parse::<PermissionKind>() {
                    Ok(kind) => self.broker.check_permission_status(kind).await,
                    Err(_) => {
                        tracing::debug!(permission = %permission, "Unrecognized permission");
                        PermissionStatus::NotDetermined
                    }
                };
                Ok(status_value(status))
            }
            "storage_write" => {
                let key = string_arg(args, "key")?;
                let value = object(args)?
                    .get("value")
                    .cloned()
                    .ok_or_else(|| ChannelError::InvalidArguments("missing \"value\"".into()))?;
                self.storage
                    .write_value(key, value)
                    .map_err(|e| match e {
                        StorageError::InvalidValue(msg) => ChannelError::InvalidValue(msg),
                        StorageError::Store(e) => ChannelError::WriteFailed(e),
                    })?;
                Ok(Value::Null)
            }
            "storage_read" => {
                let key = string_arg(args, "key")?;
                let default = object(args)?
                    .get("defaultValue")
                    .filter(|v| !v.is_null())
                    .cloned();
                Ok(self.storage.read(key, default).map_err(store_error)?.unwrap_or(Value::Null))
            }
            "storage_contains" => {
                let key = string_arg(args, "key")?;
                Ok(Value::from(self.storage.contains(key).map_err(store_error)?))
            }
            "storage_remove" => {
                let key = string_arg(args, "key")?;
                self.storage.remove(key).map_err(store_error)?;
                Ok(Value::Null)
            }
            "storage_clear" => {
                self.storage.clear().map_err(store_error)?;
                Ok(Value::Null)
            }
            "openAppSettings" => Ok(Value::from(self.broker.open_settings().await)),
            other => {
                tracing::warn!(method = %other, "Unknown method");
                Err(ChannelError::NotImplemented(other.to_string()))
            }
        }
    }
}

fn status_value(status: PermissionStatus) -> Value {
    Value::from(status.as_str())
}

fn object(args: &Value) -> Result<&Map<String, Value>, ChannelError> {
    args.as_object()
        .ok_or_else(|| ChannelError::InvalidArguments("arguments must be a map".into()))
}

fn string_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, ChannelError> {
    object(args)?
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::InvalidArguments(format!("\"{name}\" must be a string")))
}

fn store_error(e: StorageError) -> ChannelError {
    match e {
        StorageError::InvalidValue(msg) => ChannelError::InvalidValue(msg),
        StorageError::Store(e) => ChannelError::Storage(e),
    }
}
