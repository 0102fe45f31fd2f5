use std::fmt;

use thiserror::Error;

use super::route::RouteKind;

/// Why a switch attempt did not take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchFailureReason {
    /// Session ended or the target left the catalog between selection and application.
    StaleTarget,
    /// The host refused the route change.
    PlatformRejected,
    /// Another switch is pending and queueing is disabled.
    Busy,
    /// The host did not confirm the route change in time.
    Timeout,
    /// A newer request replaced this one while it was queued or in flight.
    Superseded,
}

impl fmt::Display for SwitchFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StaleTarget => "stale target",
            Self::PlatformRejected => "platform rejected",
            Self::Busy => "busy",
            Self::Timeout => "timeout",
            Self::Superseded => "superseded",
        };
        f.write_str(text)
    }
}

/// Host-side reasons for refusing a route change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostRejection {
    #[error("driver busy")]
    DriverBusy,

    #[error("permission revoked")]
    PermissionRevoked,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("{0}")]
    Other(String),
}

/// A switch attempt that left the active route unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("switch to '{device_id}' failed: {reason}")]
pub struct SwitchFailed {
    pub reason: SwitchFailureReason,
    pub device_id: String,
    /// Host detail, present for `PlatformRejected`.
    pub rejection: Option<HostRejection>,
}

impl SwitchFailed {
    pub fn new(reason: SwitchFailureReason, device_id: impl Into<String>) -> Self {
        Self {
            reason,
            device_id: device_id.into(),
            rejection: None,
        }
    }

    pub fn rejected(device_id: impl Into<String>, rejection: HostRejection) -> Self {
        Self {
            reason: SwitchFailureReason::PlatformRejected,
            device_id: device_id.into(),
            rejection: Some(rejection),
        }
    }
}

/// What a selection was looking for when it came up empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Kind(RouteKind),
    Device(String),
    /// Any route whose kind differs from the given one (toggle away from it).
    Other(RouteKind),
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => write!(f, "{}", kind),
            Self::Device(id) => write!(f, "device '{}'", id),
            Self::Other(kind) => write!(f, "any route other than {}", kind),
        }
    }
}

/// Errors surfaced by selection and switching.
///
/// Catalog anomalies never appear here; they are normalized where they occur.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no output route available")]
    NoRouteAvailable,

    #[error("route unavailable: {0}")]
    RouteUnavailable(RouteTarget),

    #[error(transparent)]
    Switch(#[from] SwitchFailed),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl RouteError {
    /// The switch failure reason, if this error came from the switch stage.
    pub fn switch_reason(&self) -> Option<SwitchFailureReason> {
        match self {
            Self::Switch(failed) => Some(failed.reason),
            _ => None,
        }
    }
}
