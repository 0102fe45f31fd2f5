use super::route::RouteKind;

/// Why a switch was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchReason {
    UserExplicit,
    AutoPolicy,
    DeviceDisconnected,
}

/// What a switch request is aiming at, before selection resolves it to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchTarget {
    Kind(RouteKind),
    Device(String),
    /// Flip between the loudspeaker and the best private route.
    ToggleSpeaker,
    /// Whatever the priority policy prefers right now.
    Preferred,
}

/// An ephemeral request consumed by the selection and switch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchRequest {
    pub target: SwitchTarget,
    pub reason: SwitchReason,
}

impl SwitchRequest {
    pub fn kind(kind: RouteKind) -> Self {
        Self {
            target: SwitchTarget::Kind(kind),
            reason: SwitchReason::UserExplicit,
        }
    }

    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            target: SwitchTarget::Device(device_id.into()),
            reason: SwitchReason::UserExplicit,
        }
    }

    pub fn toggle() -> Self {
        Self {
            target: SwitchTarget::ToggleSpeaker,
            reason: SwitchReason::UserExplicit,
        }
    }

    pub fn preferred(reason: SwitchReason) -> Self {
        Self {
            target: SwitchTarget::Preferred,
            reason,
        }
    }

    pub fn with_reason(mut self, reason: SwitchReason) -> Self {
        self.reason = reason;
        self
    }

    /// Explicit user picks of a kind or device become the standing override.
    pub fn sets_override(&self) -> bool {
        self.reason == SwitchReason::UserExplicit
            && matches!(self.target, SwitchTarget::Kind(_) | SwitchTarget::Device(_))
    }
}
