use super::error::SwitchFailed;
use super::request::SwitchReason;
use super::route::AudioRoute;

/// Output switch state machine.
///
/// State transitions:
/// ```text
/// idle → pending → applied → idle   (current = target)
///              ↘ failed  → idle   (current unchanged)
/// ```
/// `Applied` and `Failed` are reported to observers and then collapse back
/// to `Idle`; they are never observed as a resting state.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchPhase {
    Idle,
    Pending { target: AudioRoute, reason: SwitchReason },
    Applied(RouteApplied),
    Failed(SwitchFailed),
}

impl SwitchPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn pending_target(&self) -> Option<&AudioRoute> {
        match self {
            Self::Pending { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Snapshot of the route engaged for the live session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveRouteState {
    pub session_active: bool,
    pub current: Option<AudioRoute>,
    pub pending: Option<AudioRoute>,
}

impl ActiveRouteState {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Successful outcome of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteApplied {
    pub route: AudioRoute,
    pub previous: Option<AudioRoute>,
    pub reason: SwitchReason,
    /// False when the target was already active and the host was not called.
    pub changed: bool,
}
