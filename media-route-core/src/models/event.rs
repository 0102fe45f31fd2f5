use super::error::SwitchFailed;
use super::request::SwitchReason;
use super::route::AudioRoute;
use super::state::{RouteApplied, SwitchPhase};

/// Notification fanned out to route observers.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEvent {
    /// The set of available routes changed. Carries the new snapshot.
    CatalogChanged(Vec<AudioRoute>),
    /// A switch was accepted and is waiting on the host.
    SwitchPending { target: AudioRoute, reason: SwitchReason },
    RouteApplied(RouteApplied),
    SwitchFailed(SwitchFailed),
    /// A media session began (`true`) or ended (`false`).
    SessionStateChanged(bool),
}

impl RouteEvent {
    /// The state-machine phase this event reports, if it is a switch event.
    pub fn phase(&self) -> Option<SwitchPhase> {
        match self {
            Self::SwitchPending { target, reason } => Some(SwitchPhase::Pending {
                target: target.clone(),
                reason: *reason,
            }),
            Self::RouteApplied(applied) => Some(SwitchPhase::Applied(applied.clone())),
            Self::SwitchFailed(failed) => Some(SwitchPhase::Failed(failed.clone())),
            _ => None,
        }
    }
}
