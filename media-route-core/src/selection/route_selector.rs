use crate::models::error::{RouteError, RouteTarget};
use crate::models::route::{AudioRoute, RouteKind};

/// Default preference, most preferred first.
///
/// External devices win because connecting one is an intentional act; the
/// built-in receiver comes before the loudspeaker to avoid leaking call audio.
pub const DEFAULT_PRIORITY: [RouteKind; 5] = [
    RouteKind::BluetoothHeadset,
    RouteKind::WiredHeadset,
    RouteKind::Earpiece,
    RouteKind::Speaker,
    RouteKind::Unknown,
];

/// Resolves switch intents against a catalog snapshot.
///
/// Stateless apart from its priority table: the caller supplies the snapshot
/// plus any user override or toggle memory, so every decision is a pure
/// function of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSelector {
    priority: Vec<RouteKind>,
}

impl RouteSelector {
    pub fn new() -> Self {
        Self {
            priority: DEFAULT_PRIORITY.to_vec(),
        }
    }

    /// Selector with a custom ranking. Kinds left out rank below every listed kind.
    pub fn with_priority(priority: Vec<RouteKind>) -> Self {
        Self { priority }
    }

    pub fn priority(&self) -> &[RouteKind] {
        &self.priority
    }

    /// Pick the route the policy prefers.
    ///
    /// A user override wins while its device is still in `routes`. Otherwise
    /// kinds are ranked by priority, and within a kind the most recently
    /// attached route wins.
    pub fn select_preferred(
        &self,
        routes: &[AudioRoute],
        user_override: Option<&str>,
    ) -> Result<AudioRoute, RouteError> {
        if routes.is_empty() {
            return Err(RouteError::NoRouteAvailable);
        }

        if let Some(id) = user_override {
            if let Some(route) = routes.iter().find(|r| r.device_id() == id) {
                return Ok(route.clone());
            }
            log::debug!("User override '{}' no longer available, using priority order", id);
        }

        self.best_of(routes.iter())
            .cloned()
            .ok_or(RouteError::NoRouteAvailable)
    }

    /// Most recently attached route of `kind`.
    pub fn resolve_explicit(
        &self,
        routes: &[AudioRoute],
        kind: RouteKind,
    ) -> Result<AudioRoute, RouteError> {
        routes
            .iter()
            .filter(|r| r.kind() == kind)
            .max_by_key(|r| r.attach_sequence())
            .cloned()
            .ok_or(RouteError::RouteUnavailable(RouteTarget::Kind(kind)))
    }

    pub fn resolve_device(
        &self,
        routes: &[AudioRoute],
        device_id: &str,
    ) -> Result<AudioRoute, RouteError> {
        routes
            .iter()
            .find(|r| r.device_id() == device_id)
            .cloned()
            .ok_or_else(|| RouteError::RouteUnavailable(RouteTarget::Device(device_id.to_string())))
    }

    /// Flip between the loudspeaker and the best private route.
    ///
    /// From the speaker, goes to `return_to` when it is still present (the
    /// route the previous toggle left), then the user override, then the best
    /// non-speaker route by priority. From anything else, goes to the speaker.
    pub fn toggle_speaker(
        &self,
        current: Option<&AudioRoute>,
        routes: &[AudioRoute],
        return_to: Option<&str>,
        user_override: Option<&str>,
    ) -> Result<AudioRoute, RouteError> {
        if routes.is_empty() {
            return Err(RouteError::NoRouteAvailable);
        }

        let on_speaker = current.is_some_and(|r| r.kind() == RouteKind::Speaker);
        if !on_speaker {
            return self.resolve_explicit(routes, RouteKind::Speaker);
        }

        let private = |id: &str| {
            routes
                .iter()
                .find(|r| r.device_id() == id && r.kind() != RouteKind::Speaker)
        };

        if let Some(route) = return_to.and_then(private) {
            return Ok(route.clone());
        }
        if let Some(route) = user_override.and_then(private) {
            return Ok(route.clone());
        }

        self.best_of(routes.iter().filter(|r| r.kind() != RouteKind::Speaker))
            .cloned()
            .ok_or(RouteError::RouteUnavailable(RouteTarget::Other(RouteKind::Speaker)))
    }

    fn rank(&self, kind: RouteKind) -> usize {
        self.priority
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.priority.len())
    }

    /// Lowest rank wins; ties go to the latest attach.
    fn best_of<'a>(
        &self,
        candidates: impl Iterator<Item = &'a AudioRoute>,
    ) -> Option<&'a AudioRoute> {
        candidates.min_by(|a, b| {
            self.rank(a.kind())
                .cmp(&self.rank(b.kind()))
                .then_with(|| b.attach_sequence().cmp(&a.attach_sequence()))
        })
    }
}

impl Default for RouteSelector {
    fn default() -> Self {
        Self::new()
    }
}
