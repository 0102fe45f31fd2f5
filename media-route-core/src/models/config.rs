use std::time::Duration;

/// Configuration for a route controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfiguration {
    /// When a switch is pending, replace its target with the newer request
    /// instead of rejecting the newer request as busy (default: false).
    pub queue_on_pending: bool,

    /// Upper bound on how long the host may take to confirm a route change (default: 3s).
    pub apply_timeout: Duration,

    /// Re-route to the preferred remaining route when the active one disconnects (default: true).
    pub recover_on_disconnect: bool,

    /// Engage the preferred route when a session begins (default: true).
    pub route_on_session_start: bool,
}

impl ControllerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.apply_timeout.is_zero() {
            return Err("apply timeout must be positive".into());
        }
        if self.apply_timeout > Duration::from_secs(60) {
            return Err(format!(
                "apply timeout of {}ms exceeds the 60s limit",
                self.apply_timeout.as_millis()
            ));
        }
        Ok(())
    }
}

impl Default for ControllerConfiguration {
    fn default() -> Self {
        Self {
            queue_on_pending: false,
            apply_timeout: Duration::from_secs(3),
            recover_on_disconnect: true,
            route_on_session_start: true,
        }
    }
}
