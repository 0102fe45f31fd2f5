use crate::models::error::SwitchFailed;
use crate::models::event::RouteEvent;
use crate::models::request::SwitchReason;
use crate::models::route::AudioRoute;
use crate::models::state::RouteApplied;

/// Receives route catalog changes and switch outcomes.
///
/// All methods are called from the observer's delivery thread, never from the
/// thread that triggered the change. Implementations should marshal to the UI
/// thread if needed.
pub trait RouteObserver: Send + Sync {
    /// Called with the full catalog snapshot after every attach or effective detach.
    fn on_catalog_changed(&self, routes: &[AudioRoute]);

    /// Called when a switch is accepted and handed to the host.
    fn on_switch_pending(&self, target: &AudioRoute, reason: SwitchReason);

    /// Called when a switch completes, including no-op switches.
    fn on_route_applied(&self, applied: &RouteApplied);

    /// Called when a switch leaves the active route unchanged.
    fn on_switch_failed(&self, failure: &SwitchFailed);

    /// Called when the media session begins or ends.
    fn on_session_state_changed(&self, _active: bool) {}
}

/// Route an event to the matching observer method.
pub(crate) fn dispatch(observer: &dyn RouteObserver, event: &RouteEvent) {
    match event {
        RouteEvent::CatalogChanged(routes) => observer.on_catalog_changed(routes),
        RouteEvent::SwitchPending { target, reason } => observer.on_switch_pending(target, *reason),
        RouteEvent::RouteApplied(applied) => observer.on_route_applied(applied),
        RouteEvent::SwitchFailed(failure) => observer.on_switch_failed(failure),
        RouteEvent::SessionStateChanged(active) => observer.on_session_state_changed(*active),
    }
}
