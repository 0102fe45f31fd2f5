use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::route_catalog::{AttachOutcome, RouteCatalog};
use crate::models::config::ControllerConfiguration;
use crate::models::error::RouteError;
use crate::models::request::{SwitchReason, SwitchRequest, SwitchTarget};
use crate::models::route::{AudioRoute, HostDeviceEvent, RouteKind};
use crate::models::state::{ActiveRouteState, RouteApplied};
use crate::notify::change_notifier::{ChangeNotifier, SubscriptionHandle};
use crate::selection::route_selector::RouteSelector;
use crate::session::output_switch::OutputSwitch;
use crate::traits::output_host::OutputHost;
use crate::traits::route_observer::RouteObserver;

/// Selection memory that outlives a single request.
#[derive(Debug, Default)]
struct RoutePreferences {
    /// Device the user explicitly picked; wins selection while present.
    user_override: Option<String>,
    /// Route a toggle left when it moved to the speaker, with the catalog
    /// revision at that moment. Only honoured while the catalog is unchanged.
    toggle_return: Option<(String, u64)>,
}

/// Output route controller for one media session.
///
/// Owns the catalog, selector, switch and notifier, and exposes the
/// application-facing surface:
/// ```text
/// toggle_output / select_output ─→ [RouteSelector] ─→ [OutputSwitch] ─→ OutputHost
///                                        ↑                   │
/// host attach/detach ─→ [RouteCatalog] ──┴──→ [ChangeNotifier] ←┘ ─→ observers
/// ```
pub struct MediaOutputController<H: OutputHost> {
    config: ControllerConfiguration,
    host: Arc<H>,
    catalog: Arc<RouteCatalog>,
    notifier: Arc<ChangeNotifier>,
    selector: RouteSelector,
    switch: OutputSwitch<H>,
    preferences: Mutex<RoutePreferences>,
}

impl<H: OutputHost> MediaOutputController<H> {
    /// Build a controller and populate the catalog from the host's current
    /// outputs.
    pub fn new(host: H, config: ControllerConfiguration) -> Result<Self, RouteError> {
        Self::with_selector(host, config, RouteSelector::new())
    }

    pub fn with_selector(
        host: H,
        config: ControllerConfiguration,
        selector: RouteSelector,
    ) -> Result<Self, RouteError> {
        config.validate().map_err(RouteError::Configuration)?;

        let host = Arc::new(host);
        let notifier = Arc::new(ChangeNotifier::new());
        let catalog = Arc::new(RouteCatalog::with_notifier(Arc::clone(&notifier)));
        let switch = OutputSwitch::new(
            Arc::clone(&host),
            Arc::clone(&catalog),
            Arc::clone(&notifier),
            &config,
        );

        let controller = Self {
            config,
            host,
            catalog,
            notifier,
            selector,
            switch,
            preferences: Mutex::new(RoutePreferences::default()),
        };
        controller.refresh_from_host();
        Ok(controller)
    }

    pub fn config(&self) -> &ControllerConfiguration {
        &self.config
    }

    // --- Session lifecycle ---

    /// Start a media session. Engages the preferred route when configured to.
    ///
    /// Returns `Ok(None)` when no route was engaged (routing on start is off,
    /// the catalog is empty, or a session was already running).
    pub fn begin_session(&self) -> Result<Option<RouteApplied>, RouteError> {
        if !self.switch.begin_session() {
            log::warn!("begin_session called while a session is active");
            return Ok(None);
        }
        if !self.config.route_on_session_start {
            return Ok(None);
        }
        match self.request(SwitchRequest::preferred(SwitchReason::AutoPolicy)) {
            Ok(applied) => Ok(Some(applied)),
            Err(RouteError::NoRouteAvailable) => {
                log::warn!("Session started with no output routes available");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn end_session(&self) {
        if self.switch.end_session() {
            *self.preferences.lock() = RoutePreferences::default();
        }
    }

    // --- Outbound surface ---

    /// Flip between the loudspeaker and the best private route.
    pub fn toggle_output(&self) -> Result<RouteApplied, RouteError> {
        self.request(SwitchRequest::toggle())
    }

    /// Switch to the most recently attached route of `kind`.
    pub fn select_output(&self, kind: RouteKind) -> Result<RouteApplied, RouteError> {
        self.request(SwitchRequest::kind(kind))
    }

    pub fn select_device(&self, device_id: &str) -> Result<RouteApplied, RouteError> {
        self.request(SwitchRequest::device(device_id))
    }

    /// Switch to whatever the priority policy prefers right now.
    pub fn select_preferred(&self) -> Result<RouteApplied, RouteError> {
        self.request(SwitchRequest::preferred(SwitchReason::AutoPolicy))
    }

    pub fn list_available_routes(&self) -> Vec<AudioRoute> {
        self.catalog.list()
    }

    pub fn active_route(&self) -> Option<AudioRoute> {
        self.switch.current()
    }

    pub fn state(&self) -> ActiveRouteState {
        self.switch.state()
    }

    pub fn user_override(&self) -> Option<String> {
        self.preferences.lock().user_override.clone()
    }

    /// Register `observer`. `None` if its delivery thread could not start.
    pub fn subscribe_to_route_changes(
        &self,
        observer: Arc<dyn RouteObserver>,
    ) -> Option<SubscriptionHandle> {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.notifier.unsubscribe(handle)
    }

    /// Resolve and apply a request. The selection runs against a fresh
    /// snapshot; the switch re-validates it before touching the host.
    pub fn request(&self, request: SwitchRequest) -> Result<RouteApplied, RouteError> {
        let routes = self.catalog.list();
        if routes.is_empty() {
            log::warn!("Switch request {:?} with an empty catalog", request.target);
            return Err(RouteError::NoRouteAvailable);
        }

        let current = self.switch.current();
        let target = self.resolve(&request, &routes, current.as_ref())?;
        log::debug!("Resolved {:?} ({:?}) to {}", request.target, request.reason, target);

        let applied = self.switch.apply(&target, request.reason)?;
        self.remember(&request, &applied);
        Ok(applied)
    }

    // --- Host events ---

    pub fn handle_host_event(&self, event: HostDeviceEvent) {
        match event {
            HostDeviceEvent::Attached(descriptor) => {
                self.on_device_attached(descriptor.normalize());
            }
            HostDeviceEvent::Detached { device_id } => {
                self.on_device_detached(&device_id);
            }
        }
    }

    pub fn on_device_attached(&self, route: AudioRoute) -> AttachOutcome {
        let device_id = route.device_id().to_string();
        let outcome = self.catalog.on_device_attached(route);
        if outcome == AttachOutcome::Removed {
            self.after_removal(&device_id);
        }
        outcome
    }

    /// Drop a route. Absent devices are ignored.
    pub fn on_device_detached(&self, device_id: &str) -> Option<AudioRoute> {
        let removed = self.catalog.on_device_detached(device_id)?;
        self.after_removal(device_id);
        Some(removed)
    }

    /// Re-enumerate host outputs and reconcile the catalog. Every route the
    /// host no longer reports goes through the same cleanup as a detach.
    pub fn refresh_from_host(&self) {
        let descriptors = self.host.enumerate_outputs();
        log::debug!("Host reports {} output(s)", descriptors.len());

        let before = self.catalog.list();
        self.catalog.replace_all(&descriptors);

        for route in before {
            if !self.catalog.contains(route.device_id()) {
                self.after_removal(route.device_id());
            }
        }
    }

    // --- Internal helpers ---

    fn resolve(
        &self,
        request: &SwitchRequest,
        routes: &[AudioRoute],
        current: Option<&AudioRoute>,
    ) -> Result<AudioRoute, RouteError> {
        let preferences = self.preferences.lock();
        let user_override = preferences.user_override.as_deref();

        match &request.target {
            SwitchTarget::Kind(kind) => self.selector.resolve_explicit(routes, *kind),
            SwitchTarget::Device(device_id) => self.selector.resolve_device(routes, device_id),
            SwitchTarget::Preferred => self.selector.select_preferred(routes, user_override),
            SwitchTarget::ToggleSpeaker => {
                let revision = self.catalog.revision();
                let return_to = preferences
                    .toggle_return
                    .as_ref()
                    .filter(|(_, at)| *at == revision)
                    .map(|(id, _)| id.as_str());
                self.selector.toggle_speaker(current, routes, return_to, user_override)
            }
        }
    }

    fn remember(&self, request: &SwitchRequest, applied: &RouteApplied) {
        let mut preferences = self.preferences.lock();

        if request.sets_override() {
            preferences.user_override = Some(applied.route.device_id().to_string());
        }

        preferences.toggle_return = match (&request.target, &applied.previous) {
            (SwitchTarget::ToggleSpeaker, Some(previous))
                if applied.route.kind() == RouteKind::Speaker
                    && previous.kind() != RouteKind::Speaker =>
            {
                Some((previous.device_id().to_string(), self.catalog.revision()))
            }
            _ => None,
        };
    }

    /// Bookkeeping after `device_id` left the catalog, including re-routing
    /// away from it if it was the active output.
    fn after_removal(&self, device_id: &str) {
        {
            let mut preferences = self.preferences.lock();
            if preferences.user_override.as_deref() == Some(device_id) {
                log::info!(
                    "User override '{}' disconnected, reverting to priority policy",
                    device_id
                );
                preferences.user_override = None;
            }
        }

        if !self.switch.clear_current_if(device_id) {
            return;
        }
        if !self.config.recover_on_disconnect || !self.switch.is_session_active() {
            return;
        }

        match self.request(SwitchRequest::preferred(SwitchReason::DeviceDisconnected)) {
            Ok(applied) => {
                log::info!("Recovered output to {} after disconnect", applied.route)
            }
            Err(e) => {
                log::warn!("Could not recover output after '{}' disconnected: {}", device_id, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::host::mock::{MockOutputHost, MockResponse};
    use crate::models::error::{HostRejection, SwitchFailureReason};
    use crate::models::event::RouteEvent;
    use crate::models::route::HostDeviceDescriptor;
    use crate::notify::change_notifier::tests::ChannelObserver;

    type Controller = MediaOutputController<Arc<MockOutputHost>>;

    fn controller_with(
        outputs: &[(&str, &str, &str)],
        config: ControllerConfiguration,
    ) -> (Arc<MockOutputHost>, Arc<Controller>) {
        let host = Arc::new(MockOutputHost::with_outputs(outputs));
        let controller = MediaOutputController::new(Arc::clone(&host), config).unwrap();
        (host, Arc::new(controller))
    }

    fn phone() -> (Arc<MockOutputHost>, Arc<Controller>) {
        controller_with(
            &[("ear", "Earpiece", "earpiece"), ("spk", "Speaker", "speaker")],
            ControllerConfiguration::default(),
        )
    }

    fn active_id(controller: &Controller) -> Option<String> {
        controller.active_route().map(|r| r.device_id().to_string())
    }

    fn bluetooth(id: &str) -> AudioRoute {
        AudioRoute::new(RouteKind::BluetoothHeadset, id, "Buds")
    }

    fn drain(rx: &Receiver<RouteEvent>) -> Vec<RouteEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
            events.push(event);
        }
        events
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = ControllerConfiguration {
            apply_timeout: Duration::ZERO,
            ..Default::default()
        };
        let result = MediaOutputController::new(MockOutputHost::new(), config);
        assert!(matches!(result, Err(RouteError::Configuration(_))));
    }

    #[test]
    fn catalog_is_built_from_host_enumeration() {
        let (_, controller) = phone();
        let ids: Vec<_> = controller
            .list_available_routes()
            .iter()
            .map(|r| r.device_id().to_string())
            .collect();
        assert_eq!(ids, vec!["ear", "spk"]);
        assert!(controller.active_route().is_none());
    }

    #[test]
    fn session_start_engages_preferred_route() {
        let (host, controller) = phone();
        let applied = controller.begin_session().unwrap().unwrap();

        assert_eq!(applied.route.device_id(), "ear");
        assert_eq!(applied.reason, SwitchReason::AutoPolicy);
        assert_eq!(host.active_device().as_deref(), Some("ear"));
    }

    #[test]
    fn session_start_with_empty_catalog_engages_nothing() {
        let (host, controller) = controller_with(&[], ControllerConfiguration::default());
        assert!(controller.begin_session().unwrap().is_none());
        assert!(controller.state().session_active);
        assert!(host.requests().is_empty());
    }

    #[test]
    fn empty_catalog_reports_no_route_and_keeps_state() {
        let (_, controller) = controller_with(&[], ControllerConfiguration::default());
        controller.begin_session().unwrap();

        assert_eq!(controller.select_preferred(), Err(RouteError::NoRouteAvailable));
        assert_eq!(controller.toggle_output(), Err(RouteError::NoRouteAvailable));
        assert_eq!(controller.select_output(RouteKind::Speaker), Err(RouteError::NoRouteAvailable));
        assert!(controller.active_route().is_none());
    }

    #[test]
    fn selecting_speaker_twice_is_idempotent() {
        let (host, controller) = phone();
        controller.begin_session().unwrap();

        let first = controller.select_output(RouteKind::Speaker).unwrap();
        let second = controller.select_output(RouteKind::Speaker).unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));
        assert_eq!(host.requests(), vec!["ear", "spk"]);
    }

    #[test]
    fn missing_kind_is_route_unavailable() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();

        let err = controller.select_output(RouteKind::WiredHeadset).unwrap_err();
        assert!(matches!(err, RouteError::RouteUnavailable(_)));
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }

    #[test]
    fn toggle_twice_returns_to_original_route() {
        let (_, controller) = controller_with(
            &[
                ("ear", "Earpiece", "earpiece"),
                ("spk", "Speaker", "speaker"),
                ("bt", "Buds", "bluetooth"),
            ],
            ControllerConfiguration::default(),
        );
        controller.begin_session().unwrap();
        controller.select_output(RouteKind::Earpiece).unwrap();
        // Clear the override so only toggle memory can bring us back.
        controller.preferences.lock().user_override = None;

        controller.toggle_output().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));

        controller.toggle_output().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }

    #[test]
    fn toggle_follows_priority_after_catalog_change() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));

        controller.toggle_output().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));

        controller.on_device_attached(bluetooth("bt"));
        assert_eq!(controller.list_available_routes().len(), 3);

        let applied = controller.toggle_output().unwrap();
        assert_eq!(applied.route.kind(), RouteKind::BluetoothHeadset);
        assert_eq!(active_id(&controller).as_deref(), Some("bt"));
    }

    #[test]
    fn explicit_selection_becomes_override_until_disconnect() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();
        controller.on_device_attached(bluetooth("bt"));

        controller.select_output(RouteKind::Speaker).unwrap();
        assert_eq!(controller.user_override().as_deref(), Some("spk"));
        assert_eq!(controller.select_preferred().unwrap().route.device_id(), "spk");

        controller.on_device_detached("spk");
        assert!(controller.user_override().is_none());
    }

    #[test]
    fn disconnect_of_active_route_recovers_to_preferred() {
        let (host, controller) = phone();
        controller.begin_session().unwrap();
        controller.on_device_attached(bluetooth("bt"));
        controller.select_output(RouteKind::BluetoothHeadset).unwrap();

        controller.handle_host_event(HostDeviceEvent::Detached { device_id: "bt".into() });

        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
        assert_eq!(host.requests().last().map(String::as_str), Some("ear"));
    }

    #[test]
    fn disconnect_without_recovery_leaves_no_active_route() {
        let (_, controller) = controller_with(
            &[("ear", "Earpiece", "earpiece"), ("wired", "Headphones", "headphones")],
            ControllerConfiguration {
                recover_on_disconnect: false,
                ..Default::default()
            },
        );
        controller.begin_session().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("wired"));

        controller.on_device_detached("wired");
        assert!(controller.active_route().is_none());
    }

    #[test]
    fn unavailable_attach_is_treated_as_disconnect() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();
        controller.on_device_attached(bluetooth("bt"));
        controller.select_device("bt").unwrap();

        let outcome = controller.on_device_attached(bluetooth("bt").with_availability(false));
        assert_eq!(outcome, AttachOutcome::Removed);
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }

    #[test]
    fn redundant_detach_is_absorbed() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();
        assert!(controller.on_device_detached("nope").is_none());
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }

    #[test]
    fn refresh_from_host_reconciles_catalog_and_recovers() {
        let (host, controller) = phone();
        controller.begin_session().unwrap();
        host.set_outputs(vec![HostDeviceDescriptor::new("spk", "Speaker", "speaker")]);

        controller.refresh_from_host();

        assert_eq!(controller.list_available_routes().len(), 1);
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));
    }

    #[test]
    fn refresh_clears_override_for_removed_inactive_route() {
        let (host, controller) = controller_with(
            &[
                ("ear", "Earpiece", "earpiece"),
                ("spk", "Speaker", "speaker"),
                ("bt", "Buds", "bluetoothHeadset"),
            ],
            ControllerConfiguration::default(),
        );
        controller.begin_session().unwrap();
        controller.select_device("bt").unwrap();
        controller.toggle_output().unwrap();
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));
        assert_eq!(controller.user_override().as_deref(), Some("bt"));

        host.set_outputs(vec![
            HostDeviceDescriptor::new("ear", "Earpiece", "earpiece"),
            HostDeviceDescriptor::new("spk", "Speaker", "speaker"),
        ]);
        controller.refresh_from_host();

        assert!(controller.user_override().is_none());
        assert_eq!(active_id(&controller).as_deref(), Some("spk"));
        assert_eq!(controller.list_available_routes().len(), 2);
    }

    #[test]
    fn failed_switch_keeps_last_applied_route() {
        let (host, controller) = phone();
        controller.begin_session().unwrap();
        host.set_response(MockResponse::Reject(HostRejection::DriverBusy));

        let err = controller.toggle_output().unwrap_err();
        assert_eq!(err.switch_reason(), Some(SwitchFailureReason::PlatformRejected));
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }

    #[test]
    fn selection_while_pending_is_busy_and_never_overlaps() {
        let (host, controller) = phone();
        controller.begin_session().unwrap();
        host.set_response(MockResponse::Hold);

        let worker = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || controller.select_output(RouteKind::Speaker))
        };
        let deadline = Instant::now() + Duration::from_secs(2);
        while host.held_count() == 0 {
            assert!(Instant::now() < deadline, "host call never issued");
            thread::sleep(Duration::from_millis(5));
        }

        let err = controller.toggle_output().unwrap_err();
        assert_eq!(err.switch_reason(), Some(SwitchFailureReason::Busy));
        assert!(controller.state().is_pending());

        host.release_next(Ok(()));
        assert_eq!(worker.join().unwrap().unwrap().route.device_id(), "spk");
        assert_eq!(host.max_concurrent_requests(), 1);
    }

    #[test]
    fn observers_see_catalog_and_switch_events_in_order() {
        let (_, controller) = phone();
        let (observer, rx) = ChannelObserver::new();
        assert!(controller.subscribe_to_route_changes(observer).is_some());

        controller.begin_session().unwrap();
        controller.on_device_attached(bluetooth("bt"));
        let _ = controller.select_output(RouteKind::WiredHeadset);

        let events = drain(&rx);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                RouteEvent::SessionStateChanged(_) => "session",
                RouteEvent::SwitchPending { .. } => "pending",
                RouteEvent::RouteApplied(_) => "applied",
                RouteEvent::SwitchFailed(_) => "failed",
                RouteEvent::CatalogChanged(_) => "catalog",
            })
            .collect();
        // Unavailable kinds fail during selection and never reach the switch.
        assert_eq!(kinds, vec!["session", "pending", "applied", "catalog"]);
    }

    #[test]
    fn ending_session_clears_state_and_preferences() {
        let (_, controller) = phone();
        controller.begin_session().unwrap();
        controller.select_output(RouteKind::Speaker).unwrap();

        controller.end_session();

        let state = controller.state();
        assert!(!state.session_active);
        assert!(state.current.is_none());
        assert!(controller.user_override().is_none());
        let err = controller.select_output(RouteKind::Speaker).unwrap_err();
        assert_eq!(err.switch_reason(), Some(SwitchFailureReason::StaleTarget));
    }

    #[test]
    fn slow_host_is_bounded_by_timeout() {
        let (host, controller) = controller_with(
            &[("ear", "Earpiece", "earpiece"), ("spk", "Speaker", "speaker")],
            ControllerConfiguration {
                apply_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );
        controller.begin_session().unwrap();
        host.set_response(MockResponse::Hold);

        let started = Instant::now();
        let err = controller.toggle_output().unwrap_err();
        assert_eq!(err.switch_reason(), Some(SwitchFailureReason::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(active_id(&controller).as_deref(), Some("ear"));
    }
}
