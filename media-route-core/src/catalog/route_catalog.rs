use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::event::RouteEvent;
use crate::models::route::{AudioRoute, HostDeviceDescriptor};
use crate::notify::change_notifier::ChangeNotifier;

/// Result of feeding an attach event into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Inserted,
    /// Device was already tracked; name, availability and recency refreshed.
    Updated,
    /// Device announced itself as unavailable and was dropped.
    Removed,
    /// Unavailable device that was not tracked anyway.
    Ignored,
}

struct CatalogInner {
    /// Discovery order.
    routes: Vec<AudioRoute>,
    next_sequence: u64,
    revision: u64,
}

impl CatalogInner {
    fn position(&self, device_id: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.device_id() == device_id)
    }

    fn take_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

/// Live set of available output routes, keyed by device id.
///
/// Every mutation happens under one lock and publishes its snapshot before
/// the lock is released, so observers see catalog snapshots in mutation order.
pub struct RouteCatalog {
    inner: Mutex<CatalogInner>,
    notifier: Option<Arc<ChangeNotifier>>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CatalogInner {
                routes: Vec::new(),
                next_sequence: 0,
                revision: 0,
            }),
            notifier: None,
        }
    }

    pub fn with_notifier(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::new()
        }
    }

    /// Insert a route, or refresh it in place if its device is already known.
    ///
    /// A route flagged unavailable is removed rather than stored.
    pub fn on_device_attached(&self, route: AudioRoute) -> AttachOutcome {
        let mut inner = self.inner.lock();
        let outcome = Self::attach_locked(&mut inner, route);
        if matches!(outcome, AttachOutcome::Ignored) {
            return outcome;
        }
        inner.revision += 1;
        self.publish_locked(&inner);
        outcome
    }

    /// Normalize host metadata and attach the resulting route.
    pub fn attach_descriptor(&self, descriptor: &HostDeviceDescriptor) -> AttachOutcome {
        self.on_device_attached(descriptor.normalize())
    }

    /// Remove a route. Unknown ids are ignored; detach events may race a prior removal.
    pub fn on_device_detached(&self, device_id: &str) -> Option<AudioRoute> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.position(device_id) else {
            log::debug!("Detach for untracked device '{}' ignored", device_id);
            return None;
        };
        let removed = inner.routes.remove(index);
        inner.revision += 1;
        log::info!("Route detached: {}", removed);
        self.publish_locked(&inner);
        Some(removed)
    }

    /// Rebuild from a full host enumeration.
    ///
    /// Devices still present keep their position and discovery time; devices
    /// missing from `descriptors` are dropped. Publishes at most one change.
    pub fn replace_all(&self, descriptors: &[HostDeviceDescriptor]) {
        let incoming: Vec<AudioRoute> =
            descriptors.iter().map(HostDeviceDescriptor::normalize).collect();

        let mut inner = self.inner.lock();
        let before = inner.routes.clone();

        inner.routes.retain(|existing| {
            incoming
                .iter()
                .any(|r| r.is_same_device(existing) && r.is_available())
        });
        for route in incoming.into_iter().filter(AudioRoute::is_available) {
            match inner.position(route.device_id()) {
                Some(index) => {
                    let tracked = &mut inner.routes[index];
                    if tracked.display_name() != route.display_name() {
                        let sequence = tracked.attach_sequence();
                        tracked.refresh(route.display_name().to_string(), true, sequence);
                    }
                }
                None => {
                    Self::attach_locked(&mut inner, route);
                }
            }
        }

        if inner.routes != before {
            inner.revision += 1;
            self.publish_locked(&inner);
        }
    }

    /// Snapshot copy in discovery order.
    pub fn list(&self) -> Vec<AudioRoute> {
        self.inner.lock().routes.clone()
    }

    pub fn get(&self, device_id: &str) -> Option<AudioRoute> {
        let inner = self.inner.lock();
        inner.position(device_id).map(|i| inner.routes[i].clone())
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.inner.lock().position(device_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().routes.is_empty()
    }

    /// Incremented on every effective change. Lets callers detect that the
    /// catalog moved underneath a cached decision.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    fn attach_locked(inner: &mut CatalogInner, route: AudioRoute) -> AttachOutcome {
        let existing = inner.position(route.device_id());

        if !route.is_available() {
            return match existing {
                Some(index) => {
                    let removed = inner.routes.remove(index);
                    log::info!("Route reported unavailable, removed: {}", removed);
                    AttachOutcome::Removed
                }
                None => AttachOutcome::Ignored,
            };
        }

        let sequence = inner.take_sequence();
        match existing {
            Some(index) => {
                let tracked = &mut inner.routes[index];
                if tracked.kind() != route.kind() {
                    log::warn!(
                        "Device '{}' re-announced as {} but tracked as {}, keeping original kind",
                        route.device_id(),
                        route.kind(),
                        tracked.kind()
                    );
                }
                tracked.refresh(route.display_name().to_string(), true, sequence);
                log::debug!("Route refreshed: {}", tracked);
                AttachOutcome::Updated
            }
            None => {
                let mut route = route;
                route.set_attach_sequence(sequence);
                log::info!("Route attached: {}", route);
                inner.routes.push(route);
                AttachOutcome::Inserted
            }
        }
    }

    fn publish_locked(&self, inner: &CatalogInner) {
        if let Some(ref notifier) = self.notifier {
            notifier.publish(RouteEvent::CatalogChanged(inner.routes.clone()));
        }
    }
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::RouteKind;

    fn route(kind: RouteKind, id: &str) -> AudioRoute {
        AudioRoute::new(kind, id, id)
    }

    #[test]
    fn attach_preserves_discovery_order() {
        let catalog = RouteCatalog::new();
        catalog.on_device_attached(route(RouteKind::Earpiece, "ear"));
        catalog.on_device_attached(route(RouteKind::Speaker, "spk"));
        catalog.on_device_attached(route(RouteKind::WiredHeadset, "wired"));

        let ids: Vec<_> = catalog.list().iter().map(|r| r.device_id().to_string()).collect();
        assert_eq!(ids, vec!["ear", "spk", "wired"]);
    }

    #[test]
    fn reattach_updates_in_place() {
        let catalog = RouteCatalog::new();
        catalog.on_device_attached(route(RouteKind::BluetoothHeadset, "bt"));
        catalog.on_device_attached(route(RouteKind::Speaker, "spk"));
        let first_seq = catalog.get("bt").unwrap().attach_sequence();

        let outcome =
            catalog.on_device_attached(AudioRoute::new(RouteKind::Speaker, "bt", "Renamed Buds"));

        assert_eq!(outcome, AttachOutcome::Updated);
        assert_eq!(catalog.len(), 2);
        let bt = &catalog.list()[0];
        assert_eq!(bt.device_id(), "bt");
        assert_eq!(bt.display_name(), "Renamed Buds");
        assert_eq!(bt.kind(), RouteKind::BluetoothHeadset, "kind is immutable");
        assert!(bt.attach_sequence() > first_seq);
    }

    #[test]
    fn unavailable_attach_removes_route() {
        let catalog = RouteCatalog::new();
        catalog.on_device_attached(route(RouteKind::WiredHeadset, "wired"));

        let unplugged = route(RouteKind::WiredHeadset, "wired").with_availability(false);
        let outcome = catalog.on_device_attached(unplugged);
        assert_eq!(outcome, AttachOutcome::Removed);
        assert!(catalog.is_empty());

        let ghost = route(RouteKind::WiredHeadset, "ghost").with_availability(false);
        let outcome = catalog.on_device_attached(ghost);
        assert_eq!(outcome, AttachOutcome::Ignored);
        assert!(catalog.is_empty());
    }

    #[test]
    fn detach_of_unknown_device_is_noop() {
        let catalog = RouteCatalog::new();
        catalog.on_device_attached(route(RouteKind::Speaker, "spk"));
        let revision = catalog.revision();

        assert!(catalog.on_device_detached("missing").is_none());
        assert_eq!(catalog.revision(), revision);

        assert!(catalog.on_device_detached("spk").is_some());
        assert!(catalog.on_device_detached("spk").is_none());
        assert!(catalog.is_empty());
    }

    #[test]
    fn list_is_a_snapshot() {
        let catalog = RouteCatalog::new();
        catalog.on_device_attached(route(RouteKind::Speaker, "spk"));
        let snapshot = catalog.list();

        catalog.on_device_attached(route(RouteKind::Earpiece, "ear"));
        catalog.on_device_detached("spk");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].device_id(), "spk");
    }

    #[test]
    fn malformed_descriptor_is_tracked_as_unknown() {
        let catalog = RouteCatalog::new();
        catalog.attach_descriptor(&HostDeviceDescriptor::new("hdmi-1", "", "hdmi"));

        let tracked = catalog.get("hdmi-1").unwrap();
        assert_eq!(tracked.kind(), RouteKind::Unknown);
        assert_eq!(tracked.display_name(), "Unknown Output");
    }

    #[test]
    fn replace_all_keeps_identity_and_drops_missing() {
        let catalog = RouteCatalog::new();
        catalog.attach_descriptor(&HostDeviceDescriptor::new("ear", "Earpiece", "earpiece"));
        let headphones = HostDeviceDescriptor::new("wired", "Headphones", "wiredHeadset");
        catalog.attach_descriptor(&headphones);
        let discovered = catalog.get("ear").unwrap().discovered_at();

        catalog.replace_all(&[
            HostDeviceDescriptor::new("spk", "Speaker", "speaker"),
            HostDeviceDescriptor::new("ear", "Earpiece", "earpiece"),
        ]);

        let ids: Vec<_> = catalog.list().iter().map(|r| r.device_id().to_string()).collect();
        assert_eq!(ids, vec!["ear", "spk"]);
        assert_eq!(catalog.get("ear").unwrap().discovered_at(), discovered);
    }

    #[test]
    fn replace_all_with_identical_set_is_not_a_change() {
        let catalog = RouteCatalog::new();
        let descriptors = vec![HostDeviceDescriptor::new("spk", "Speaker", "speaker")];
        catalog.replace_all(&descriptors);
        let revision = catalog.revision();

        catalog.replace_all(&descriptors);
        assert_eq!(catalog.revision(), revision);

        catalog.replace_all(&[]);
        assert!(catalog.revision() > revision);
        assert!(catalog.is_empty());
    }
}
