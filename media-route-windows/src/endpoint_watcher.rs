//! Hot-plug detection by polling the render endpoint list.
//!
//! Each poll is compared against the previous snapshot and the differences
//! are reported as `HostDeviceEvent`s. The first snapshot is the baseline and
//! produces no events; the controller already enumerated on construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use media_route_core::models::route::{HostDeviceDescriptor, HostDeviceEvent};

use crate::error::EndpointError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Events that turn `previous` into `current`. Detaches come first so a
/// device that changed id is never briefly listed twice.
pub fn diff_endpoints(
    previous: &[HostDeviceDescriptor],
    current: &[HostDeviceDescriptor],
) -> Vec<HostDeviceEvent> {
    let mut events: Vec<HostDeviceEvent> = previous
        .iter()
        .filter(|old| !current.iter().any(|new| new.device_id == old.device_id))
        .map(|old| HostDeviceEvent::Detached {
            device_id: old.device_id.clone(),
        })
        .collect();

    for new in current {
        match previous.iter().find(|old| old.device_id == new.device_id) {
            None => events.push(HostDeviceEvent::Attached(new.clone())),
            // Renamed or re-enabled: attach again so the catalog refreshes it.
            Some(old) if old != new => events.push(HostDeviceEvent::Attached(new.clone())),
            Some(_) => {}
        }
    }
    events
}

/// Background poller that reports endpoint changes.
pub struct EndpointWatcher {
    running: Arc<AtomicBool>,
    poll_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EndpointWatcher {
    /// Start polling.
    ///
    /// `make_source` runs on the watcher thread, so the snapshot source it
    /// returns may hold thread-bound COM objects.
    pub fn spawn<F, S, K>(
        interval: Duration,
        make_source: F,
        sink: K,
    ) -> Result<Self, EndpointError>
    where
        F: FnOnce() -> Result<S, EndpointError> + Send + 'static,
        S: FnMut() -> Result<Vec<HostDeviceDescriptor>, EndpointError>,
        K: Fn(HostDeviceEvent) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("endpoint-watcher".into())
            .spawn(move || {
                if let Err(e) = poll_loop(&thread_running, interval, make_source, sink) {
                    log::error!("Endpoint watcher stopped: {}", e);
                }
                thread_running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| EndpointError::Thread("endpoint watcher", e.to_string()))?;

        Ok(Self {
            running,
            poll_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for the thread to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.poll_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EndpointWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watch the system's render endpoints, creating the COM enumerator on the
/// watcher thread.
#[cfg(target_os = "windows")]
pub fn watch_render_endpoints<K>(
    interval: Duration,
    sink: K,
) -> Result<EndpointWatcher, EndpointError>
where
    K: Fn(HostDeviceEvent) + Send + 'static,
{
    use crate::render_endpoints::ApartmentEnumerator;

    EndpointWatcher::spawn(
        interval,
        || {
            let endpoints = ApartmentEnumerator::enter()?;
            Ok(move || endpoints.list())
        },
        sink,
    )
}

fn poll_loop<F, S, K>(
    running: &AtomicBool,
    interval: Duration,
    make_source: F,
    sink: K,
) -> Result<(), EndpointError>
where
    F: FnOnce() -> Result<S, EndpointError>,
    S: FnMut() -> Result<Vec<HostDeviceDescriptor>, EndpointError>,
    K: Fn(HostDeviceEvent),
{
    let mut source = make_source()?;
    let mut previous = source()?;
    log::debug!("Endpoint watcher baseline: {} endpoint(s)", previous.len());

    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);

        let current = match source() {
            Ok(current) => current,
            Err(e) => {
                // Transient while the audio service restarts.
                log::warn!("Endpoint poll failed: {}", e);
                continue;
            }
        };

        for event in diff_endpoints(&previous, &current) {
            log::debug!("Endpoint change: {:?}", event);
            sink(event);
        }
        previous = current;
    }
    Ok(())
}
