//! Scriptable output host for testing without audio hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::HostRejection;
use crate::models::route::{AudioRoute, HostDeviceDescriptor};
use crate::traits::output_host::{ApplyCompletion, OutputHost};

/// How the mock answers `set_active_output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Confirm immediately, on the calling thread.
    Accept,
    /// Refuse immediately with the given rejection.
    Reject(HostRejection),
    /// Confirm from a background thread after a delay.
    AcceptAfter(Duration),
    /// Keep the completion until the test calls [`MockOutputHost::release_next`].
    Hold,
}

/// In-memory host that records every route change it is asked to make.
///
/// Useful for CI and for embedding the controller where no real audio
/// backend exists.
///
/// # Example
///
/// ```
/// use media_route_core::{MockOutputHost, MockResponse};
///
/// let host = MockOutputHost::with_outputs(&[("ear", "Earpiece", "earpiece")]);
/// host.set_response(MockResponse::Hold);
/// assert_eq!(host.held_count(), 0);
/// ```
pub struct MockOutputHost {
    outputs: Mutex<Vec<HostDeviceDescriptor>>,
    response: Mutex<MockResponse>,
    held: Mutex<Vec<ApplyCompletion>>,
    requests: Mutex<Vec<String>>,
    active: Arc<Mutex<Option<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockOutputHost {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new(Vec::new()),
            response: Mutex::new(MockResponse::Accept),
            held: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            active: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock pre-populated with `(device_id, display_name, kind_hint)` outputs.
    pub fn with_outputs(outputs: &[(&str, &str, &str)]) -> Self {
        let host = Self::new();
        *host.outputs.lock() = outputs
            .iter()
            .map(|(id, name, kind)| HostDeviceDescriptor::new(*id, *name, *kind))
            .collect();
        host
    }

    pub fn set_outputs(&self, outputs: Vec<HostDeviceDescriptor>) {
        *self.outputs.lock() = outputs;
    }

    pub fn set_response(&self, response: MockResponse) {
        *self.response.lock() = response;
    }

    /// Device ids passed to `set_active_output`, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Device the host last confirmed as active.
    pub fn active_device(&self) -> Option<String> {
        self.active.lock().clone()
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Highest number of route changes that were unresolved at the same time.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Complete the oldest held request with `result`. Returns false if none was held.
    pub fn release_next(&self, result: Result<(), HostRejection>) -> bool {
        let completion = {
            let mut held = self.held.lock();
            if held.is_empty() {
                return false;
            }
            held.remove(0)
        };
        completion(result);
        true
    }
}

impl Default for MockOutputHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputHost for MockOutputHost {
    fn enumerate_outputs(&self) -> Vec<HostDeviceDescriptor> {
        self.outputs.lock().clone()
    }

    fn set_active_output(&self, route: &AudioRoute, completion: ApplyCompletion) {
        let device_id = route.device_id().to_string();
        self.requests.lock().push(device_id.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let in_flight = Arc::clone(&self.in_flight);
        let active = Arc::clone(&self.active);
        let tracked: ApplyCompletion = Box::new(move |result: Result<(), HostRejection>| {
            in_flight.fetch_sub(1, Ordering::SeqCst);
            if result.is_ok() {
                *active.lock() = Some(device_id);
            }
            completion(result);
        });

        let response = self.response.lock().clone();
        match response {
            MockResponse::Accept => tracked(Ok(())),
            MockResponse::Reject(rejection) => tracked(Err(rejection)),
            MockResponse::AcceptAfter(delay) => {
                let spawned = thread::Builder::new()
                    .name("mock-output-host".into())
                    .spawn(move || {
                        thread::sleep(delay);
                        tracked(Ok(()));
                    });
                if let Err(e) = spawned {
                    log::error!("Failed to spawn mock completion thread: {}", e);
                }
            }
            MockResponse::Hold => self.held.lock().push(tracked),
        }
    }
}
