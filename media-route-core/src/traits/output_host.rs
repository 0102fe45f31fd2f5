use crate::models::error::HostRejection;
use crate::models::route::{AudioRoute, HostDeviceDescriptor};

/// Completion callback for a host route change.
///
/// Called exactly once, from any thread, possibly before
/// `set_active_output` returns.
pub type ApplyCompletion = Box<dyn FnOnce(Result<(), HostRejection>) + Send + 'static>;

/// Capability interface onto the host audio subsystem.
///
/// Implemented by:
/// - `WasapiOutputHost` (Windows)
/// - `MockOutputHost` (tests and headless embedding)
pub trait OutputHost: Send + Sync {
    /// Output devices currently present. Used to rebuild the catalog on start.
    fn enumerate_outputs(&self) -> Vec<HostDeviceDescriptor>;

    /// Begin routing session audio to `route`, reporting the outcome via `completion`.
    ///
    /// Must not block waiting for the hardware; the controller bounds the wait itself.
    fn set_active_output(&self, route: &AudioRoute, completion: ApplyCompletion);
}

impl<T: OutputHost + ?Sized> OutputHost for std::sync::Arc<T> {
    fn enumerate_outputs(&self) -> Vec<HostDeviceDescriptor> {
        (**self).enumerate_outputs()
    }

    fn set_active_output(&self, route: &AudioRoute, completion: ApplyCompletion) {
        (**self).set_active_output(route, completion)
    }
}
