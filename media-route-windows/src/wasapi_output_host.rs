//! WASAPI output host.
//!
//! A route change opens the chosen render endpoint on a worker thread and
//! initializes a shared-mode `IAudioClient` on it. If that succeeds the
//! endpoint becomes the session's output; the media pipeline reads it back
//! through [`WasapiOutputHost::active_device`] when it opens its stream.
//!
//! ## Failure mapping
//! - `E_ACCESSDENIED` → `PermissionRevoked` (privacy settings)
//! - `AUDCLNT_E_DEVICE_IN_USE` → `DriverBusy` (exclusive-mode client)
//! - `E_NOTFOUND`, `AUDCLNT_E_DEVICE_INVALIDATED`, non-active state → `DeviceNotAvailable`

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use media_route_core::models::error::HostRejection;
use media_route_core::models::route::{AudioRoute, HostDeviceDescriptor};
use media_route_core::traits::output_host::{ApplyCompletion, OutputHost};

use crate::error::{rejection_for_hresult, EndpointError};
use crate::render_endpoints::{ComApartment, RenderEndpointEnumerator};

/// Shared-mode buffer requested when opening the endpoint, in 100ns units (100ms).
const OPEN_BUFFER_DURATION: i64 = 1_000_000;

/// `OutputHost` backed by the Windows MMDevice and WASAPI APIs.
pub struct WasapiOutputHost {
    active: Arc<Mutex<Option<String>>>,
}

impl WasapiOutputHost {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Endpoint id of the last successfully applied route.
    pub fn active_device(&self) -> Option<String> {
        self.active.lock().clone()
    }
}

impl Default for WasapiOutputHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputHost for WasapiOutputHost {
    fn enumerate_outputs(&self) -> Vec<HostDeviceDescriptor> {
        // COM state is per thread and the caller's apartment is unknown.
        let listed = thread::Builder::new()
            .name("wasapi-enumerate".into())
            .spawn(|| {
                let _com = ComApartment::enter()?;
                RenderEndpointEnumerator::new()?.list()
            })
            .map_err(|e| EndpointError::Thread("endpoint enumeration", e.to_string()))
            .and_then(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(EndpointError::Enumeration("enumeration thread panicked".into()))
                })
            });

        match listed {
            Ok(endpoints) => endpoints,
            Err(e) => {
                log::error!("Failed to enumerate render endpoints: {}", e);
                Vec::new()
            }
        }
    }

    fn set_active_output(&self, route: &AudioRoute, completion: ApplyCompletion) {
        let device_id = route.device_id().to_string();
        let active = Arc::clone(&self.active);

        // The completion moves into the worker; on spawn failure we get it back.
        let (tx, rx) = std::sync::mpsc::channel::<ApplyCompletion>();
        let spawned = thread::Builder::new()
            .name("wasapi-route-apply".into())
            .spawn(move || {
                let Ok(completion) = rx.recv() else {
                    return;
                };
                let result = open_endpoint(&device_id);
                match &result {
                    Ok(()) => {
                        log::info!("Render endpoint '{}' opened for session output", device_id);
                        *active.lock() = Some(device_id);
                    }
                    Err(rejection) => {
                        log::warn!("Render endpoint '{}' refused: {}", device_id, rejection)
                    }
                }
                completion(result);
            });

        match spawned {
            Ok(_) => {
                if let Err(unsent) = tx.send(completion) {
                    (unsent.0)(Err(HostRejection::Other("route worker exited early".into())));
                }
            }
            Err(e) => {
                log::error!("Failed to spawn route apply thread: {}", e);
                let reason = format!("failed to spawn route apply thread: {}", e);
                completion(Err(HostRejection::Other(reason)));
            }
        }
    }
}

/// Open `device_id` and initialize a shared-mode client on it.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Open endpoint by id, require DEVICE_STATE_ACTIVE
/// 3. Activate IAudioClient
/// 4. Initialize in shared mode with the mix format
fn open_endpoint(device_id: &str) -> Result<(), HostRejection> {
    let _com = ComApartment::enter().map_err(|e| HostRejection::Other(e.to_string()))?;
    let enumerator =
        RenderEndpointEnumerator::new().map_err(|e| HostRejection::Other(e.to_string()))?;

    let reject = |e: windows::core::Error| rejection_for_hresult(e.code().0, &e.message());

    unsafe {
        let device = enumerator.open(device_id).map_err(reject)?;

        let state = device.GetState().map_err(reject)?;
        if state != DEVICE_STATE_ACTIVE {
            return Err(HostRejection::DeviceNotAvailable);
        }

        let audio_client: IAudioClient = device.Activate(CLSCTX_ALL, None).map_err(reject)?;
        let mix_format_ptr = audio_client.GetMixFormat().map_err(reject)?;

        let initialized = audio_client.Initialize(
            AUDCLNT_SHAREMODE_SHARED,
            AUDCLNT_STREAMFLAGS_NOPERSIST,
            OPEN_BUFFER_DURATION,
            0,
            mix_format_ptr,
            None,
        );
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
        initialized.map_err(reject)?;
    }
    Ok(())
}
