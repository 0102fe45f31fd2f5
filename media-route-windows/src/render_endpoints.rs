//! Render endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active output endpoints as host
//! device descriptors, classified by form factor and bus enumerator.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::IPropertyStore;

use media_route_core::models::route::HostDeviceDescriptor;

use crate::endpoint_kind::{classify_endpoint, kind_hint};
use crate::error::EndpointError;

/// Keeps COM initialized (MTA) on the current thread for its lifetime.
pub struct ComApartment;

impl ComApartment {
    pub fn enter() -> std::result::Result<Self, EndpointError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| EndpointError::Com(e.to_string()))?;
        }
        Ok(Self)
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Render endpoint enumerator.
///
/// Requires COM to be initialized on the calling thread; COM objects stay on
/// the thread that created them.
pub struct RenderEndpointEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl RenderEndpointEnumerator {
    pub fn new() -> std::result::Result<Self, EndpointError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    EndpointError::Enumeration(format!("failed to create enumerator: {}", e))
                })?;
            Ok(Self { enumerator })
        }
    }

    /// Active render endpoints.
    pub fn list(&self) -> std::result::Result<Vec<HostDeviceDescriptor>, EndpointError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(|e| {
                    EndpointError::Enumeration(format!("EnumAudioEndpoints failed: {}", e))
                })?;

            let count = collection
                .GetCount()
                .map_err(|e| EndpointError::Enumeration(format!("GetCount failed: {}", e)))?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };
                match Self::describe(&device) {
                    Some(descriptor) => endpoints.push(descriptor),
                    None => log::warn!("Skipping render endpoint {} without an id", i),
                }
            }
            Ok(endpoints)
        }
    }

    /// Open an endpoint by id.
    pub fn open(&self, id: &str) -> Result<IMMDevice> {
        let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe { self.enumerator.GetDevice(PCWSTR(wide.as_ptr())) }
    }

    fn describe(device: &IMMDevice) -> Option<HostDeviceDescriptor> {
        let id = unsafe { device_id(device)? };

        let (name, form_factor, bus) = match unsafe { device.OpenPropertyStore(STGM_READ) } {
            Ok(store) => (
                string_property(&store, &PKEY_Device_FriendlyName),
                u32_property(&store, &PKEY_AudioEndpoint_FormFactor),
                string_property(&store, &PKEY_Device_EnumeratorName),
            ),
            Err(e) => {
                log::warn!("OpenPropertyStore failed for '{}': {}", id, e);
                (None, None, None)
            }
        };

        let kind = classify_endpoint(form_factor, bus.as_deref());
        Some(HostDeviceDescriptor::new(id, name.unwrap_or_default(), kind_hint(kind)))
    }
}

/// Enumerator bundled with the COM apartment it was created in, for use on
/// a long-lived thread. Fields drop in order, so the enumerator is released
/// before COM is torn down.
pub struct ApartmentEnumerator {
    enumerator: RenderEndpointEnumerator,
    _com: ComApartment,
}

impl ApartmentEnumerator {
    pub fn enter() -> std::result::Result<Self, EndpointError> {
        let com = ComApartment::enter()?;
        let enumerator = RenderEndpointEnumerator::new()?;
        Ok(Self { enumerator, _com: com })
    }

    pub fn list(&self) -> std::result::Result<Vec<HostDeviceDescriptor>, EndpointError> {
        self.enumerator.list()
    }
}

unsafe fn device_id(device: &IMMDevice) -> Option<String> {
    let raw = device.GetId().ok()?;
    let id = raw.to_string().ok();
    CoTaskMemFree(Some(raw.0 as *const _));
    id.filter(|id| !id.is_empty())
}

fn string_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    let text = BSTR::try_from(&value).ok()?.to_string();
    Some(text).filter(|t| !t.is_empty())
}

fn u32_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<u32> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    u32::try_from(&value).ok()
}
