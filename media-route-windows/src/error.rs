use thiserror::Error;

use media_route_core::models::error::HostRejection;

/// `E_ACCESSDENIED`: the privacy settings or group policy revoked audio access.
pub const E_ACCESS_DENIED: i32 = 0x8007_0005_u32 as i32;
/// `E_NOTFOUND`: no endpoint with the requested id.
pub const E_NOT_FOUND: i32 = 0x8007_0490_u32 as i32;
/// `AUDCLNT_E_DEVICE_INVALIDATED`: the endpoint was unplugged or disabled.
pub const AUDCLNT_E_DEVICE_INVALIDATED: i32 = 0x8889_0004_u32 as i32;
/// `AUDCLNT_E_DEVICE_IN_USE`: another client holds the endpoint exclusively.
pub const AUDCLNT_E_DEVICE_IN_USE: i32 = 0x8889_000A_u32 as i32;
/// `AUDCLNT_E_SERVICE_NOT_RUNNING`: the audio service is stopped.
pub const AUDCLNT_E_SERVICE_NOT_RUNNING: i32 = 0x8889_0010_u32 as i32;

/// Failures of the Windows endpoint plumbing itself.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("COM initialization failed: {0}")]
    Com(String),

    #[error("endpoint enumeration failed: {0}")]
    Enumeration(String),

    #[error("failed to spawn {0} thread: {1}")]
    Thread(&'static str, String),
}

/// Map a failing HRESULT from the route change path onto a host rejection.
pub fn rejection_for_hresult(code: i32, message: &str) -> HostRejection {
    match code {
        E_ACCESS_DENIED => HostRejection::PermissionRevoked,
        AUDCLNT_E_DEVICE_IN_USE | AUDCLNT_E_SERVICE_NOT_RUNNING => HostRejection::DriverBusy,
        E_NOT_FOUND | AUDCLNT_E_DEVICE_INVALIDATED => HostRejection::DeviceNotAvailable,
        _ => HostRejection::Other(format!("HRESULT 0x{:08X}: {}", code as u32, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_means_permission_revoked() {
        assert_eq!(rejection_for_hresult(-2147024891, ""), HostRejection::PermissionRevoked);
    }

    #[test]
    fn device_in_use_means_busy() {
        assert_eq!(rejection_for_hresult(-2004287478, ""), HostRejection::DriverBusy);
    }

    #[test]
    fn vanished_endpoint_is_not_available() {
        assert_eq!(rejection_for_hresult(E_NOT_FOUND, ""), HostRejection::DeviceNotAvailable);
        assert_eq!(
            rejection_for_hresult(AUDCLNT_E_DEVICE_INVALIDATED, ""),
            HostRejection::DeviceNotAvailable
        );
    }

    #[test]
    fn other_codes_keep_the_raw_value() {
        let rejection = rejection_for_hresult(0x8000_4005_u32 as i32, "Unspecified error");
        assert_eq!(
            rejection,
            HostRejection::Other("HRESULT 0x80004005: Unspecified error".into())
        );
    }
}
