//! Classification of render endpoints into route kinds.
//!
//! Windows describes an endpoint by its `EndpointFormFactor` and by the bus
//! enumerator that exposed it. Bluetooth endpoints report a headset or
//! headphone form factor like wired ones, so the enumerator is checked first.

use media_route_core::models::route::RouteKind;

// EndpointFormFactor values (mmdeviceapi.h).
pub const FORM_FACTOR_REMOTE_NETWORK_DEVICE: u32 = 0;
pub const FORM_FACTOR_SPEAKERS: u32 = 1;
pub const FORM_FACTOR_LINE_LEVEL: u32 = 2;
pub const FORM_FACTOR_HEADPHONES: u32 = 3;
pub const FORM_FACTOR_HEADSET: u32 = 5;
pub const FORM_FACTOR_HANDSET: u32 = 6;
pub const FORM_FACTOR_SPDIF: u32 = 8;
pub const FORM_FACTOR_DIGITAL_DISPLAY: u32 = 9;

/// Route kind for an endpoint with the given form factor and enumerator name.
pub fn classify_endpoint(form_factor: Option<u32>, enumerator_name: Option<&str>) -> RouteKind {
    let bus = enumerator_name.unwrap_or_default().to_ascii_uppercase();
    if bus.contains("BTHENUM") || bus.contains("BTHLEENUM") {
        return RouteKind::BluetoothHeadset;
    }

    match form_factor {
        Some(FORM_FACTOR_HEADPHONES | FORM_FACTOR_HEADSET) => RouteKind::WiredHeadset,
        Some(FORM_FACTOR_HANDSET) => RouteKind::Earpiece,
        Some(FORM_FACTOR_SPEAKERS) => RouteKind::Speaker,
        _ => RouteKind::Unknown,
    }
}

/// Kind hint for a descriptor. Unknown endpoints (HDMI, S/PDIF, line out) are
/// expected on desktops, so they get an empty hint rather than one that would
/// be reported as unrecognized.
pub fn kind_hint(kind: RouteKind) -> String {
    match kind {
        RouteKind::Unknown => String::new(),
        known => known.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bluetooth_enumerator_wins_over_form_factor() {
        assert_eq!(
            classify_endpoint(Some(FORM_FACTOR_HEADSET), Some("BTHENUM")),
            RouteKind::BluetoothHeadset
        );
        assert_eq!(
            classify_endpoint(Some(FORM_FACTOR_HEADPHONES), Some("BthLEEnum")),
            RouteKind::BluetoothHeadset
        );
    }

    #[test]
    fn form_factors_map_to_kinds() {
        assert_eq!(
            classify_endpoint(Some(FORM_FACTOR_HEADPHONES), Some("USB")),
            RouteKind::WiredHeadset
        );
        assert_eq!(classify_endpoint(Some(FORM_FACTOR_HANDSET), None), RouteKind::Earpiece);
        assert_eq!(
            classify_endpoint(Some(FORM_FACTOR_SPEAKERS), Some("HDAUDIO")),
            RouteKind::Speaker
        );
    }

    #[test]
    fn digital_and_line_outputs_are_unknown() {
        for factor in [
            FORM_FACTOR_SPDIF,
            FORM_FACTOR_DIGITAL_DISPLAY,
            FORM_FACTOR_LINE_LEVEL,
            FORM_FACTOR_REMOTE_NETWORK_DEVICE,
        ] {
            assert_eq!(classify_endpoint(Some(factor), None), RouteKind::Unknown);
        }
        assert_eq!(classify_endpoint(None, None), RouteKind::Unknown);
    }

    #[test]
    fn hints_round_trip_through_core_parsing() {
        for kind in [
            RouteKind::Earpiece,
            RouteKind::Speaker,
            RouteKind::WiredHeadset,
            RouteKind::BluetoothHeadset,
        ] {
            assert_eq!(RouteKind::from_hint(&kind_hint(kind)), kind);
        }
        assert!(kind_hint(RouteKind::Unknown).is_empty());
    }
}
