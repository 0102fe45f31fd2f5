use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical category of an output route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteKind {
    Earpiece,
    Speaker,
    WiredHeadset,
    BluetoothHeadset,
    Unknown,
}

impl RouteKind {
    /// Parse a host-supplied kind hint. Anything unrecognized maps to `Unknown`.
    pub fn from_hint(hint: &str) -> Self {
        let normalized: String = hint
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "earpiece" | "receiver" | "handset" => Self::Earpiece,
            "speaker" | "speakerphone" | "loudspeaker" | "speakers" => Self::Speaker,
            "wiredheadset" | "headset" | "headphones" | "wiredheadphones" | "usbheadset" => {
                Self::WiredHeadset
            }
            "bluetooth" | "bluetoothheadset" | "bluetootha2dp" | "bluetoothsco" | "bluetoothle" => {
                Self::BluetoothHeadset
            }
            _ => Self::Unknown,
        }
    }

    /// Human-readable fallback label used when the host gives no display name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Earpiece => "Earpiece",
            Self::Speaker => "Speaker",
            Self::WiredHeadset => "Wired Headset",
            Self::BluetoothHeadset => "Bluetooth Headset",
            Self::Unknown => "Unknown Output",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A selectable physical audio output path.
///
/// `kind` and `device_id` are fixed at construction. The catalog owns the
/// recency bookkeeping (`attach_sequence`) and refreshes the mutable fields
/// when a device re-announces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRoute {
    kind: RouteKind,
    device_id: String,
    display_name: String,
    is_available: bool,
    discovered_at: DateTime<Utc>,
    attach_sequence: u64,
}

impl AudioRoute {
    pub fn new(
        kind: RouteKind,
        device_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            device_id: device_id.into(),
            display_name: display_name.into(),
            is_available: true,
            discovered_at: Utc::now(),
            attach_sequence: 0,
        }
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }

    /// Monotonic counter assigned by the catalog on every attach. Higher is more recent.
    pub fn attach_sequence(&self) -> u64 {
        self.attach_sequence
    }

    pub fn with_availability(mut self, is_available: bool) -> Self {
        self.is_available = is_available;
        self
    }

    pub fn is_same_device(&self, other: &AudioRoute) -> bool {
        self.device_id == other.device_id
    }

    pub(crate) fn refresh(
        &mut self,
        display_name: String,
        is_available: bool,
        attach_sequence: u64,
    ) {
        self.display_name = display_name;
        self.is_available = is_available;
        self.attach_sequence = attach_sequence;
    }

    pub(crate) fn set_attach_sequence(&mut self, attach_sequence: u64) {
        self.attach_sequence = attach_sequence;
    }
}

impl fmt::Display for AudioRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({})", self.display_name, self.kind, self.device_id)
    }
}

/// Raw device metadata as delivered by the host audio layer.
///
/// The host may send incomplete or unrecognized metadata; the catalog
/// normalizes it instead of refusing the device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostDeviceDescriptor {
    pub device_id: String,
    pub display_name: String,
    pub kind_hint: String,
    pub is_available: bool,
}

impl HostDeviceDescriptor {
    pub fn new(
        device_id: impl Into<String>,
        display_name: impl Into<String>,
        kind_hint: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            display_name: display_name.into(),
            kind_hint: kind_hint.into(),
            is_available: true,
        }
    }

    /// Convert into a route, filling in anything the host left out.
    pub fn normalize(&self) -> AudioRoute {
        let kind = RouteKind::from_hint(&self.kind_hint);
        if kind == RouteKind::Unknown && !self.kind_hint.is_empty() {
            log::warn!(
                "Unrecognized route kind '{}' for device '{}', tracking as unknown",
                self.kind_hint,
                self.device_id
            );
        }

        let device_id = if self.device_id.trim().is_empty() {
            let slug = kind.label().to_ascii_lowercase().replace(' ', "-");
            let fallback = format!("anonymous-{}", slug);
            log::warn!("Host reported a device without an id, using '{}'", fallback);
            fallback
        } else {
            self.device_id.clone()
        };

        let display_name = if self.display_name.trim().is_empty() {
            kind.label().to_string()
        } else {
            self.display_name.clone()
        };

        AudioRoute::new(kind, device_id, display_name).with_availability(self.is_available)
    }
}

/// Device hot-plug notification from the host audio layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostDeviceEvent {
    Attached(HostDeviceDescriptor),
    Detached { device_id: String },
}
