//! Shared wire models.

use serde::{Deserialize, Serialize};

/// Kind of button event a device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ButtonEventKind {
    Pressed,
    Released,
    /// Any event type this relay does not know about. Received, never rebroadcast.
    #[serde(other)]
    Unknown,
}

impl ButtonEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pressed => "PRESSED",
            Self::Released => "RELEASED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether events of this kind are fanned out to every connection.
    pub fn is_relayed(&self) -> bool {
        matches!(self, Self::Pressed | Self::Released)
    }
}

/// Button event sent by a device over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    #[serde(default)]
    pub button_event: Option<ButtonEventKind>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

impl ButtonEvent {
    pub fn new(kind: ButtonEventKind, device_id: &str, firmware_version: &str) -> Self {
        Self {
            button_event: Some(kind),
            device_id: Some(device_id.to_string()),
            firmware_version: Some(firmware_version.to_string()),
        }
    }

    pub fn is_relayed(&self) -> bool {
        self.button_event.is_some_and(|k| k.is_relayed())
    }
}

/// `GET /count` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

/// HTTP header names used by the firmware update check.
pub mod headers {
    /// Firmware version currently running on the device (request).
    pub const DEVICE_VERSION: &str = "x-ESP32-version";
    /// MAC address of the device (request).
    pub const DEVICE_MAC: &str = "x-ESP32-MAC";
    /// Version of the firmware being served (response).
    pub const LATEST_VERSION: &str = "x-Latest-Version";
    /// Diagnostic message when no firmware can be served (response).
    pub const FIRMWARE_ERROR: &str = "X-Firmware-Error";
}
