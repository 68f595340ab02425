//! Capture device descriptions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Video input
    Camera,
    /// Audio input
    Microphone,
}

impl DeviceKind {
    /// Label shown when no device label is known
    pub fn default_label(&self) -> &'static str {
        match self {
            DeviceKind::Camera => "Default Camera",
            DeviceKind::Microphone => "Default Microphone",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// A capture device reported by the platform
///
/// `label` is empty until capture permission has been granted once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Platform device identifier
    pub id: String,
    /// Device kind
    pub kind: DeviceKind,
    /// Human readable name, possibly empty
    pub label: String,
}

impl Device {
    /// Create a device description
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }

    /// Whether the platform hid the label
    pub fn has_label(&self) -> bool {
        !self.label.is_empty()
    }

    /// Label for display, falling back to a generic name
    pub fn display_label(&self) -> &str {
        if self.has_label() {
            &self.label
        } else {
            self.kind.default_label()
        }
    }
}
