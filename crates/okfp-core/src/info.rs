//! Device identity and capability information.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::endpoint::constants::{
    PCIE_MAX_BLOCK_SIZE, PIPE_WIDTH, TRIGGER_WIDTH, USB2_MAX_BLOCK_SIZE, USB3_MAX_BLOCK_SIZE,
    WIRE_WIDTH,
};

/// Host interface the board is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceInterface {
    #[default]
    Unknown,
    Usb2,
    Pcie,
    Usb3,
}

impl fmt::Display for DeviceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceInterface::Unknown => write!(f, "Unknown"),
            DeviceInterface::Usb2 => write!(f, "USB 2"),
            DeviceInterface::Pcie => write!(f, "PCIe"),
            DeviceInterface::Usb3 => write!(f, "USB 3"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UsbSpeed {
    #[default]
    Unknown,
    Full,
    High,
    Super,
}

impl fmt::Display for UsbSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbSpeed::Unknown => write!(f, "Unknown"),
            UsbSpeed::Full => write!(f, "FULL"),
            UsbSpeed::High => write!(f, "HIGH"),
            UsbSpeed::Super => write!(f, "SUPER"),
        }
    }
}

/// Named integer settings stored on the board (power rails, modes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    ints: BTreeMap<String, u32>,
}

impl DeviceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_int(&self, key: &str) -> Option<u32> {
        self.ints.get(key).copied()
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: u32) {
        self.ints.insert(key.into(), value);
    }
}

/// Identity and endpoint widths reported by the device-interface library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub product_name: String,
    pub serial_number: String,
    pub product_id: u32,
    pub interface: DeviceInterface,
    pub usb_speed: UsbSpeed,
    pub wire_width: u32,
    pub trigger_width: u32,
    pub pipe_width: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            serial_number: String::new(),
            product_id: 0,
            interface: DeviceInterface::Unknown,
            usb_speed: UsbSpeed::Unknown,
            wire_width: WIRE_WIDTH,
            trigger_width: TRIGGER_WIDTH,
            pipe_width: PIPE_WIDTH,
        }
    }
}

impl DeviceInfo {
    /// Largest block size accepted by block-throttled pipes on this interface.
    pub fn max_block_size(&self) -> Option<usize> {
        match self.interface {
            DeviceInterface::Unknown => None,
            DeviceInterface::Usb2 => Some(USB2_MAX_BLOCK_SIZE),
            DeviceInterface::Pcie => Some(PCIE_MAX_BLOCK_SIZE),
            DeviceInterface::Usb3 => Some(USB3_MAX_BLOCK_SIZE),
        }
    }

    /// Check the reported configuration against what this crate expects.
    ///
    /// Findings are logged and returned; none of them is fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.interface != DeviceInterface::Usb3 {
            warnings.push(format!("Device interface is {}, not USB 3", self.interface));
        }
        for (name, width, expected) in [
            ("Wire", self.wire_width, WIRE_WIDTH),
            ("Trigger", self.trigger_width, TRIGGER_WIDTH),
            ("Pipe", self.pipe_width, PIPE_WIDTH),
        ] {
            if width != expected {
                warnings.push(format!("{} width is {}, not {}", name, width, expected));
            }
        }
        for w in &warnings {
            warn!("{}", w);
        }
        warnings
    }
}
