//! Device-interface boundary.
//!
//! Defines the `PanelTransport` trait: the primitive, address-keyed
//! operations of the vendor device-interface library. Everything above this
//! trait (validation, auto-update, format conversion, chunking) lives in this
//! crate; everything below it is the collaborator's business.

use std::path::Path;

use thiserror::Error;

use super::code::PanelErrorCode;
use crate::info::{DeviceInfo, DeviceSettings};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: serial={serial:?}")]
    DeviceNotFound { serial: String },

    #[error("Device is not open")]
    NotOpen,

    #[error("{op} failed: {code}")]
    Failed {
        op: &'static str,
        code: PanelErrorCode,
    },

    #[error("Configuration failed: {0}")]
    Configuration(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Vendor status code, when the collaborator reported one.
    pub fn code(&self) -> Option<PanelErrorCode> {
        match self {
            TransportError::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Primitive operations of the device-interface library.
///
/// Wire-in writes are staged by `set_wire_in` and committed by
/// `update_wire_ins`; `wire_out` and `trigger_out` read the values captured by
/// the most recent `update_wire_outs` / `update_trigger_outs`.
///
/// Pipe calls return the number of bytes moved. A count smaller than the
/// buffer is a short transfer, not an error.
pub trait PanelTransport: Send {
    /// Open the device with the given serial number ("" = first found).
    fn open(&mut self, serial: &str) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    fn device_info(&self) -> Result<DeviceInfo, TransportError>;

    /// Board-stored settings. Not every library build exposes them.
    fn device_settings(&self) -> Result<DeviceSettings, TransportError> {
        Err(TransportError::Failed {
            op: "GetDeviceSettings",
            code: PanelErrorCode::UNSUPPORTED_FEATURE,
        })
    }

    /// Program a configuration bitstream.
    fn configure(&mut self, bitstream: &Path) -> Result<(), TransportError>;

    /// Whether the loaded bitstream exposes the host endpoint interface.
    fn is_front_panel_enabled(&self) -> bool;

    fn set_wire_in(&mut self, addr: u8, value: u32, mask: u32) -> Result<(), TransportError>;

    fn update_wire_ins(&mut self) -> Result<(), TransportError>;

    fn update_wire_outs(&mut self) -> Result<(), TransportError>;

    fn wire_out(&mut self, addr: u8) -> Result<u32, TransportError>;

    fn activate_trigger_in(&mut self, addr: u8, bit: u8) -> Result<(), TransportError>;

    fn update_trigger_outs(&mut self) -> Result<(), TransportError>;

    fn trigger_out(&mut self, addr: u8) -> Result<u32, TransportError>;

    /// Check latched trigger-out bits against `mask`.
    fn is_triggered(&mut self, addr: u8, mask: u32) -> Result<bool, TransportError> {
        Ok(self.trigger_out(addr)? & mask != 0)
    }

    fn write_pipe_in(&mut self, addr: u8, data: &[u8]) -> Result<usize, TransportError>;

    fn read_pipe_out(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn write_block_pipe_in(
        &mut self,
        addr: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, TransportError>;

    fn read_block_pipe_out(
        &mut self,
        addr: u8,
        block_size: usize,
        buf: &mut [u8],
    ) -> Result<usize, TransportError>;

    /// Register-bridge write. Separate address space from endpoints.
    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), TransportError>;

    fn read_register(&mut self, addr: u32) -> Result<u32, TransportError>;

    fn close(&mut self);
}
