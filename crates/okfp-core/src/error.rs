//! Crate-level error taxonomy.

use thiserror::Error;

use crate::codec::CodecError;
use crate::endpoint::InvalidAddress;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum FpgaError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Trigger bit {bit} out of range (0..32)")]
    InvalidBit { bit: u32 },

    #[error("Invalid {what}: {length}")]
    InvalidLength { what: &'static str, length: usize },

    #[error("Value {value:#X} does not fit in {bits} bits")]
    InvalidValue { value: u32, bits: u32 },

    #[error("Partial transfer: {transferred} of {requested} bytes")]
    PartialTransfer { requested: usize, transferred: usize },

    #[error("{op} failed after {transferred} bytes: {source}")]
    DeviceIo {
        op: &'static str,
        transferred: usize,
        #[source]
        source: TransportError,
    },

    #[error("Timeout after {timeout_ms} ms ({attempts} checks) waiting for trigger {address:#04X} mask {mask:#010X}")]
    Timeout {
        address: u8,
        mask: u32,
        timeout_ms: u64,
        attempts: u32,
    },

    #[error("Wait for trigger {address:#04X} cancelled after {attempts} checks")]
    Cancelled { address: u8, attempts: u32 },

    #[error("Device not found: serial={serial:?}")]
    DeviceNotFound { serial: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Board mismatch: expected {expected}, found {found}")]
    BoardMismatch { expected: String, found: String },
}

impl FpgaError {
    /// Wrap a collaborator failure that happened before any payload moved.
    pub(crate) fn io(op: &'static str, source: TransportError) -> Self {
        Self::device_io(op, 0, source)
    }

    pub(crate) fn device_io(op: &'static str, transferred: usize, source: TransportError) -> Self {
        tracing::error!(op, transferred, error = %source, "Device I/O failed");
        match source {
            TransportError::DeviceNotFound { serial } => FpgaError::DeviceNotFound { serial },
            TransportError::Configuration(reason) => FpgaError::Configuration { reason },
            source => FpgaError::DeviceIo {
                op,
                transferred,
                source,
            },
        }
    }

    /// Trigger checks made before a wait gave up.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            FpgaError::Timeout { attempts, .. } | FpgaError::Cancelled { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// Bytes moved before the failure, for errors that track progress.
    pub fn transferred(&self) -> Option<usize> {
        match self {
            FpgaError::DeviceIo { transferred, .. }
            | FpgaError::PartialTransfer { transferred, .. } => Some(*transferred),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FpgaError>;
