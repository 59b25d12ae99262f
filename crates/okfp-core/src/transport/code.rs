//! Vendor status codes.
//!
//! The device-interface library reports failures as negative integers. This
//! module gives them names so they can be logged and matched.

use std::fmt;

/// Status code returned by a failing collaborator call.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelErrorCode(i32);

impl PanelErrorCode {
    pub const FAILED: Self = Self(-1);
    pub const TIMEOUT: Self = Self(-2);
    pub const DONE_NOT_HIGH: Self = Self(-3);
    pub const TRANSFER_ERROR: Self = Self(-4);
    pub const COMMUNICATION_ERROR: Self = Self(-5);
    pub const INVALID_BITSTREAM: Self = Self(-6);
    pub const FILE_ERROR: Self = Self(-7);
    pub const DEVICE_NOT_OPEN: Self = Self(-8);
    pub const INVALID_ENDPOINT: Self = Self(-9);
    pub const INVALID_BLOCK_SIZE: Self = Self(-10);
    pub const I2C_RESTRICTED_ADDRESS: Self = Self(-11);
    pub const I2C_BIT_ERROR: Self = Self(-12);
    pub const I2C_NACK: Self = Self(-13);
    pub const I2C_UNKNOWN_STATUS: Self = Self(-14);
    pub const UNSUPPORTED_FEATURE: Self = Self(-15);
    pub const FIFO_UNDERFLOW: Self = Self(-16);
    pub const FIFO_OVERFLOW: Self = Self(-17);
    pub const DATA_ALIGNMENT_ERROR: Self = Self(-18);
    pub const INVALID_RESET_PROFILE: Self = Self(-19);
    pub const INVALID_PARAMETER: Self = Self(-20);

    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> i32 {
        self.0
    }

    /// Vendor name of the code, if known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match self.0 {
            -1 => "Failed",
            -2 => "Timeout",
            -3 => "DoneNotHigh",
            -4 => "TransferError",
            -5 => "CommunicationError",
            -6 => "InvalidBitstream",
            -7 => "FileError",
            -8 => "DeviceNotOpen",
            -9 => "InvalidEndpoint",
            -10 => "InvalidBlockSize",
            -11 => "I2CRestrictedAddress",
            -12 => "I2CBitError",
            -13 => "I2CNack",
            -14 => "I2CUnknownStatus",
            -15 => "UnsupportedFeature",
            -16 => "FIFOUnderflow",
            -17 => "FIFOOverflow",
            -18 => "DataAlignmentError",
            -19 => "InvalidResetProfile",
            -20 => "InvalidParameter",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for PanelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PanelErrorCode({} {})", self.0, self)
    }
}

impl fmt::Display for PanelErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "UnknownError({})", self.0),
        }
    }
}
