//! Endpoint address classification.
//!
//! Every endpoint address is a single byte whose value range determines the
//! operation category. Classification is a table lookup with no side
//! effects; channels call it before touching the device.

use std::fmt;

use thiserror::Error;

use super::constants::*;

/// Operation category of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    WireIn,
    WireOut,
    TriggerIn,
    TriggerOut,
    PipeIn,
    PipeOut,
}

/// Range table: (first, last, kind). Contiguous, non-overlapping, 0x00..=0xBF.
const ENDPOINT_TABLE: [(u8, u8, EndpointKind); 6] = [
    (WIRE_IN_START, WIRE_IN_END, EndpointKind::WireIn),
    (WIRE_OUT_START, WIRE_OUT_END, EndpointKind::WireOut),
    (TRIGGER_IN_START, TRIGGER_IN_END, EndpointKind::TriggerIn),
    (TRIGGER_OUT_START, TRIGGER_OUT_END, EndpointKind::TriggerOut),
    (PIPE_IN_START, PIPE_IN_END, EndpointKind::PipeIn),
    (PIPE_OUT_START, PIPE_OUT_END, EndpointKind::PipeOut),
];

impl EndpointKind {
    pub const ALL: [EndpointKind; 6] = [
        EndpointKind::WireIn,
        EndpointKind::WireOut,
        EndpointKind::TriggerIn,
        EndpointKind::TriggerOut,
        EndpointKind::PipeIn,
        EndpointKind::PipeOut,
    ];

    /// Inclusive address range of this category.
    pub fn range(self) -> (u8, u8) {
        let (start, end, _) = ENDPOINT_TABLE[self as usize];
        (start, end)
    }

    /// First address of the bank.
    pub fn base(self) -> u8 {
        self.range().0
    }

    /// Address of the `index`-th endpoint in this bank, if it exists.
    pub fn nth(self, index: usize) -> Option<EndpointAddress> {
        if index >= BANK_SIZE {
            return None;
        }
        Some(EndpointAddress(self.base() + index as u8))
    }

    /// Host-to-device categories.
    pub fn is_input(self) -> bool {
        matches!(
            self,
            EndpointKind::WireIn | EndpointKind::TriggerIn | EndpointKind::PipeIn
        )
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.range();
        let name = match self {
            EndpointKind::WireIn => "WireIn",
            EndpointKind::WireOut => "WireOut",
            EndpointKind::TriggerIn => "TriggerIn",
            EndpointKind::TriggerOut => "TriggerOut",
            EndpointKind::PipeIn => "PipeIn",
            EndpointKind::PipeOut => "PipeOut",
        };
        write!(f, "{} (0x{:02X}-0x{:02X})", name, start, end)
    }
}

/// Address rejected by classification.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAddress {
    #[error("Address 0x{address:02X} is outside every endpoint range (0x00-0x{last:02X})", last = LAST_ENDPOINT)]
    OutOfRange { address: u8 },

    #[error("Address 0x{address:02X} is a {actual} endpoint, expected {expected}")]
    WrongKind {
        address: u8,
        expected: EndpointKind,
        actual: EndpointKind,
    },
}

impl InvalidAddress {
    pub fn address(&self) -> u8 {
        match self {
            InvalidAddress::OutOfRange { address } => *address,
            InvalidAddress::WrongKind { address, .. } => *address,
        }
    }
}

/// Classify an address into its endpoint category.
pub fn classify(address: u8) -> Result<EndpointKind, InvalidAddress> {
    ENDPOINT_TABLE
        .iter()
        .find(|(start, end, _)| (*start..=*end).contains(&address))
        .map(|&(_, _, kind)| kind)
        .ok_or(InvalidAddress::OutOfRange { address })
}

/// A classified endpoint address.
///
/// Construction goes through [`EndpointAddress::new`] or
/// [`EndpointAddress::expect`], so a value of this type always lies in one
/// of the six banks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    pub fn new(address: u8) -> Result<Self, InvalidAddress> {
        classify(address).map(|_| Self(address))
    }

    /// Accept `address` only if it belongs to `kind`.
    pub fn expect(address: u8, kind: EndpointKind) -> Result<Self, InvalidAddress> {
        let actual = classify(address)?;
        if actual != kind {
            return Err(InvalidAddress::WrongKind {
                address,
                expected: kind,
                actual,
            });
        }
        Ok(Self(address))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn kind(&self) -> EndpointKind {
        // Checked at construction.
        ENDPOINT_TABLE[(self.0 as usize) / BANK_SIZE].2
    }

    /// Position within the bank (0..32).
    pub fn index(&self) -> usize {
        (self.0 - self.kind().base()) as usize
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointAddress(0x{:02X} {:?})", self.0, self.kind())
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl TryFrom<u8> for EndpointAddress {
    type Error = InvalidAddress;

    fn try_from(address: u8) -> Result<Self, Self::Error> {
        Self::new(address)
    }
}

impl From<EndpointAddress> for u8 {
    fn from(address: EndpointAddress) -> u8 {
        address.0
    }
}
