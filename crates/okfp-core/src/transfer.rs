//! Transfer results.

use std::fmt;

use crate::codec::{self, CodecError, PipeElement};
use crate::error::{FpgaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    /// Fewer bytes moved than requested, with no error from the collaborator.
    Partial,
}

/// Bytes requested versus bytes actually moved by one pipe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub requested: usize,
    pub transferred: usize,
}

impl TransferOutcome {
    pub fn new(requested: usize, transferred: usize) -> Self {
        Self {
            requested,
            transferred,
        }
    }

    pub fn status(&self) -> TransferStatus {
        if self.transferred < self.requested {
            TransferStatus::Partial
        } else {
            TransferStatus::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == TransferStatus::Complete
    }

    /// Turn a short transfer into `PartialTransfer`.
    pub fn require_complete(self) -> Result<Self> {
        match self.status() {
            TransferStatus::Complete => Ok(self),
            TransferStatus::Partial => Err(FpgaError::PartialTransfer {
                requested: self.requested,
                transferred: self.transferred,
            }),
        }
    }
}

/// Data read from a pipe-out endpoint.
///
/// `as_bytes` is exactly what the device returned. The hex view is reordered
/// when the read asked for it; a short read's trailing partial word is shown
/// as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeOutData {
    outcome: TransferOutcome,
    data: Vec<u8>,
    hex: String,
}

impl PipeOutData {
    pub(crate) fn new(
        data: Vec<u8>,
        requested: usize,
        reorder_word_size: Option<usize>,
    ) -> Result<Self> {
        let outcome = TransferOutcome::new(requested, data.len());
        let hex = match reorder_word_size {
            Some(word_size) => {
                if word_size == 0 {
                    return Err(CodecError::InvalidWordSize { word_size }.into());
                }
                let mut view = data.clone();
                let whole = view.len() - view.len() % word_size;
                codec::reorder_in_place(&mut view[..whole], word_size)?;
                codec::encode_hex(&view)
            }
            None => codec::encode_hex(&data),
        };
        Ok(Self { outcome, data, hex })
    }

    pub fn outcome(&self) -> TransferOutcome {
        self.outcome
    }

    pub fn status(&self) -> TransferStatus {
        self.outcome.status()
    }

    pub fn is_partial(&self) -> bool {
        self.status() == TransferStatus::Partial
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Reinterpret the raw bytes as little-endian `T` elements.
    pub fn to_numeric<T: PipeElement>(&self) -> std::result::Result<Vec<T>, CodecError> {
        codec::to_numeric_array(&self.data)
    }
}

impl AsRef<[u8]> for PipeOutData {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq<str> for PipeOutData {
    fn eq(&self, other: &str) -> bool {
        self.hex.eq_ignore_ascii_case(other)
    }
}

impl PartialEq<&str> for PipeOutData {
    fn eq(&self, other: &&str) -> bool {
        self.hex.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for PipeOutData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}
