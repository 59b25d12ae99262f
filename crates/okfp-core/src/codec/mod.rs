//! Data format conversion for pipe transfers.
//!
//! Pipe payloads arrive in three shapes (hex strings, typed numeric arrays,
//! raw byte buffers) and leave as raw bytes. This module converts between
//! them, reorders bytes within transfer words, and splits large buffers into
//! fixed-size blocks.

pub mod chunk;
pub mod hex;
pub mod numeric;
pub mod reorder;

pub use chunk::{BlockChunks, block_count, chunk, pad_to_block, unchunk};
pub use hex::{decode_hex, encode_hex};
pub use numeric::{PipeElement, elements_to_hex, hex_to_elements, numeric_to_bytes, to_numeric_array};
pub use reorder::{reorder, reorder_hex, reorder_in_place};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Length {len} is not a multiple of the {word_size}-byte word size")]
    OddLength { len: usize, word_size: usize },

    #[error("Malformed hex string: {detail}")]
    MalformedHexString { detail: String },

    #[error("Buffer of {len} bytes does not divide into {width}-byte elements")]
    SizeMismatch { len: usize, width: usize },

    #[error("Invalid block size: {block_size}")]
    InvalidBlockSize { block_size: usize },

    #[error("Invalid word size: {word_size}")]
    InvalidWordSize { word_size: usize },
}

/// Payload accepted by pipe writes.
#[derive(Debug, Clone, PartialEq)]
pub enum PipeInput<'a> {
    /// Hexadecimal text, two digits per byte, first byte first.
    Hex(&'a str),
    /// Bytes already in device order.
    Raw(&'a [u8]),
    /// Serialized numeric array (little-endian elements).
    Numeric(Vec<u8>),
}

impl<'a> PipeInput<'a> {
    /// Serialize a numeric slice in its natural width, little-endian.
    pub fn numeric<T: PipeElement>(values: &[T]) -> Self {
        PipeInput::Numeric(numeric_to_bytes(values))
    }

    pub fn is_hex(&self) -> bool {
        matches!(self, PipeInput::Hex(_))
    }
}

impl<'a> From<&'a str> for PipeInput<'a> {
    fn from(hex: &'a str) -> Self {
        PipeInput::Hex(hex)
    }
}

impl<'a> From<&'a String> for PipeInput<'a> {
    fn from(hex: &'a String) -> Self {
        PipeInput::Hex(hex.as_str())
    }
}

impl<'a> From<&'a [u8]> for PipeInput<'a> {
    fn from(raw: &'a [u8]) -> Self {
        PipeInput::Raw(raw)
    }
}

impl<'a> From<&'a Vec<u8>> for PipeInput<'a> {
    fn from(raw: &'a Vec<u8>) -> Self {
        PipeInput::Raw(raw.as_slice())
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for PipeInput<'a> {
    fn from(raw: &'a [u8; N]) -> Self {
        PipeInput::Raw(raw.as_slice())
    }
}

/// Convert any accepted input shape to raw bytes.
pub fn to_bytes(input: &PipeInput<'_>) -> Result<Vec<u8>, CodecError> {
    match input {
        PipeInput::Hex(hex) => decode_hex(hex),
        PipeInput::Raw(raw) => Ok(raw.to_vec()),
        PipeInput::Numeric(bytes) => Ok(bytes.clone()),
    }
}
