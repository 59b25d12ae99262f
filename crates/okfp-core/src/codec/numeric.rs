//! Typed numeric arrays <-> bytes.
//!
//! Arrays travel to the device little-endian in their natural element width.
//! Operators usually write numeric payloads as hex text one element at a time
//! (`0.1f32` is `3DCCCCCD`), so big-endian per-element helpers are provided
//! as well.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::CodecError;
use super::hex::{decode_hex, encode_hex};

/// Element type that can be carried over a pipe.
pub trait PipeElement: Copy {
    /// Width in bytes.
    const WIDTH: usize;

    fn write_le(self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
    fn write_be(self, out: &mut [u8]);
    fn read_be(bytes: &[u8]) -> Self;
}

impl PipeElement for u8 {
    const WIDTH: usize = 1;

    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
    fn write_be(self, out: &mut [u8]) {
        out[0] = self;
    }
    fn read_be(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl PipeElement for i8 {
    const WIDTH: usize = 1;

    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
    fn write_be(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
    fn read_be(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
}

macro_rules! pipe_element {
    ($ty:ty, $read:ident, $write:ident) => {
        impl PipeElement for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn write_le(self, out: &mut [u8]) {
                LittleEndian::$write(out, self)
            }
            fn read_le(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }
            fn write_be(self, out: &mut [u8]) {
                BigEndian::$write(out, self)
            }
            fn read_be(bytes: &[u8]) -> Self {
                BigEndian::$read(bytes)
            }
        }
    };
}

pipe_element!(u16, read_u16, write_u16);
pipe_element!(i16, read_i16, write_i16);
pipe_element!(u32, read_u32, write_u32);
pipe_element!(i32, read_i32, write_i32);
pipe_element!(u64, read_u64, write_u64);
pipe_element!(i64, read_i64, write_i64);
pipe_element!(f32, read_f32, write_f32);
pipe_element!(f64, read_f64, write_f64);

/// Serialize elements little-endian, back to back.
pub fn numeric_to_bytes<T: PipeElement>(values: &[T]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * T::WIDTH];
    for (value, slot) in values.iter().zip(out.chunks_exact_mut(T::WIDTH)) {
        value.write_le(slot);
    }
    out
}

/// Reinterpret a buffer as little-endian elements. Never truncates.
pub fn to_numeric_array<T: PipeElement>(buffer: &[u8]) -> Result<Vec<T>, CodecError> {
    if buffer.len() % T::WIDTH != 0 {
        return Err(CodecError::SizeMismatch {
            len: buffer.len(),
            width: T::WIDTH,
        });
    }
    Ok(buffer.chunks_exact(T::WIDTH).map(T::read_le).collect())
}

/// Render each element as big-endian hex and concatenate.
pub fn elements_to_hex<T: PipeElement>(values: &[T]) -> String {
    let mut bytes = vec![0u8; values.len() * T::WIDTH];
    for (value, slot) in values.iter().zip(bytes.chunks_exact_mut(T::WIDTH)) {
        value.write_be(slot);
    }
    encode_hex(&bytes)
}

/// Parse concatenated big-endian element hex.
pub fn hex_to_elements<T: PipeElement>(hex: &str) -> Result<Vec<T>, CodecError> {
    let bytes = decode_hex(hex)?;
    if bytes.len() % T::WIDTH != 0 {
        return Err(CodecError::SizeMismatch {
            len: bytes.len(),
            width: T::WIDTH,
        });
    }
    Ok(bytes.chunks_exact(T::WIDTH).map(T::read_be).collect())
}
