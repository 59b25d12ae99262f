//! Byte reordering within transfer words.
//!
//! Host-side hex literals are written most-significant byte first while the
//! device consumes pipe words least-significant byte first. Reversing the
//! bytes of every `word_size`-byte word converts between the two. The
//! operation is its own inverse.

use super::CodecError;

fn check(len: usize, word_size: usize) -> Result<(), CodecError> {
    if word_size == 0 {
        return Err(CodecError::InvalidWordSize { word_size });
    }
    if len % word_size != 0 {
        return Err(CodecError::OddLength { len, word_size });
    }
    Ok(())
}

/// Reverse the byte order of every `word_size`-byte word in place.
pub fn reorder_in_place(buffer: &mut [u8], word_size: usize) -> Result<(), CodecError> {
    check(buffer.len(), word_size)?;
    for word in buffer.chunks_exact_mut(word_size) {
        word.reverse();
    }
    Ok(())
}

/// Copying variant of [`reorder_in_place`].
pub fn reorder(buffer: &[u8], word_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = buffer.to_vec();
    reorder_in_place(&mut out, word_size)?;
    Ok(out)
}

/// Reorder a hex string by `word_size`-byte words (two characters per byte).
///
/// Works on character pairs and does not parse digits, so it can be applied
/// to text that is only later decoded.
pub fn reorder_hex(hex: &str, word_size: usize) -> Result<String, CodecError> {
    if !hex.is_ascii() {
        return Err(CodecError::MalformedHexString {
            detail: "non-ASCII text".into(),
        });
    }
    check(hex.len(), word_size * 2)?;

    let mut out = String::with_capacity(hex.len());
    for word in hex.as_bytes().chunks_exact(word_size * 2) {
        for pair in word.chunks_exact(2).rev() {
            out.push(pair[0] as char);
            out.push(pair[1] as char);
        }
    }
    Ok(out)
}
