//! Hexadecimal text <-> bytes.

use super::CodecError;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Render bytes as uppercase hex, first byte first.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Parse a hex string. Length must be even and every character a hex digit
/// (either case).
pub fn decode_hex(hex: &str) -> Result<Vec<u8>, CodecError> {
    if hex.len() % 2 != 0 {
        return Err(CodecError::MalformedHexString {
            detail: format!("odd length {}", hex.len()),
        });
    }

    hex.as_bytes()
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let hi = nibble(2 * i, pair[0])?;
            let lo = nibble(2 * i + 1, pair[1])?;
            Ok::<u8, CodecError>((hi << 4) | lo)
        })
        .collect()
}

fn nibble(position: usize, byte: u8) -> Result<u8, CodecError> {
    (byte as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| CodecError::MalformedHexString {
            detail: format!("invalid byte 0x{:02X} at position {}", byte, position),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uppercase() {
        assert_eq!(encode_hex(&[0x00, 0x3D, 0xCC, 0xff]), "003DCCFF");
        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn test_decode_mixed_case() {
        assert_eq!(decode_hex("aAbB0f").unwrap(), vec![0xAA, 0xBB, 0x0F]);
    }

    #[test]
    fn test_decode_reports_position() {
        let err = decode_hex("00G0").unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedHexString {
                detail: "invalid byte 0x47 at position 2".into()
            }
        );
    }

    #[test]
    fn test_decode_rejects_multibyte_chars() {
        // "é" is two bytes long, so the string length is even.
        assert!(decode_hex("é").is_err());
    }

    #[test]
    fn test_round_trip_all_bytes() {
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_hex(&encode_hex(&all)).unwrap(), all);
    }
}
