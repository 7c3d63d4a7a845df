//! Stateless conversions between hex strings, byte buffers, byte-order
//! variants and binary strings, used to build write payloads and render
//! read payloads.

use crate::error::{Error, ErrorKind};
use crate::Result;

fn conversion_error(msg: impl ToString) -> Error {
    Error::new(ErrorKind::Conversion, msg)
}

/// Decodes an even-length hex string into bytes.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| conversion_error(format!("invalid hex string {s:?}: {e}")))
}

/// Encodes bytes as an uppercase hex string.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Parses a hex string (with or without a `0x` prefix) as a single byte.
pub fn parse_hex_u8(s: &str) -> Result<u8> {
    u8::from_str_radix(strip_0x(s), 16)
        .map_err(|e| conversion_error(format!("invalid hex byte {s:?}: {e}")))
}

/// Parses a hex string (with or without a `0x` prefix) as an unsigned integer.
pub fn parse_hex_uint(s: &str) -> Result<u64> {
    u64::from_str_radix(strip_0x(s), 16)
        .map_err(|e| conversion_error(format!("invalid hex integer {s:?}: {e}")))
}

/// Interprets an 8-digit hex string as a little-endian `u32`.
pub fn hex_to_u32_le(s: &str) -> Result<u32> {
    if s.len() != 8 {
        return Err(conversion_error(format!(
            "expected 8 hex digits, got {}",
            s.len()
        )));
    }
    let be = u32::from_str_radix(s, 16)
        .map_err(|e| conversion_error(format!("invalid hex string {s:?}: {e}")))?;
    Ok(be.swap_bytes())
}

/// Reverses the byte order of an 8-digit hex string, keeping the hex
/// rendering (e.g. `"12345678"` becomes `"78563412"`).
pub fn hex_to_hex_le(s: &str) -> Result<String> {
    Ok(format!("{:08X}", hex_to_u32_le(s)?))
}

/// Renders a hex string as a binary string, eight digits per byte.
pub fn hex_to_binary(s: &str) -> Result<String> {
    let bytes = decode_hex(s)?;
    let mut out = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        out.push_str(&format!("{byte:08b}"));
    }
    Ok(out)
}

/// Parses a binary string as an unsigned integer.
pub fn binary_to_decimal(s: &str) -> Result<u64> {
    u64::from_str_radix(s, 2)
        .map_err(|e| conversion_error(format!("invalid binary string {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let bytes = decode_hex("0a41ff").unwrap();
        assert_eq!(bytes, vec![0x0a, 0x41, 0xff]);
        assert_eq!(encode_hex(&bytes), "0A41FF");
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(decode_hex("41f").unwrap_err().kind(), ErrorKind::Conversion);
        assert_eq!(decode_hex("zz").unwrap_err().kind(), ErrorKind::Conversion);
    }

    #[test]
    fn single_values() {
        assert_eq!(parse_hex_u8("0x41").unwrap(), 0x41);
        assert_eq!(parse_hex_u8("ff").unwrap(), 0xff);
        assert!(parse_hex_u8("100").is_err());
        assert_eq!(parse_hex_uint("0xDEADBEEF").unwrap(), 0xdead_beef);
    }

    #[test]
    fn little_endian() {
        assert_eq!(hex_to_u32_le("78563412").unwrap(), 0x1234_5678);
        assert_eq!(hex_to_hex_le("12345678").unwrap(), "78563412");
        assert_eq!(hex_to_hex_le("0000A000").unwrap(), "00A00000");
        assert!(hex_to_u32_le("1234").is_err());
    }

    #[test]
    fn binary_strings() {
        assert_eq!(hex_to_binary("A3").unwrap(), "10100011");
        assert_eq!(binary_to_decimal("10100011").unwrap(), 0xa3);
        assert!(binary_to_decimal("012").is_err());
    }
}
