//! Variable-length unsigned integers
//!
//! ```text
//!  first byte   length  value
//!  0..=240      1       b0
//!  241..=248    2       240 + 256 * (b0 - 241) + b1
//!  249          3       2288 + 256 * b1 + b2
//!  250          4       b1..b3 big-endian
//!  251          5       b1..b4 big-endian
//!  252..=255    6..=9   b1..b(n-1) big-endian
//! ```
//!
//! The encoded length is known from the first byte alone.

use crate::error::{DuskError, Result};

/// Longest possible encoding
pub const MAX_VARINT_LEN: usize = 9;

/// Total encoded length implied by the first byte
pub fn varint_len(first: u8) -> usize {
    match first {
        0..=240 => 1,
        241..=248 => 2,
        249 => 3,
        b => b as usize - 246,
    }
}

/// Number of bytes `value` encodes to
pub fn encoded_len(value: u64) -> usize {
    match value {
        0..=240 => 1,
        241..=2287 => 2,
        2288..=67823 => 3,
        _ => 1 + tail_width(value),
    }
}

fn tail_width(value: u64) -> usize {
    match value {
        ..=0xFF_FFFF => 3,
        ..=0xFFFF_FFFF => 4,
        ..=0xFF_FFFF_FFFF => 5,
        ..=0xFFFF_FFFF_FFFF => 6,
        ..=0xFF_FFFF_FFFF_FFFF => 7,
        _ => 8,
    }
}

/// Append the encoding of `value` to `out`, returning the number of bytes written
pub fn put_varint(out: &mut Vec<u8>, value: u64) -> usize {
    match value {
        0..=240 => {
            out.push(value as u8);
            1
        }
        241..=2287 => {
            let y = value - 240;
            out.push((y / 256 + 241) as u8);
            out.push((y % 256) as u8);
            2
        }
        2288..=67823 => {
            let y = value - 2288;
            out.push(249);
            out.push((y / 256) as u8);
            out.push((y % 256) as u8);
            3
        }
        _ => {
            let width = tail_width(value);
            out.push(247 + width as u8);
            out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
            1 + width
        }
    }
}

/// Decode one varint from the front of `bytes`, returning the value and bytes consumed
pub fn get_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| DuskError::Corrupt("truncated varint: no bytes left".to_string()))?;

    let len = varint_len(first);
    if bytes.len() < len {
        return Err(DuskError::Corrupt(format!(
            "truncated varint: need {} bytes, have {}",
            len,
            bytes.len()
        )));
    }

    let value = match first {
        0..=240 => first as u64,
        241..=248 => 240 + 256 * (first as u64 - 241) + bytes[1] as u64,
        249 => 2288 + 256 * bytes[1] as u64 + bytes[2] as u64,
        _ => bytes[1..len]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64),
    };

    Ok((value, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARIES: &[(u64, usize)] = &[
        (0, 1),
        (1, 1),
        (240, 1),
        (241, 2),
        (2287, 2),
        (2288, 3),
        (67823, 3),
        (67824, 4),
        ((1 << 24) - 1, 4),
        (1 << 24, 5),
        ((1 << 32) - 1, 5),
        ((1 << 40) - 1, 6),
        ((1 << 48) - 1, 7),
        ((1 << 56) - 1, 8),
        (u64::MAX, 9),
    ];

    #[test]
    fn test_boundary_values_roundtrip_with_expected_length() {
        for &(value, len) in BOUNDARIES {
            let mut buf = Vec::new();
            assert_eq!(put_varint(&mut buf, value), len, "length of {}", value);
            assert_eq!(buf.len(), len);
            assert_eq!(encoded_len(value), len);
            assert_eq!(varint_len(buf[0]), len);
            assert_eq!(get_varint(&buf).unwrap(), (value, len), "decode of {}", value);
        }
    }

    #[test]
    fn test_known_byte_layouts() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 241);
        assert_eq!(buf, [241, 1]);

        buf.clear();
        put_varint(&mut buf, 2288);
        assert_eq!(buf, [249, 0, 0]);

        buf.clear();
        put_varint(&mut buf, 67824);
        assert_eq!(buf, [250, 0x01, 0x08, 0xF0]);

        buf.clear();
        put_varint(&mut buf, u64::MAX);
        assert_eq!(buf, [255, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let (value, used) = get_varint(&[7, 99, 99]).unwrap();
        assert_eq!((value, used), (7, 1));
    }

    #[test]
    fn test_truncated_input_is_corrupt() {
        assert!(matches!(get_varint(&[]), Err(DuskError::Corrupt(_))));
        assert!(matches!(get_varint(&[245]), Err(DuskError::Corrupt(_))));
        assert!(matches!(get_varint(&[251, 1, 2, 3]), Err(DuskError::Corrupt(_))));
    }
}
