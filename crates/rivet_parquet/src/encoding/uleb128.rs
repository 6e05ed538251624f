//! ULEB128 (varint) things.
//!
//! Used for RLE/bit-packed run headers.
//!
//! <https://en.wikipedia.org/wiki/LEB128#Unsigned_LEB128>
use rivet_error::{Result, RivetError};

/// Max number of bytes a ULEB128 encoded u64 can take.
pub const MAX_ULEB128_LEN: usize = 10;

/// ULEB128 encode a u64, appending to `buf`.
///
/// Returns number of bytes written.
pub fn encode_uleb128(mut value: u64, buf: &mut Vec<u8>) -> usize {
    let mut count = 0;

    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            // Continuation bit.
            byte |= 0x80;
        }

        buf.push(byte);
        count += 1;

        if value == 0 {
            break;
        }
    }

    count
}

/// Decodes a u64 from `buf`.
///
/// Returns (val, num_bytes_read) pair.
pub fn decode_uleb128(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0;

    for (idx, &byte) in buf.iter().enumerate() {
        if idx >= MAX_ULEB128_LEN {
            return Err(RivetError::invalid_format("ULEB128 value is too large"));
        }

        let low_bits = (byte & 0x7F) as u64;
        value |= low_bits << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((value, idx + 1));
        }
    }

    Err(RivetError::invalid_format("Truncated ULEB128 sequence"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode() {
        let mut buf = Vec::new();
        let n = encode_uleb128(624485, &mut buf);

        assert_eq!(3, n);
        assert_eq!(vec![0xE5, 0x8E, 0x26], buf);
    }

    #[test]
    fn decode_extra_data() {
        let buf = [0xE5, 0x8E, 0x26, 0x53, 0x21];
        let (v, num_bytes) = decode_uleb128(&buf).unwrap();

        assert_eq!(624485, v);
        assert_eq!(3, num_bytes);
    }

    #[test]
    fn encode_max() {
        let mut buf = Vec::new();
        encode_uleb128(u64::MAX, &mut buf);

        assert_eq!(vec![255, 255, 255, 255, 255, 255, 255, 255, 255, 1], buf);
        assert_eq!((u64::MAX, 10), decode_uleb128(&buf).unwrap());
    }

    #[test]
    fn decode_truncated() {
        assert!(decode_uleb128(&[0x80, 0x80]).is_err());
        assert!(decode_uleb128(&[]).is_err());
    }
}
