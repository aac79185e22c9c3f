//! Variable-length integer coding.
//!

/// Continuation bit: set on every varint byte except the last.
const MSB: u8 = 0b1000_0000;
/// Mask for the seven payload bits of a varint byte.
const DROP_MSB: u8 = 0b0111_1111;

/// A u64 never needs more than ten groups of seven bits.
const MAX_VARINT_LEN: usize = 10;

/// Decode a variable-length integer from the front of `src`, advancing it past the consumed bytes.
///
/// Returns `None` when the input ends mid-varint or the varint is longer than ten bytes; `src`
/// is left untouched in that case.
pub fn decode_var(src: &mut &[u8]) -> Option<u64> {
    let bytes: &[u8] = *src;
    let mut result: u64 = 0;

    for (i, b) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        result |= ((b & DROP_MSB) as u64) << (7 * i);
        if b & MSB == 0 {
            *src = &bytes[i + 1..];
            return Some(result);
        }
    }

    None
}

/// Append `value` to `dst` as a variable-length integer.
pub fn encode_var(mut value: u64, dst: &mut Vec<u8>) {
    while value >= MSB as u64 {
        dst.push((value as u8 & DROP_MSB) | MSB);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Zigzag-encode a signed 64-bit integer (`sint64`).
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_max_u64() {
        let max_vec_encoded = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(decode_var(&mut max_vec_encoded.as_slice()), Some(u64::MAX));
    }

    #[test]
    fn test_decode_advances_input() {
        let data = [0xAC, 0x02, 0x07];
        let mut src = data.as_slice();
        assert_eq!(decode_var(&mut src), Some(300));
        assert_eq!(src, &[0x07]);
    }

    #[test]
    fn test_decode_incomplete_sequence() {
        let incomplete_encoded = [0xFF, 0xFF, 0xFF];
        let mut src = incomplete_encoded.as_slice();
        assert_eq!(decode_var(&mut src), None);
        assert_eq!(src.len(), 3);
    }

    #[test]
    fn test_decode_overlong_sequence() {
        let overlong = [0x80; 11];
        assert_eq!(decode_var(&mut overlong.as_slice()), None);
    }

    #[test]
    fn test_decode_empty_input() {
        assert_eq!(decode_var(&mut [].as_slice()), None);
    }

    #[test]
    fn test_encode_matches_known_bytes() {
        let mut buf = vec![];
        encode_var(300, &mut buf);
        assert_eq!(buf, [0xAC, 0x02]);

        buf.clear();
        encode_var(0, &mut buf);
        assert_eq!(buf, [0x00]);

        buf.clear();
        encode_var(u64::MAX, &mut buf);
        assert_eq!(buf.len(), MAX_VARINT_LEN);
        assert_eq!(decode_var(&mut buf.as_slice()), Some(u64::MAX));
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MAX)), i64::MAX);
    }
}
