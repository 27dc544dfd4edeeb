//! Order-preserving encodings for 64-bit integers and doubles.

use crate::error::EncodingError;

/// Encode an i64 into 8 bytes that preserve signed ordering under `memcmp`.
///
/// Flipping the sign bit maps the signed range onto the unsigned range in
/// order; big-endian layout makes byte comparison match numeric comparison.
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1u64 << 63)).to_be_bytes()
}

/// Decode 8 bytes produced by [`encode_i64`].
pub fn decode_i64(data: &[u8; 8]) -> i64 {
    (u64::from_be_bytes(*data) ^ (1u64 << 63)) as i64
}

/// Encode an f64 into 8 bytes that preserve numeric ordering under `memcmp`.
///
/// Algorithm:
/// 1. Reject NaN.
/// 2. Convert to u64 bits via `f64::to_bits`.
/// 3. If the sign bit is set (negative): flip all bits (`!bits`).
/// 4. If the sign bit is clear (positive/zero): flip only the sign bit.
/// 5. Write as big-endian u64.
///
/// `-0.0` is kept distinct from `0.0` and sorts immediately below it.
pub fn encode_f64(value: f64) -> Result<[u8; 8], EncodingError> {
    if value.is_nan() {
        return Err(EncodingError::NaN);
    }

    let mut bits = value.to_bits();

    if bits & (1u64 << 63) != 0 {
        // Negative: flip all bits.
        bits = !bits;
    } else {
        // Positive or zero: flip the sign bit.
        bits ^= 1u64 << 63;
    }

    Ok(bits.to_be_bytes())
}

/// Decode 8 bytes back into an f64, reversing the encoding transformation.
pub fn decode_f64(data: &[u8; 8]) -> f64 {
    let mut bits = u64::from_be_bytes(*data);

    if bits & (1u64 << 63) != 0 {
        // Sign bit is set in encoded form: was positive or zero.
        bits ^= 1u64 << 63;
    } else {
        // Sign bit is clear in encoded form: was negative.
        bits = !bits;
    }

    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_roundtrip() {
        let values = vec![
            i64::MIN,
            i64::MIN + 1,
            -1_000_000,
            -1,
            0,
            1,
            42,
            1_000_000,
            i64::MAX - 1,
            i64::MAX,
        ];
        for v in values {
            let encoded = encode_i64(v);
            assert_eq!(decode_i64(&encoded), v, "roundtrip failed for {v}");
        }
    }

    #[test]
    fn test_i64_ordering_full_range() {
        let values = vec![
            i64::MIN,
            i64::MIN + 1,
            -(1 << 40),
            -65536,
            -256,
            -2,
            -1,
            0,
            1,
            2,
            255,
            65535,
            1 << 40,
            i64::MAX - 1,
            i64::MAX,
        ];
        let encoded: Vec<[u8; 8]> = values.iter().map(|&v| encode_i64(v)).collect();
        for i in 0..encoded.len() - 1 {
            assert!(
                encoded[i] < encoded[i + 1],
                "expected {} < {} (encoded {:?} < {:?})",
                values[i],
                values[i + 1],
                encoded[i],
                encoded[i + 1],
            );
        }
    }

    #[test]
    fn test_f64_roundtrip() {
        let values = vec![
            0.0,
            -0.0,
            1.0,
            -1.0,
            0.5,
            -0.5,
            f64::INFINITY,
            f64::NEG_INFINITY,
            1e10,
            -1e10,
            f64::MIN_POSITIVE,
            f64::MAX,
            f64::MIN,
            std::f64::consts::PI,
        ];
        for v in values {
            let encoded = encode_f64(v).unwrap();
            let decoded = decode_f64(&encoded);
            assert_eq!(v.to_bits(), decoded.to_bits(), "roundtrip failed for {v}");
        }
    }

    #[test]
    fn test_f64_nan_rejected() {
        assert!(encode_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_f64_ordering() {
        let values = vec![
            f64::NEG_INFINITY,
            -1e10,
            -1.0,
            -0.0001,
            -0.0,
            0.0,
            0.0001,
            1.0,
            1e10,
            f64::INFINITY,
        ];
        let encoded: Vec<[u8; 8]> = values.iter().map(|&v| encode_f64(v).unwrap()).collect();
        for i in 0..encoded.len() - 1 {
            assert!(
                encoded[i] < encoded[i + 1],
                "expected {} < {} (encoded {:?} < {:?})",
                values[i],
                values[i + 1],
                encoded[i],
                encoded[i + 1],
            );
        }
    }
}
