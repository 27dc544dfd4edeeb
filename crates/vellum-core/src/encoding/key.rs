//! Composite key encoding.
//!
//! A composite key is the encoding of a tuple of values: the array encoding
//! with the outer start/end tags stripped. Stripping preserves tuple order
//! and makes the encoding of `(a)` a strict byte-prefix of the encoding of
//! `(a, b)`, which is what prefix range scans rely on.

use crate::error::EncodingError;
use crate::value::Value;

use super::value::{decode_value, encode_value};

/// Encode a tuple of values as a composite key.
pub fn encode_key(values: &[Value]) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    for v in values {
        encode_value(&mut out, v)?;
    }
    Ok(out)
}

/// Decode a composite key back into its tuple of values.
pub fn decode_key(mut data: &[u8]) -> Result<Vec<Value>, EncodingError> {
    let mut values = Vec::new();
    while !data.is_empty() {
        let (v, consumed) = decode_value(data)?;
        values.push(v);
        data = &data[consumed..];
    }
    Ok(values)
}

/// Render a composite key for diagnostics.
pub fn key_to_string(data: &[u8]) -> String {
    match decode_key(data) {
        Ok(values) => {
            let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
        Err(_) => format!("{data:02X?}"),
    }
}
