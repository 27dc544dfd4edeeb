//! Whole-value encoding: one tag byte followed by the kind-specific payload.

use crate::error::EncodingError;
use crate::value::{Document, Value};

use super::{bytes, number};
use super::{
    TAG_ARRAY_END, TAG_ARRAY_START, TAG_BLOB, TAG_DOC_END, TAG_DOC_START, TAG_DOUBLE, TAG_FALSE,
    TAG_INTEGER, TAG_NULL, TAG_TEXT, TAG_TRUE,
};

/// Append the order-preserving encoding of `value` to `out`.
pub fn encode_value(out: &mut Vec<u8>, value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Integer(n) => {
            out.push(TAG_INTEGER);
            out.extend_from_slice(&number::encode_i64(*n));
        }
        Value::Double(d) => {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&number::encode_f64(*d)?);
        }
        Value::Text(s) => {
            out.push(TAG_TEXT);
            bytes::encode_bytes(out, s.as_bytes());
        }
        Value::Blob(b) => {
            out.push(TAG_BLOB);
            bytes::encode_bytes(out, b);
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY_START);
            for item in items {
                encode_value(out, item)?;
            }
            out.push(TAG_ARRAY_END);
        }
        Value::Document(doc) => {
            out.push(TAG_DOC_START);
            for (name, v) in doc.iter() {
                out.push(TAG_TEXT);
                bytes::encode_bytes(out, name.as_bytes());
                encode_value(out, v)?;
            }
            out.push(TAG_DOC_END);
        }
    }
    Ok(())
}

/// Decode one value starting at `data[0]`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_value(data: &[u8]) -> Result<(Value, usize), EncodingError> {
    let tag = *data.first().ok_or(EncodingError::Malformed)?;
    let rest = &data[1..];

    match tag {
        TAG_NULL => Ok((Value::Null, 1)),
        TAG_FALSE => Ok((Value::Bool(false), 1)),
        TAG_TRUE => Ok((Value::Bool(true), 1)),
        TAG_INTEGER => {
            let arr: [u8; 8] = rest
                .get(..8)
                .ok_or(EncodingError::Malformed)?
                .try_into()
                .map_err(|_| EncodingError::Malformed)?;
            Ok((Value::Integer(number::decode_i64(&arr)), 9))
        }
        TAG_DOUBLE => {
            let arr: [u8; 8] = rest
                .get(..8)
                .ok_or(EncodingError::Malformed)?
                .try_into()
                .map_err(|_| EncodingError::Malformed)?;
            Ok((Value::Double(number::decode_f64(&arr)), 9))
        }
        TAG_TEXT => {
            let (raw, consumed) = bytes::decode_bytes(rest)?;
            let s = String::from_utf8(raw).map_err(|_| EncodingError::Malformed)?;
            Ok((Value::Text(s), 1 + consumed))
        }
        TAG_BLOB => {
            let (raw, consumed) = bytes::decode_bytes(rest)?;
            Ok((Value::Blob(raw), 1 + consumed))
        }
        TAG_ARRAY_START => {
            let mut items = Vec::new();
            let mut offset = 1;
            loop {
                match data.get(offset) {
                    Some(&TAG_ARRAY_END) => return Ok((Value::Array(items), offset + 1)),
                    Some(_) => {
                        let (item, consumed) = decode_value(&data[offset..])?;
                        items.push(item);
                        offset += consumed;
                    }
                    None => return Err(EncodingError::Malformed),
                }
            }
        }
        TAG_DOC_START => {
            let mut doc = Document::new();
            let mut offset = 1;
            loop {
                match data.get(offset) {
                    Some(&TAG_DOC_END) => return Ok((Value::Document(doc), offset + 1)),
                    Some(&TAG_TEXT) => {
                        let (raw, consumed) = bytes::decode_bytes(&data[offset + 1..])?;
                        let name =
                            String::from_utf8(raw).map_err(|_| EncodingError::Malformed)?;
                        offset += 1 + consumed;
                        let (v, consumed) = decode_value(&data[offset..])?;
                        doc.set(name, v);
                        offset += consumed;
                    }
                    _ => return Err(EncodingError::Malformed),
                }
            }
        }
        other => Err(EncodingError::InvalidTag(other)),
    }
}

/// Encode a document to its storage representation.
pub fn encode_document(doc: &Document) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    encode_value(&mut out, &Value::Document(doc.clone()))?;
    Ok(out)
}

/// Decode a document from its storage representation.
pub fn decode_document(data: &[u8]) -> Result<Document, EncodingError> {
    match decode_value(data)? {
        (Value::Document(doc), _) => Ok(doc),
        _ => Err(EncodingError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(v: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        encode_value(&mut out, v).unwrap();
        out
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let values = vec![
            Value::Null,
            Value::Bool(false),
            Value::Bool(true),
            Value::Integer(-42),
            Value::Integer(i64::MAX),
            Value::Double(3.25),
            Value::Text("hello\x00world".into()),
            Value::Blob(vec![0xDE, 0x00, 0xAD]),
            Value::Array(vec![Value::Integer(1), Value::Text("x".into())]),
            Value::from_json(&json!({"a": 1, "b": {"c": [true, null]}})),
        ];
        for v in values {
            let encoded = encode(&v);
            let (decoded, consumed) = decode_value(&encoded).unwrap();
            assert_eq!(decoded, v, "roundtrip failed for {v}");
            assert_eq!(consumed, encoded.len(), "consumed mismatch for {v}");
        }
    }

    #[test]
    fn test_tag_order_across_kinds() {
        // Null < false < true < integers < doubles < text < blob < array < document.
        let ladder = vec![
            Value::Null,
            Value::Bool(false),
            Value::Bool(true),
            Value::Integer(i64::MAX),
            Value::Double(f64::NEG_INFINITY),
            Value::Text("".into()),
            Value::Blob(vec![]),
            Value::Array(vec![]),
            Value::Document(Document::new()),
        ];
        let encoded: Vec<Vec<u8>> = ladder.iter().map(encode).collect();
        for i in 0..encoded.len() - 1 {
            assert!(
                encoded[i] < encoded[i + 1],
                "expected {} < {}",
                ladder[i],
                ladder[i + 1],
            );
        }
    }

    #[test]
    fn test_array_prefix_sorts_first() {
        let short = encode(&Value::Array(vec![Value::Integer(1)]));
        let long = encode(&Value::Array(vec![Value::Integer(1), Value::Integer(2)]));
        assert!(short < long, "[1] must sort before [1, 2]");
    }

    #[test]
    fn test_same_kind_ordering() {
        let pairs = vec![
            (Value::Integer(-1), Value::Integer(1)),
            (Value::Double(-1.0), Value::Double(-0.0)),
            (Value::Double(-0.0), Value::Double(0.0)),
            (Value::Double(0.0), Value::Double(1.0)),
            (Value::Text("a".into()), Value::Text("ab".into())),
            (Value::Blob(vec![1]), Value::Blob(vec![2])),
        ];
        for (a, b) in pairs {
            assert!(encode(&a) < encode(&b), "expected {a} < {b}");
        }
    }

    #[test]
    fn test_decode_invalid_tag() {
        assert!(matches!(
            decode_value(&[0xEE]),
            Err(EncodingError::InvalidTag(0xEE))
        ));
        assert!(decode_value(&[]).is_err());
    }
}
