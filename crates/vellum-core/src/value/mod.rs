//! The document value model.
//!
//! A [`Value`] is a tagged union over the eight kinds the engine stores.
//! Documents are ordered sequences of `(field, value)` pairs with unique
//! field names; insertion order is preserved and observable. Values convert
//! to and from `serde_json::Value` so embedders can build documents with
//! the `json!` macro.

pub mod path;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use path::{Path, PathFragment};

/// A single value stored in a document, array or key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Array(Vec<Value>),
    Document(Document),
}

/// The kind of a [`Value`], used by typed field constraints and the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Double,
    Text,
    Blob,
    Array,
    Document,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Null => "NULL",
            ValueKind::Bool => "BOOL",
            ValueKind::Integer => "INTEGER",
            ValueKind::Double => "DOUBLE",
            ValueKind::Text => "TEXT",
            ValueKind::Blob => "BLOB",
            ValueKind::Array => "ARRAY",
            ValueKind::Document => "DOCUMENT",
        };
        f.write_str(s)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
            Value::Array(_) => ValueKind::Array,
            Value::Document(_) => ValueKind::Document,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by filters: zero values are falsy, everything
    /// else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Double(d) => *d != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Blob(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Document(d) => !d.is_empty(),
        }
    }

    /// Numeric view of the value, when it has one.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Compare two values logically.
    ///
    /// Integers and doubles compare numerically across kinds. Values of
    /// unrelated kinds are incomparable and return `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Document(a), Value::Document(b)) => {
                for ((na, va), (nb, vb)) in a.iter().zip(b.iter()) {
                    match na.cmp(nb) {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                    match va.compare(vb)? {
                        Ordering::Equal => {}
                        ord => return Some(ord),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => {
                let (a, b) = (self.as_f64()?, other.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Convert a `serde_json::Value` into an engine value. Integral JSON
    /// numbers become `Integer`, all others `Double`.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => {
                let mut doc = Document::new();
                for (k, v) in fields {
                    doc.set(k.clone(), Value::from_json(v));
                }
                Value::Document(doc)
            }
        }
    }

    /// Render the value as JSON for embedders and display. `Blob` renders
    /// as a hex string; no JSON round-trip is promised for blobs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => serde_json::Value::String(hex_string(b)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Document(doc) => {
                let mut map = serde_json::Map::new();
                for (k, v) in doc.iter() {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Value {
        Value::from_json(&v)
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for b in bytes {
        s.push_str(&format!("{b:02X}"));
    }
    s
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(d) => {
                if d.is_finite() && d.fract() == 0.0 && d.abs() < 1e15 {
                    write!(f, "{d:.1}")
                } else {
                    write!(f, "{d}")
                }
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Blob(b) => f.write_str(&hex_string(b)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Document(doc) => write!(f, "{doc}"),
        }
    }
}

/// An ordered collection of `(field, value)` pairs with unique field names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Document {
        Document { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set a top-level field, replacing it in place when it already exists
    /// and appending it otherwise.
    pub fn set(&mut self, name: String, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Remove a top-level field, returning its value when present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter()
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Vec<(String, Value)> {
        &mut self.fields
    }

    /// Build a document from a JSON object. Non-object JSON values yield
    /// an empty document.
    pub fn from_json(v: &serde_json::Value) -> Document {
        match Value::from_json(v) {
            Value::Document(doc) => doc,
            _ => Document::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Document(self.clone()).to_json()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Document {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.set(k, v);
        }
        doc
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name:?}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_insertion_order() {
        let mut doc = Document::new();
        doc.set("b".to_string(), Value::Integer(1));
        doc.set("a".to_string(), Value::Integer(2));
        doc.set("b".to_string(), Value::Integer(3));

        let names: Vec<&str> = doc.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"], "replacing a field must keep its slot");
        assert_eq!(doc.get("b"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_from_json_numbers() {
        let v = Value::from_json(&json!({"a": 1, "b": 2.5}));
        let doc = match v {
            Value::Document(d) => d,
            other => panic!("expected document, got {other:?}"),
        };
        assert_eq!(doc.get("a"), Some(&Value::Integer(1)));
        assert_eq!(doc.get("b"), Some(&Value::Double(2.5)));
    }

    #[test]
    fn test_compare_numeric_across_kinds() {
        assert_eq!(
            Value::Integer(1).compare(&Value::Double(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Double(2.0).compare(&Value::Integer(2)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Integer(1).compare(&Value::Text("a".into())), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(10).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(5).to_string(), "5");
        assert_eq!(Value::Double(5.0).to_string(), "5.0");
        assert_eq!(Value::Double(2.4).to_string(), "2.4");
        assert_eq!(Value::Text("abc".into()).to_string(), "\"abc\"");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]).to_string(),
            "[1, 2]"
        );
    }
}
