//! Document paths.
//!
//! A path addresses a sub-value within a document: a non-empty sequence of
//! fragments, each either a field name or an array index. The dotted
//! surface (`a.b[0]`) matches what an external parser produces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Document, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathFragment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<PathFragment>);

impl Path {
    /// A single top-level field path.
    pub fn field(name: impl Into<String>) -> Path {
        Path(vec![PathFragment::Field(name.into())])
    }

    /// Parse a dotted path such as `a.b[0].c`.
    pub fn parse(s: &str) -> Result<Path> {
        let mut fragments = Vec::new();

        for part in s.split('.') {
            if part.is_empty() {
                return Err(Error::InvalidArgument(format!("invalid path: {s:?}")));
            }

            // Field name, optionally followed by one or more [n] indexes.
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if !name.is_empty() {
                fragments.push(PathFragment::Field(name.to_string()));
            } else if rest.is_empty() || fragments.is_empty() {
                return Err(Error::InvalidArgument(format!("invalid path: {s:?}")));
            }

            while !rest.is_empty() {
                if !rest.starts_with('[') {
                    return Err(Error::InvalidArgument(format!("invalid path: {s:?}")));
                }
                let close = rest
                    .find(']')
                    .ok_or_else(|| Error::InvalidArgument(format!("invalid path: {s:?}")))?;
                let idx: usize = rest[1..close]
                    .parse()
                    .map_err(|_| Error::InvalidArgument(format!("invalid path: {s:?}")))?;
                fragments.push(PathFragment::Index(idx));
                rest = &rest[close + 1..];
            }
        }

        if fragments.is_empty() {
            return Err(Error::InvalidArgument("empty path".to_string()));
        }

        Ok(Path(fragments))
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.0
    }

    /// Resolve the path within a value, returning `None` when any fragment
    /// is missing.
    pub fn get<'a>(&self, v: &'a Value) -> Option<&'a Value> {
        let mut cur = v;
        for frag in &self.0 {
            cur = match (frag, cur) {
                (PathFragment::Field(name), Value::Document(doc)) => doc.get(name)?,
                (PathFragment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Resolve the path within a document.
    pub fn get_from_document<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let mut frags = self.0.iter();
        let mut cur = match frags.next()? {
            PathFragment::Field(name) => doc.get(name)?,
            PathFragment::Index(_) => return None,
        };
        for frag in frags {
            cur = match (frag, cur) {
                (PathFragment::Field(name), Value::Document(d)) => d.get(name)?,
                (PathFragment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Set the value at the path within a document, creating missing
    /// intermediate documents for field fragments. Array indexes must
    /// resolve to existing elements.
    pub fn set_in_document(&self, doc: &mut Document, value: Value) -> Result<()> {
        let (first, rest) = match self.0.split_first() {
            Some(x) => x,
            None => return Err(Error::InvalidArgument("empty path".to_string())),
        };

        let name = match first {
            PathFragment::Field(name) => name,
            PathFragment::Index(_) => {
                return Err(Error::InvalidArgument(
                    "cannot index into a document".to_string(),
                ))
            }
        };

        if rest.is_empty() {
            doc.set(name.clone(), value);
            return Ok(());
        }

        if doc.get(name).is_none() {
            doc.set(name.clone(), Value::Document(Document::new()));
        }

        // The field exists now; mutate it in place.
        let slot = doc
            .fields_mut()
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .expect("field was just ensured");

        set_in_value(slot, rest, value)
    }
}

fn set_in_value(v: &mut Value, frags: &[PathFragment], value: Value) -> Result<()> {
    let (first, rest) = match frags.split_first() {
        Some(x) => x,
        None => {
            *v = value;
            return Ok(());
        }
    };

    match (first, v) {
        (PathFragment::Field(name), Value::Document(doc)) => {
            if rest.is_empty() {
                doc.set(name.clone(), value);
                return Ok(());
            }
            if doc.get(name).is_none() {
                doc.set(name.clone(), Value::Document(Document::new()));
            }
            let slot = doc
                .fields_mut()
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .expect("field was just ensured");
            set_in_value(slot, rest, value)
        }
        (PathFragment::Index(i), Value::Array(items)) => {
            let slot = items.get_mut(*i).ok_or_else(|| {
                Error::InvalidArgument(format!("array index out of bounds: {i}"))
            })?;
            set_in_value(slot, rest, value)
        }
        _ => Err(Error::InvalidArgument(
            "path does not match document shape".to_string(),
        )),
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frag) in self.0.iter().enumerate() {
            match frag {
                PathFragment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathFragment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_roundtrip() {
        for s in ["a", "a.b", "a.b[0]", "a[1].b", "a[0][1]"] {
            let p = Path::parse(s).unwrap();
            assert_eq!(p.to_string(), s, "display mismatch for {s:?}");
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a..b").is_err());
        assert!(Path::parse("a[x]").is_err());
        assert!(Path::parse("a[1").is_err());
    }

    #[test]
    fn test_get_nested() {
        let doc = Document::from_json(&json!({"a": {"b": [10, 20]}}));
        let p = Path::parse("a.b[1]").unwrap();
        assert_eq!(p.get_from_document(&doc), Some(&Value::Integer(20)));

        let missing = Path::parse("a.c").unwrap();
        assert_eq!(missing.get_from_document(&doc), None);
    }

    #[test]
    fn test_set_creates_intermediate_documents() {
        let mut doc = Document::new();
        Path::parse("a.b")
            .unwrap()
            .set_in_document(&mut doc, Value::Integer(5))
            .unwrap();
        assert_eq!(
            Path::parse("a.b").unwrap().get_from_document(&doc),
            Some(&Value::Integer(5))
        );
    }

    #[test]
    fn test_set_array_out_of_bounds() {
        let mut doc = Document::from_json(&json!({"a": [1]}));
        let err = Path::parse("a[3]")
            .unwrap()
            .set_in_document(&mut doc, Value::Integer(9))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
