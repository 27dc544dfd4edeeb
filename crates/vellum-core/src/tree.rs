//! A thin key→bytes view over one namespace.
//!
//! Trees store composite-encoded keys and opaque payloads (encoded
//! documents for tables, placeholder entries for indexes) and provide
//! range iteration in both directions with prefix semantics: a range
//! bound is a composite-key prefix, and `exact` ranges are single-prefix
//! lookups.

use crate::error::{Error, Result};
use crate::kv::Namespace;

/// A concrete, evaluated range over encoded keys.
///
/// `exclusive` applies to whichever bound the builder set: an exclusive
/// `min` skips every key sharing the min prefix, an exclusive `max` stops
/// before them. `exact` means the range is the single-prefix lookup of
/// `min`.
#[derive(Debug, Clone, Default)]
pub struct EncodedRange {
    pub min: Option<Vec<u8>>,
    pub max: Option<Vec<u8>>,
    pub exclusive: bool,
    pub exact: bool,
}

/// Smallest byte string greater than every string prefixed by `bytes`,
/// or `None` when no such string exists within the keyspace.
pub fn prefix_successor(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().expect("non-empty") += 1;
            return Some(out);
        }
    }
    None
}

pub struct Tree<'s> {
    ns: Namespace<'s>,
}

impl<'s> Tree<'s> {
    pub fn new(ns: Namespace<'s>) -> Tree<'s> {
        Tree { ns }
    }

    pub fn namespace(&self) -> &Namespace<'s> {
        &self.ns
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ns.put(key, value)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.ns.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        match self.ns.get(key) {
            Ok(_) => Ok(true),
            Err(Error::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.ns.delete(key)
    }

    pub fn truncate(&self) -> Result<()> {
        self.ns.truncate()
    }

    /// Iterate over `(key, value)` pairs within the range, forward or
    /// reverse. Keys passed to `f` have the namespace prefix stripped.
    pub fn iterate_on_range(
        &self,
        range: Option<&EncodedRange>,
        reverse: bool,
        mut f: impl FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        let (lower, upper, skip_prefix) = bounds_for(range);

        let mut cur = self.ns.cursor(lower.as_deref(), upper.as_deref());

        let mut ok = if reverse { cur.last() } else { cur.first() };
        while ok {
            let key = &cur.key()[4..];

            let skipped = match &skip_prefix {
                Some(p) => key.starts_with(p),
                None => false,
            };
            if !skipped {
                f(key, cur.value())?;
            }

            ok = if reverse {
                cur.prev_entry()
            } else {
                cur.next_entry()
            };
        }

        Ok(())
    }
}

/// Translate an evaluated range into cursor bounds plus an optional
/// exclusive-min prefix to skip during iteration.
fn bounds_for(range: Option<&EncodedRange>) -> (Option<Vec<u8>>, Option<Vec<u8>>, Option<Vec<u8>>) {
    let range = match range {
        Some(r) => r,
        None => return (None, None, None),
    };

    if range.exact {
        let min = range.min.clone().unwrap_or_default();
        let upper = prefix_successor(&min);
        let lower = if min.is_empty() { None } else { Some(min) };
        return (lower, upper, None);
    }

    let lower = range.min.clone();
    let skip_prefix = if range.exclusive { lower.clone() } else { None };

    let upper = match &range.max {
        Some(max) if range.exclusive => Some(max.clone()),
        Some(max) => prefix_successor(max),
        None => None,
    };

    (lower, upper, skip_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::key::encode_key;
    use crate::kv::{MemoryEngine, Session};
    use crate::value::Value;

    fn collect(tree: &Tree<'_>, range: Option<&EncodedRange>, reverse: bool) -> Vec<i64> {
        let mut out = Vec::new();
        tree.iterate_on_range(range, reverse, |key, _| {
            match crate::encoding::key::decode_key(key).unwrap().remove(0) {
                Value::Integer(n) => out.push(n),
                other => panic!("unexpected key component {other:?}"),
            }
            Ok(())
        })
        .unwrap();
        out
    }

    fn int_key(n: i64) -> Vec<u8> {
        encode_key(&[Value::Integer(n)]).unwrap()
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(&[0x01]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(&[]), None);
    }

    #[test]
    fn test_range_iteration() {
        let session = Session::new(MemoryEngine::new(), false);
        let tree = Tree::new(session.namespace(50));
        for n in 1..=5 {
            tree.put(&int_key(n), b"v").unwrap();
        }

        // Unbounded, both directions.
        assert_eq!(collect(&tree, None, false), vec![1, 2, 3, 4, 5]);
        assert_eq!(collect(&tree, None, true), vec![5, 4, 3, 2, 1]);

        // min inclusive.
        let rng = EncodedRange {
            min: Some(int_key(3)),
            ..Default::default()
        };
        assert_eq!(collect(&tree, Some(&rng), false), vec![3, 4, 5]);

        // min exclusive.
        let rng = EncodedRange {
            min: Some(int_key(3)),
            exclusive: true,
            ..Default::default()
        };
        assert_eq!(collect(&tree, Some(&rng), false), vec![4, 5]);

        // max inclusive.
        let rng = EncodedRange {
            max: Some(int_key(3)),
            ..Default::default()
        };
        assert_eq!(collect(&tree, Some(&rng), false), vec![1, 2, 3]);

        // max exclusive.
        let rng = EncodedRange {
            max: Some(int_key(3)),
            exclusive: true,
            ..Default::default()
        };
        assert_eq!(collect(&tree, Some(&rng), false), vec![1, 2]);

        // exact.
        let rng = EncodedRange {
            min: Some(int_key(3)),
            exact: true,
            ..Default::default()
        };
        assert_eq!(collect(&tree, Some(&rng), false), vec![3]);
        assert_eq!(collect(&tree, Some(&rng), true), vec![3]);
    }

    #[test]
    fn test_exact_prefix_matches_composite_continuations() {
        let session = Session::new(MemoryEngine::new(), false);
        let tree = Tree::new(session.namespace(50));

        // Keys (1, x) for several x, plus keys under other first components.
        for (a, b) in [(1, 10), (1, 20), (2, 10)] {
            let key = encode_key(&[Value::Integer(a), Value::Integer(b)]).unwrap();
            tree.put(&key, b"v").unwrap();
        }

        let rng = EncodedRange {
            min: Some(int_key(1)),
            exact: true,
            ..Default::default()
        };

        let mut hits = 0;
        tree.iterate_on_range(Some(&rng), false, |key, _| {
            let values = crate::encoding::key::decode_key(key).unwrap();
            assert_eq!(values[0], Value::Integer(1));
            hits += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(hits, 2, "exact range must cover all composite continuations");
    }

    #[test]
    fn test_exclusive_min_skips_composite_continuations() {
        let session = Session::new(MemoryEngine::new(), false);
        let tree = Tree::new(session.namespace(50));

        for (a, b) in [(1, 10), (1, 20), (2, 10), (3, 10)] {
            let key = encode_key(&[Value::Integer(a), Value::Integer(b)]).unwrap();
            tree.put(&key, b"v").unwrap();
        }

        // a > 1 must skip every (1, _) key.
        let rng = EncodedRange {
            min: Some(int_key(1)),
            exclusive: true,
            ..Default::default()
        };
        let mut firsts = Vec::new();
        tree.iterate_on_range(Some(&rng), false, |key, _| {
            firsts.push(crate::encoding::key::decode_key(key).unwrap()[0].clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(firsts, vec![Value::Integer(2), Value::Integer(3)]);
    }

    #[test]
    fn test_early_termination_propagates() {
        let session = Session::new(MemoryEngine::new(), false);
        let tree = Tree::new(session.namespace(50));
        for n in 1..=5 {
            tree.put(&int_key(n), b"v").unwrap();
        }

        let mut seen = 0;
        let err = tree
            .iterate_on_range(None, false, |_, _| {
                seen += 1;
                if seen == 2 {
                    Err(Error::StreamClosed)
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(err.is_stream_closed());
        assert_eq!(seen, 2);
    }
}
