//! The ordered key-value session layer.
//!
//! A [`Session`] wraps an engine snapshot plus an ordered write batch and
//! vends cheap [`Namespace`] handles: disjoint keyspaces prefixed by a
//! 4-byte big-endian namespace id. All reads see the snapshot merged with
//! the pending batch (read-your-writes); commit publishes the batch
//! atomically through the engine.

pub mod memory;
pub mod transient;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{Error, Result};

pub use memory::MemoryEngine;
pub use transient::TransientStore;

pub type NamespaceId = u32;

/// Namespace holding the catalog relation rows.
pub const CATALOG_NAMESPACE: NamespaceId = 1;
/// Namespace holding sequence state.
pub const SEQUENCE_NAMESPACE: NamespaceId = 2;
/// First namespace id handed out to user tables and indexes; lower ids are
/// reserved for system tables.
pub const FIRST_USER_NAMESPACE: NamespaceId = 101;

#[derive(Debug, Clone)]
enum Mutation {
    Put(Vec<u8>),
    Delete,
}

/// A snapshot-isolated session over the ordered store.
pub struct Session {
    engine: MemoryEngine,
    snapshot: BTreeMap<Vec<u8>, Vec<u8>>,
    batch: RefCell<BTreeMap<Vec<u8>, Mutation>>,
    read_only: bool,
}

impl Session {
    pub fn new(engine: MemoryEngine, read_only: bool) -> Session {
        let snapshot = engine.snapshot();
        Session {
            engine,
            snapshot,
            batch: RefCell::new(BTreeMap::new()),
            read_only,
        }
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// A cheap handle on the namespace with the given id.
    pub fn namespace(&self, id: NamespaceId) -> Namespace<'_> {
        Namespace { session: self, id }
    }

    /// Apply the pending batch to the engine atomically and clear it.
    pub(crate) fn commit(&self) -> Result<()> {
        let batch = std::mem::take(&mut *self.batch.borrow_mut());
        self.engine.apply(batch.into_iter().map(|(k, m)| match m {
            Mutation::Put(v) => (k, Some(v)),
            Mutation::Delete => (k, None),
        }));
        Ok(())
    }

    /// Discard the pending batch.
    pub(crate) fn discard(&self) {
        self.batch.borrow_mut().clear();
    }

    fn get_raw(&self, full_key: &[u8]) -> Result<Vec<u8>> {
        if let Some(m) = self.batch.borrow().get(full_key) {
            return match m {
                Mutation::Put(v) => Ok(v.clone()),
                Mutation::Delete => Err(Error::KeyNotFound),
            };
        }
        self.snapshot
            .get(full_key)
            .cloned()
            .ok_or(Error::KeyNotFound)
    }

    /// Merge the snapshot and the batch over `[lower, upper)` in key order.
    fn range_entries(&self, lower: &[u8], upper: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let upper_bound = match upper {
            Some(u) => Bound::Excluded(u),
            None => Bound::Unbounded,
        };

        let batch = self.batch.borrow();
        let mut snap = self
            .snapshot
            .range::<[u8], _>((Bound::Included(lower), upper_bound))
            .peekable();
        let mut pending = batch
            .range::<[u8], _>((Bound::Included(lower), upper_bound))
            .peekable();

        let mut out = Vec::new();
        loop {
            match (snap.peek(), pending.peek()) {
                (None, None) => break,
                (Some(_), None) => {
                    let (k, v) = snap.next().expect("peeked");
                    out.push((k.clone(), v.clone()));
                }
                (None, Some(_)) => {
                    let (k, m) = pending.next().expect("peeked");
                    if let Mutation::Put(v) = m {
                        out.push((k.clone(), v.clone()));
                    }
                }
                (Some((sk, _)), Some((bk, _))) => {
                    if sk < bk {
                        let (k, v) = snap.next().expect("peeked");
                        out.push((k.clone(), v.clone()));
                    } else {
                        if sk == bk {
                            snap.next();
                        }
                        let (k, m) = pending.next().expect("peeked");
                        if let Mutation::Put(v) = m {
                            out.push((k.clone(), v.clone()));
                        }
                    }
                }
            }
        }
        out
    }
}

/// A disjoint, prefixed keyspace within the session.
#[derive(Clone, Copy)]
pub struct Namespace<'s> {
    session: &'s Session,
    id: NamespaceId,
}

impl<'s> Namespace<'s> {
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    fn prefix(&self) -> [u8; 4] {
        self.id.to_be_bytes()
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + key.len());
        out.extend_from_slice(&self.prefix());
        out.extend_from_slice(key);
        out
    }

    /// Exclusive upper bound of this namespace's keyspace, `None` when the
    /// namespace is the last representable one.
    fn prefix_end(&self) -> Option<[u8; 4]> {
        self.id.checked_add(1).map(|n| n.to_be_bytes())
    }

    /// Write a key/value pair. Both must be non-empty.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.session.read_only {
            return Err(Error::ReadOnly);
        }
        if key.is_empty() {
            return Err(Error::InvalidArgument("key cannot be empty".to_string()));
        }
        if value.is_empty() {
            return Err(Error::InvalidArgument("value cannot be empty".to_string()));
        }

        self.session
            .batch
            .borrow_mut()
            .insert(self.full_key(key), Mutation::Put(value.to_vec()));
        Ok(())
    }

    /// Read the value under `key`, failing with `KeyNotFound` when absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.session.get_raw(&self.full_key(key))
    }

    /// Delete the key, failing with `KeyNotFound` when absent.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if self.session.read_only {
            return Err(Error::ReadOnly);
        }

        let full = self.full_key(key);
        // Distinguish absence from success.
        self.session.get_raw(&full)?;
        self.session
            .batch
            .borrow_mut()
            .insert(full, Mutation::Delete);
        Ok(())
    }

    /// Delete every key in the namespace.
    pub fn truncate(&self) -> Result<()> {
        if self.session.read_only {
            return Err(Error::ReadOnly);
        }

        let prefix = self.prefix();
        let end = self.prefix_end();
        let entries = self
            .session
            .range_entries(&prefix, end.as_ref().map(|e| e.as_slice()));

        let mut batch = self.session.batch.borrow_mut();
        for (k, _) in entries {
            batch.insert(k, Mutation::Delete);
        }
        Ok(())
    }

    /// An ordered cursor over the namespace, optionally bounded by
    /// `[lower, upper)` (namespace-relative keys). Cursor keys are the raw
    /// prefixed keys; callers strip the 4-byte prefix when needed.
    pub fn cursor(&self, lower: Option<&[u8]>, upper: Option<&[u8]>) -> Cursor {
        let lo = match lower {
            Some(l) => self.full_key(l),
            None => self.prefix().to_vec(),
        };
        let hi = match upper {
            Some(u) => Some(self.full_key(u)),
            None => self.prefix_end().map(|e| e.to_vec()),
        };
        let entries = self.session.range_entries(&lo, hi.as_deref());
        Cursor { entries, pos: None }
    }
}

/// An ordered cursor over a materialized range of entries.
///
/// The view is fixed at creation: writes made while the cursor is open are
/// not observed, which gives scans a stable snapshot while the same tree
/// is mutated downstream.
pub struct Cursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
}

impl Cursor {
    pub fn first(&mut self) -> bool {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
        self.valid()
    }

    pub fn last(&mut self) -> bool {
        self.pos = self.entries.len().checked_sub(1);
        self.valid()
    }

    /// Position on the first entry with key >= `key` (raw prefixed key).
    pub fn seek_ge(&mut self, key: &[u8]) -> bool {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.pos = if idx < self.entries.len() {
            Some(idx)
        } else {
            None
        };
        self.valid()
    }

    /// Position on the last entry with key < `key` (raw prefixed key).
    pub fn seek_lt(&mut self, key: &[u8]) -> bool {
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.pos = idx.checked_sub(1);
        self.valid()
    }

    pub fn next_entry(&mut self) -> bool {
        self.pos = match self.pos {
            Some(p) if p + 1 < self.entries.len() => Some(p + 1),
            _ => None,
        };
        self.valid()
    }

    pub fn prev_entry(&mut self) -> bool {
        self.pos = match self.pos {
            Some(p) => p.checked_sub(1),
            None => None,
        };
        self.valid()
    }

    pub fn valid(&self) -> bool {
        self.pos.is_some()
    }

    /// The raw prefixed key under the cursor. Panics when invalid.
    pub fn key(&self) -> &[u8] {
        &self.entries[self.pos.expect("cursor is not valid")].0
    }

    pub fn value(&self) -> &[u8] {
        &self.entries[self.pos.expect("cursor is not valid")].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(MemoryEngine::new(), false)
    }

    #[test]
    fn test_namespace_isolation() {
        let s = session();
        let ns_a = s.namespace(10);
        let ns_b = s.namespace(20);

        ns_a.put(b"foo", b"FOO").unwrap();
        ns_b.put(b"foo", b"BAR").unwrap();

        assert_eq!(ns_a.get(b"foo").unwrap(), b"FOO");
        assert_eq!(ns_b.get(b"foo").unwrap(), b"BAR");

        ns_a.delete(b"foo").unwrap();
        assert!(matches!(ns_a.get(b"foo"), Err(Error::KeyNotFound)));
        assert_eq!(ns_b.get(b"foo").unwrap(), b"BAR");
    }

    #[test]
    fn test_read_only_session() {
        let engine = MemoryEngine::new();
        {
            let rw = Session::new(engine.clone(), false);
            rw.namespace(10).put(b"id", b"1").unwrap();
            rw.commit().unwrap();
        }

        let ro = Session::new(engine, true);
        let ns = ro.namespace(10);

        assert!(matches!(ns.put(b"id", b"2"), Err(Error::ReadOnly)));
        assert!(matches!(ns.delete(b"id"), Err(Error::ReadOnly)));
        assert!(matches!(ns.truncate(), Err(Error::ReadOnly)));
        assert_eq!(ns.get(b"id").unwrap(), b"1");
    }

    #[test]
    fn test_put_rejects_empty_key_and_value() {
        let s = session();
        let ns = s.namespace(10);
        assert!(matches!(ns.put(b"", b"x"), Err(Error::InvalidArgument(_))));
        assert!(matches!(ns.put(b"x", b""), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_put_replaces_existing() {
        let s = session();
        let ns = s.namespace(10);
        ns.put(b"foo", b"FOO").unwrap();
        ns.put(b"foo", b"BAR").unwrap();
        assert_eq!(ns.get(b"foo").unwrap(), b"BAR");
    }

    #[test]
    fn test_delete_missing_key() {
        let s = session();
        assert!(matches!(
            s.namespace(10).delete(b"nope"),
            Err(Error::KeyNotFound)
        ));
    }

    #[test]
    fn test_truncate_only_affects_namespace() {
        let s = session();
        let ns_a = s.namespace(10);
        let ns_b = s.namespace(11);
        ns_a.put(b"a", b"1").unwrap();
        ns_a.put(b"b", b"2").unwrap();
        ns_b.put(b"a", b"3").unwrap();

        ns_a.truncate().unwrap();

        assert!(ns_a.get(b"a").is_err());
        assert!(ns_a.get(b"b").is_err());
        assert_eq!(ns_b.get(b"a").unwrap(), b"3");
    }

    #[test]
    fn test_read_your_writes_through_cursor() {
        let engine = MemoryEngine::new();
        {
            let s = Session::new(engine.clone(), false);
            s.namespace(10).put(b"a", b"committed").unwrap();
            s.commit().unwrap();
        }

        let s = Session::new(engine, false);
        let ns = s.namespace(10);
        ns.put(b"b", b"pending").unwrap();
        ns.put(b"a", b"overwritten").unwrap();

        let mut cur = ns.cursor(None, None);
        let mut seen = Vec::new();
        let mut ok = cur.first();
        while ok {
            seen.push((cur.key()[4..].to_vec(), cur.value().to_vec()));
            ok = cur.next_entry();
        }
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"overwritten".to_vec()),
                (b"b".to_vec(), b"pending".to_vec()),
            ]
        );
    }

    #[test]
    fn test_cursor_seeks() {
        let s = session();
        let ns = s.namespace(10);
        for k in [b"a", b"c", b"e"] {
            ns.put(k, b"v").unwrap();
        }

        let mut cur = ns.cursor(None, None);

        assert!(cur.seek_ge(&[0, 0, 0, 10, b'b']));
        assert_eq!(&cur.key()[4..], b"c");

        assert!(cur.seek_lt(&[0, 0, 0, 10, b'c']));
        assert_eq!(&cur.key()[4..], b"a");

        assert!(cur.last());
        assert_eq!(&cur.key()[4..], b"e");
        assert!(cur.prev_entry());
        assert_eq!(&cur.key()[4..], b"c");

        assert!(!cur.seek_ge(&[0, 0, 0, 10, b'z']));
        assert!(!cur.valid());
    }

    #[test]
    fn test_commit_then_fresh_session_sees_data() {
        let engine = MemoryEngine::new();
        let s = Session::new(engine.clone(), false);
        s.namespace(10).put(b"k", b"v").unwrap();

        // Not visible before commit.
        let other = Session::new(engine.clone(), false);
        assert!(other.namespace(10).get(b"k").is_err());

        s.commit().unwrap();
        let after = Session::new(engine, false);
        assert_eq!(after.namespace(10).get(b"k").unwrap(), b"v");
    }
}
