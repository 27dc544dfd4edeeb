//! The in-process ordered store engine.
//!
//! Implements the engine contract the core consumes: snapshot reads and
//! atomic batch publication over a single ordered byte-keyed map. On-disk
//! engines plug in behind the same surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// A cheaply clonable handle on an in-memory ordered store.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryEngine {
    pub fn new() -> MemoryEngine {
        MemoryEngine::default()
    }

    /// A point-in-time copy of the whole keyspace.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.inner.read().clone()
    }

    /// Apply a batch atomically: `Some(value)` writes, `None` deletes.
    pub fn apply<I>(&self, batch: I)
    where
        I: IntoIterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
    {
        let mut map = self.inner.write();
        for (key, mutation) in batch {
            match mutation {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}
