//! Secondary indexes.
//!
//! An index entry associates a tuple of indexed values with the primary
//! key of the row that holds them. Non-unique indexes append the key to
//! the entry's composite key (placeholder value); unique indexes key the
//! entry by the values alone and store the key as the entry value, so a
//! second row with the same tuple collides.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::key::{decode_key, encode_key};
use crate::error::{Error, Result};
use crate::kv::NamespaceId;
use crate::schema::Owner;
use crate::tree::{EncodedRange, Tree};
use crate::value::{Document, Path, Value};

// Placeholder payload for non-unique entries; namespaces reject empty
// values.
const ENTRY_PLACEHOLDER: &[u8] = &[0x00];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub index_name: String,
    pub table_name: String,
    pub paths: Vec<Path>,
    #[serde(default)]
    pub unique: bool,
    pub store_namespace: NamespaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl IndexInfo {
    pub fn new(table_name: impl Into<String>, paths: Vec<Path>, unique: bool) -> IndexInfo {
        IndexInfo {
            index_name: String::new(),
            table_name: table_name.into(),
            paths,
            unique,
            store_namespace: 0,
            owner: None,
        }
    }
}

impl fmt::Display for IndexInfo {
    /// Canonical `CREATE INDEX` rendering stored in the catalog's `sql`
    /// column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CREATE {}INDEX {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.index_name,
            self.table_name,
            self.paths
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// A transaction-scoped view over one index.
pub struct Index<'t> {
    pub tree: Tree<'t>,
    pub info: Arc<IndexInfo>,
}

impl<'t> Index<'t> {
    pub fn new(tree: Tree<'t>, info: Arc<IndexInfo>) -> Index<'t> {
        Index { tree, info }
    }

    /// Extract the indexed values from a document; missing paths index as
    /// NULL so every row has an entry.
    pub fn values_from_document(&self, doc: &Document) -> Vec<Value> {
        self.info
            .paths
            .iter()
            .map(|p| p.get_from_document(doc).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Insert the entry for `(values, key)`.
    ///
    /// On a unique index an existing entry for the same values and a
    /// different key is a UNIQUE violation; re-asserting the entry of the
    /// same row is a no-op, which keeps index maintenance idempotent.
    pub fn set(&self, values: &[Value], key: &[u8]) -> Result<()> {
        if values.len() != self.info.paths.len() {
            return Err(Error::InvalidArgument(format!(
                "index {} expects {} values, got {}",
                self.info.index_name,
                self.info.paths.len(),
                values.len()
            )));
        }

        if self.info.unique {
            let entry_key = encode_key(values)?;
            match self.tree.get(&entry_key) {
                Ok(existing) if existing == key => Ok(()),
                Ok(_) => Err(Error::constraint_at(
                    "UNIQUE",
                    self.info.paths[0].clone(),
                )),
                Err(Error::KeyNotFound) => self.tree.put(&entry_key, key),
                Err(e) => Err(e),
            }
        } else {
            self.tree
                .put(&self.entry_key(values, key)?, ENTRY_PLACEHOLDER)
        }
    }

    /// Remove the entry for `(values, key)`. Missing entries are ignored
    /// so maintenance stays tolerant of rebuilt indexes.
    pub fn delete(&self, values: &[Value], key: &[u8]) -> Result<()> {
        if self.info.unique {
            let entry_key = encode_key(values)?;
            match self.tree.get(&entry_key) {
                Ok(existing) if existing == key => self.tree.delete(&entry_key),
                Ok(_) | Err(Error::KeyNotFound) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            let entry_key = self.entry_key(values, key)?;
            match self.tree.delete(&entry_key) {
                Ok(()) | Err(Error::KeyNotFound) => Ok(()),
                Err(e) => Err(e),
            }
        }
    }

    /// Iterate over the primary keys referenced by entries within the
    /// range.
    pub fn iterate_on_range(
        &self,
        range: Option<&EncodedRange>,
        reverse: bool,
        mut f: impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let unique = self.info.unique;
        let arity = self.info.paths.len();

        self.tree.iterate_on_range(range, reverse, |key, value| {
            if unique {
                f(value)
            } else {
                // The referenced key is the trailing blob component.
                let values = decode_key(key)?;
                match values.get(arity) {
                    Some(Value::Blob(pk)) => f(pk),
                    _ => Err(Error::Encoding(crate::error::EncodingError::Malformed)),
                }
            }
        })
    }

    pub fn truncate(&self) -> Result<()> {
        self.tree.truncate()
    }

    fn entry_key(&self, values: &[Value], key: &[u8]) -> Result<Vec<u8>> {
        let mut components = values.to_vec();
        components.push(Value::Blob(key.to_vec()));
        Ok(encode_key(&components)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryEngine, Session};

    fn index(session: &Session, unique: bool) -> Index<'_> {
        let mut info = IndexInfo::new("foo", vec![Path::parse("a").unwrap()], unique);
        info.index_name = "idx_foo_a".to_string();
        info.store_namespace = 120;
        Index::new(Tree::new(session.namespace(120)), Arc::new(info))
    }

    fn pk(n: i64) -> Vec<u8> {
        encode_key(&[Value::Integer(n)]).unwrap()
    }

    #[test]
    fn test_non_unique_allows_duplicate_values() {
        let session = Session::new(MemoryEngine::new(), false);
        let idx = index(&session, false);

        idx.set(&[Value::Integer(10)], &pk(1)).unwrap();
        idx.set(&[Value::Integer(10)], &pk(2)).unwrap();

        let mut pks = Vec::new();
        idx.iterate_on_range(None, false, |key| {
            pks.push(key.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(pks, vec![pk(1), pk(2)]);
    }

    #[test]
    fn test_unique_conflict() {
        let session = Session::new(MemoryEngine::new(), false);
        let idx = index(&session, true);

        idx.set(&[Value::Integer(10)], &pk(1)).unwrap();

        // Same row again is a no-op.
        idx.set(&[Value::Integer(10)], &pk(1)).unwrap();

        // A different row with the same tuple collides.
        let err = idx.set(&[Value::Integer(10)], &pk(2)).unwrap_err();
        assert!(err.is_constraint_violation("UNIQUE"), "got {err}");
    }

    #[test]
    fn test_delete_is_tolerant() {
        let session = Session::new(MemoryEngine::new(), false);
        let idx = index(&session, false);

        idx.set(&[Value::Integer(10)], &pk(1)).unwrap();
        idx.delete(&[Value::Integer(10)], &pk(1)).unwrap();
        // Deleting again is not an error.
        idx.delete(&[Value::Integer(10)], &pk(1)).unwrap();

        let mut count = 0;
        idx.iterate_on_range(None, false, |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_range_iteration_dereferences_keys() {
        let session = Session::new(MemoryEngine::new(), false);
        let idx = index(&session, false);

        for (v, k) in [(1, 10), (2, 20), (3, 30)] {
            idx.set(&[Value::Integer(v)], &pk(k)).unwrap();
        }

        // a >= 2.
        let rng = EncodedRange {
            min: Some(encode_key(&[Value::Integer(2)]).unwrap()),
            ..Default::default()
        };
        let mut pks = Vec::new();
        idx.iterate_on_range(Some(&rng), false, |key| {
            pks.push(key.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(pks, vec![pk(20), pk(30)]);
    }
}
