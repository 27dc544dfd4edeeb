//! Tables: document storage keyed by the primary key.
//!
//! A [`Table`] is a short-lived view tied to a transaction: the catalog
//! builds one per lookup, borrowing the session's namespace. Insertion
//! validates, derives the storage key from the declared primary key (or a
//! surrogate docid sequence), writes the encoded document, then maintains
//! every index of the table.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::database::Transaction;
use crate::encoding::key::encode_key;
use crate::encoding::value::{decode_document, encode_document};
use crate::error::{Error, Result};
use crate::kv::NamespaceId;
use crate::schema::{self, FieldConstraint, TableConstraint};
use crate::tree::{EncodedRange, Tree};
use crate::value::{Document, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub store_namespace: NamespaceId,
    #[serde(default)]
    pub field_constraints: Vec<FieldConstraint>,
    #[serde(default)]
    pub table_constraints: Vec<TableConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docid_sequence_name: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>) -> TableInfo {
        TableInfo {
            table_name: table_name.into(),
            store_namespace: 0,
            field_constraints: Vec::new(),
            table_constraints: Vec::new(),
            docid_sequence_name: None,
            read_only: false,
        }
    }

    /// The declared primary key, when there is one. Tables without a
    /// declared key store rows under surrogate docids.
    pub fn primary_key(&self) -> Option<&TableConstraint> {
        self.table_constraints.iter().find(|tc| tc.primary_key)
    }

    pub fn validate_document(&self, doc: &Document) -> Result<Document> {
        schema::validate_document(&self.field_constraints, &self.table_constraints, doc)
    }
}

impl fmt::Display for TableInfo {
    /// Canonical `CREATE TABLE` rendering stored in the catalog's `sql`
    /// column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items = Vec::new();

        for fc in &self.field_constraints {
            let mut item = fc.path.to_string();
            if let Some(kind) = fc.kind {
                item.push_str(&format!(" {kind}"));
            }
            if fc.not_null {
                item.push_str(" NOT NULL");
            }
            if let Some(default) = &fc.default_value {
                item.push_str(&format!(" DEFAULT {default}"));
            }
            items.push(item);
        }

        for tc in &self.table_constraints {
            if tc.primary_key {
                items.push(format!("PRIMARY KEY ({})", join_paths(&tc.paths)));
            } else if tc.unique {
                items.push(format!("UNIQUE ({})", join_paths(&tc.paths)));
            } else if let Some(check) = &tc.check {
                items.push(format!("CHECK ({check})"));
            }
        }

        write!(f, "CREATE TABLE {} ({})", self.table_name, items.join(", "))
    }
}

fn join_paths(paths: &[crate::value::Path]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A transaction-scoped view over one table.
pub struct Table<'t> {
    pub tx: &'t Transaction,
    pub tree: Tree<'t>,
    pub info: Arc<TableInfo>,
}

impl<'t> Table<'t> {
    /// Validate and insert a document, returning the storage key and the
    /// document as stored (coerced values, defaults applied).
    pub fn insert(&self, doc: &Document) -> Result<(Vec<u8>, Document)> {
        let doc = self.info.validate_document(doc)?;
        let key = self.derive_key(&doc)?;

        if self.tree.exists(&key)? {
            return Err(Error::constraint("PRIMARY KEY"));
        }

        self.tree.put(&key, &encode_document(&doc)?)?;

        for index_name in self
            .tx
            .catalog()
            .list_indexes(Some(&self.info.table_name))
        {
            let index = self.tx.catalog().get_index(self.tx, &index_name)?;
            let values = index.values_from_document(&doc);
            index.set(&values, &key)?;
        }

        Ok((key, doc))
    }

    /// Validate and overwrite the document stored under `key`.
    pub fn replace(&self, key: &[u8], doc: &Document) -> Result<Document> {
        let doc = self.info.validate_document(doc)?;

        if !self.tree.exists(key)? {
            return Err(Error::KeyNotFound);
        }

        self.tree.put(key, &encode_document(&doc)?)?;
        Ok(doc)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.tree.delete(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<Document> {
        let bytes = self.tree.get(key)?;
        Ok(decode_document(&bytes)?)
    }

    /// Iterate `(key, document)` pairs over the range.
    pub fn iterate_on_range(
        &self,
        range: Option<&EncodedRange>,
        reverse: bool,
        mut f: impl FnMut(&[u8], Document) -> Result<()>,
    ) -> Result<()> {
        self.tree.iterate_on_range(range, reverse, |key, value| {
            let doc = decode_document(value)?;
            f(key, doc)
        })
    }

    /// Derive the storage key for a validated document: the declared
    /// primary key paths, or a fresh surrogate docid.
    fn derive_key(&self, doc: &Document) -> Result<Vec<u8>> {
        if let Some(pk) = self.info.primary_key() {
            let mut values = Vec::with_capacity(pk.paths.len());
            for path in &pk.paths {
                match path.get_from_document(doc) {
                    Some(v) if !v.is_null() => values.push(v.clone()),
                    _ => return Err(Error::constraint_at("NOT NULL", path.clone())),
                }
            }
            return Ok(encode_key(&values)?);
        }

        let seq_name = self.info.docid_sequence_name.as_deref().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "table {} has neither a primary key nor a docid sequence",
                self.info.table_name
            ))
        })?;
        let seq = self.tx.catalog().get_sequence(seq_name)?;
        let docid = seq.next(self.tx)?;
        Ok(encode_key(&[Value::Integer(docid)])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Path;

    #[test]
    fn test_canonical_sql_rendering() {
        use crate::value::ValueKind;

        let mut info = TableInfo::new("users");
        info.field_constraints = vec![
            {
                let mut fc = FieldConstraint::typed(Path::parse("id").unwrap(), ValueKind::Integer);
                fc.not_null = true;
                fc
            },
            FieldConstraint::typed(Path::parse("name").unwrap(), ValueKind::Text),
        ];
        info.table_constraints = vec![TableConstraint::primary_key(vec![
            Path::parse("id").unwrap()
        ])];

        assert_eq!(
            info.to_string(),
            "CREATE TABLE users (id INTEGER NOT NULL, name TEXT, PRIMARY KEY (id))"
        );
    }
}
