//! The persisted catalog: a self-describing table in namespace 1.
//!
//! Catalog rows are ordinary documents keyed by `encode_key(name)`. Each
//! row carries the relation's canonical DDL string plus a serialized
//! `definition` record from which the cache is rebuilt at open time.

use std::sync::Arc;

use crate::database::Transaction;
use crate::encoding::key::encode_key;
use crate::error::{Error, Result};
use crate::index::IndexInfo;
use crate::kv::CATALOG_NAMESPACE;
use crate::schema::{FieldConstraint, Owner, TableConstraint};
use crate::sequence::SequenceInfo;
use crate::table::{Table, TableInfo};
use crate::tree::Tree;
use crate::value::{Document, Path, Value, ValueKind};

pub const RELATION_TABLE_TYPE: &str = "table";
pub const RELATION_INDEX_TYPE: &str = "index";
pub const RELATION_SEQUENCE_TYPE: &str = "sequence";

/// A catalog object, as stored and cached.
#[derive(Debug, Clone)]
pub enum Relation {
    Table(Arc<TableInfo>),
    Index(Arc<IndexInfo>),
    Sequence(Arc<SequenceInfo>),
}

impl Relation {
    pub fn name(&self) -> &str {
        match self {
            Relation::Table(info) => &info.table_name,
            Relation::Index(info) => &info.index_name,
            Relation::Sequence(info) => &info.name,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            Relation::Table(_) => RELATION_TABLE_TYPE,
            Relation::Index(_) => RELATION_INDEX_TYPE,
            Relation::Sequence(_) => RELATION_SEQUENCE_TYPE,
        }
    }

    /// Render the relation as a catalog row document.
    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document::new();
        doc.set("name".into(), Value::Text(self.name().to_string()));
        doc.set("type".into(), Value::Text(self.type_str().to_string()));

        let (sql, owner, definition) = match self {
            Relation::Table(info) => {
                doc.set(
                    "namespace".into(),
                    Value::Integer(info.store_namespace as i64),
                );
                (info.to_string(), None, serialize_definition(info)?)
            }
            Relation::Index(info) => {
                doc.set(
                    "namespace".into(),
                    Value::Integer(info.store_namespace as i64),
                );
                doc.set("table_name".into(), Value::Text(info.table_name.clone()));
                (
                    info.to_string(),
                    info.owner.clone(),
                    serialize_definition(info)?,
                )
            }
            Relation::Sequence(info) => (
                info.to_string(),
                info.owner.clone(),
                serialize_definition(info)?,
            ),
        };

        doc.set("sql".into(), Value::Text(sql));
        if let Some(owner) = owner {
            doc.set("owner".into(), Value::Document(owner_to_document(&owner)));
        }
        doc.set("definition".into(), Value::Text(definition));

        Ok(doc)
    }

    /// Rebuild the relation from a catalog row.
    pub fn from_document(doc: &Document) -> Result<Relation> {
        let type_str = match doc.get("type") {
            Some(Value::Text(s)) => s.as_str(),
            _ => return Err(corrupted("missing type column")),
        };
        let definition = match doc.get("definition") {
            Some(Value::Text(s)) => s.as_str(),
            _ => return Err(corrupted("missing definition column")),
        };

        match type_str {
            RELATION_TABLE_TYPE => {
                let info: TableInfo = deserialize_definition(definition)?;
                Ok(Relation::Table(Arc::new(info)))
            }
            RELATION_INDEX_TYPE => {
                let info: IndexInfo = deserialize_definition(definition)?;
                Ok(Relation::Index(Arc::new(info)))
            }
            RELATION_SEQUENCE_TYPE => {
                let info: SequenceInfo = deserialize_definition(definition)?;
                Ok(Relation::Sequence(Arc::new(info)))
            }
            other => Err(corrupted(&format!("unknown relation type {other:?}"))),
        }
    }
}

fn serialize_definition<T: serde::Serialize>(info: &T) -> Result<String> {
    serde_json::to_string(info)
        .map_err(|e| Error::InvalidArgument(format!("failed to serialize catalog entry: {e}")))
}

fn deserialize_definition<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s)
        .map_err(|e| Error::InvalidArgument(format!("failed to deserialize catalog entry: {e}")))
}

fn corrupted(msg: &str) -> Error {
    Error::InvalidArgument(format!("corrupted catalog row: {msg}"))
}

fn owner_to_document(owner: &Owner) -> Document {
    let mut doc = Document::new();
    doc.set("table_name".into(), Value::Text(owner.table_name.clone()));
    if !owner.paths.is_empty() {
        doc.set(
            "paths".into(),
            Value::Array(
                owner
                    .paths
                    .iter()
                    .map(|p| Value::Text(p.to_string()))
                    .collect(),
            ),
        );
    }
    doc
}

/// The fixed view over the catalog namespace.
pub struct CatalogStore {
    info: Arc<TableInfo>,
}

impl Default for CatalogStore {
    fn default() -> CatalogStore {
        CatalogStore::new()
    }
}

impl CatalogStore {
    pub fn new() -> CatalogStore {
        CatalogStore {
            info: Arc::new(catalog_table_info()),
        }
    }

    pub fn table<'t>(&self, tx: &'t Transaction) -> Table<'t> {
        Table {
            tx,
            tree: Tree::new(tx.session().namespace(CATALOG_NAMESPACE)),
            info: self.info.clone(),
        }
    }

    /// Insert a catalog row; a primary-key collision means the name is
    /// already taken.
    pub fn insert(&self, tx: &Transaction, relation: &Relation) -> Result<()> {
        let doc = relation.to_document()?;
        match self.table(tx).insert(&doc) {
            Err(e) if e.is_constraint_violation("PRIMARY KEY") => Err(Error::AlreadyExists {
                name: relation.name().to_string(),
            }),
            Err(e) => Err(e),
            Ok(_) => Ok(()),
        }
    }

    pub fn replace(&self, tx: &Transaction, name: &str, relation: &Relation) -> Result<()> {
        let key = encode_key(&[Value::Text(name.to_string())])?;
        self.table(tx).replace(&key, &relation.to_document()?)?;
        Ok(())
    }

    pub fn delete(&self, tx: &Transaction, name: &str) -> Result<()> {
        let key = encode_key(&[Value::Text(name.to_string())])?;
        self.table(tx).delete(&key)
    }
}

/// The catalog table's own schema: primary key `name`, typed columns for
/// the relation metadata.
fn catalog_table_info() -> TableInfo {
    let text = |name: &str| FieldConstraint::typed(Path::field(name), ValueKind::Text);

    TableInfo {
        table_name: super::CATALOG_TABLE_NAME.to_string(),
        store_namespace: CATALOG_NAMESPACE,
        field_constraints: vec![
            {
                let mut fc = text("name");
                fc.not_null = true;
                fc
            },
            text("type"),
            FieldConstraint::typed(Path::field("namespace"), ValueKind::Integer),
            text("table_name"),
            text("sql"),
            FieldConstraint::typed(Path::field("owner"), ValueKind::Document),
            text("definition"),
        ],
        table_constraints: vec![TableConstraint::primary_key(vec![Path::field("name")])],
        docid_sequence_name: None,
        read_only: true,
    }
}
