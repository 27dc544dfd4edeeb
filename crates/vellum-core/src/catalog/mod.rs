//! The catalog: every table, index and sequence the database knows about.
//!
//! Objects live in memory for fast access and are mirrored to the
//! self-describing catalog table in namespace 1. Mutations require a
//! transaction: each cache change registers a rollback hook, and the
//! persisted rows ride the transaction batch, so an abort restores both
//! sides consistently.

pub mod cache;
pub mod store;

use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::index::{Index, IndexInfo};
use crate::schema::{self, FieldConstraint, Owner, TableConstraint};
use crate::sequence::{Sequence, SequenceInfo};
use crate::table::{Table, TableInfo};
use crate::tree::Tree;

pub use cache::CatalogCache;
pub use store::{CatalogStore, Relation};

/// System table names.
pub const CATALOG_TABLE_NAME: &str = "__catalog";
pub const SEQUENCE_TABLE_NAME: &str = "__sequence";
/// The reserved sequence allocating store namespaces for tables and
/// indexes.
pub const STORE_SEQUENCE: &str = "__store_seq";

pub struct Catalog {
    cache: RwLock<CatalogCache>,
    store: CatalogStore,
}

impl Default for Catalog {
    fn default() -> Catalog {
        Catalog::new()
    }
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog {
            cache: RwLock::new(CatalogCache::default()),
            store: CatalogStore::new(),
        }
    }

    pub(crate) fn cache_mut(&self) -> RwLockWriteGuard<'_, CatalogCache> {
        self.cache.write()
    }

    /// Ensure the store-namespace sequence exists. Called once per open,
    /// after `load`.
    pub fn init(&self, tx: &Transaction) -> Result<()> {
        let info = SequenceInfo {
            name: STORE_SEQUENCE.to_string(),
            // The first 100 namespaces are reserved for system tables.
            start: crate::kv::FIRST_USER_NAMESPACE as i64,
            min: 1,
            max: u32::MAX as i64,
            increment_by: 1,
            owner: Some(Owner {
                table_name: CATALOG_TABLE_NAME.to_string(),
                paths: Vec::new(),
            }),
        };

        match self.create_sequence(tx, info) {
            Err(e) if e.is_already_exists() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    /// Rebuild the cache from the persisted catalog rows.
    pub fn load(&self, tx: &Transaction) -> Result<()> {
        let table = self.store.table(tx);
        let mut relations = Vec::new();
        table.iterate_on_range(None, false, |_, doc| {
            relations.push(Relation::from_document(&doc)?);
            Ok(())
        })?;

        let mut cache = self.cache.write();
        for relation in relations {
            cache.load_relation(relation);
        }
        Ok(())
    }

    fn generate_store_namespace(&self, tx: &Transaction) -> Result<crate::kv::NamespaceId> {
        let seq = self.get_sequence(STORE_SEQUENCE)?;
        let v = seq.next(tx)?;
        Ok(v as crate::kv::NamespaceId)
    }

    fn check_writable(&self, tx: &Transaction) -> Result<()> {
        if tx.writable() {
            Ok(())
        } else {
            Err(Error::ReadOnly)
        }
    }

    // ---- tables ----

    pub fn get_table<'t>(&self, tx: &'t Transaction, name: &str) -> Result<Table<'t>> {
        let info = self.get_table_info(name)?;
        Ok(Table {
            tx,
            tree: Tree::new(tx.session().namespace(info.store_namespace)),
            info,
        })
    }

    pub fn get_table_info(&self, name: &str) -> Result<Arc<TableInfo>> {
        self.cache.read().get_table(name).ok_or(Error::NotFound {
            kind: "table",
            name: name.to_string(),
        })
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.cache.read().list_tables()
    }

    /// Create a table. Infers field constraints, allocates a store
    /// namespace, sets up the surrogate docid sequence when no primary key
    /// is declared, and creates one unique index per UNIQUE constraint.
    pub fn create_table(&self, tx: &Transaction, mut info: TableInfo) -> Result<Arc<TableInfo>> {
        self.check_writable(tx)?;

        if info.table_name.is_empty() {
            return Err(Error::InvalidArgument("table name required".to_string()));
        }

        let exists = self.cache.read().object_exists(&info.table_name);
        if exists {
            return Err(Error::AlreadyExists {
                name: info.table_name,
            });
        }

        info.field_constraints =
            schema::infer_field_constraints(info.field_constraints, &info.table_constraints)?;

        if info.store_namespace == 0 {
            info.store_namespace = self.generate_store_namespace(tx)?;
        }

        if info.primary_key().is_none() && info.docid_sequence_name.is_none() {
            let base = format!("{}_seq", info.table_name);
            let seq_name = self.cache.read().generate_unused_name(&base);
            let mut seq = SequenceInfo::new(seq_name.clone());
            seq.owner = Some(Owner {
                table_name: info.table_name.clone(),
                paths: Vec::new(),
            });
            self.create_sequence(tx, seq)?;
            info.docid_sequence_name = Some(seq_name);
        }

        let unique_constraints: Vec<TableConstraint> = info
            .table_constraints
            .iter()
            .filter(|tc| tc.unique && !tc.primary_key)
            .cloned()
            .collect();

        let info = Arc::new(info);
        self.store.insert(tx, &Relation::Table(info.clone()))?;
        self.cache.write().add_table(tx, info.clone())?;

        debug!(table = %info.table_name, namespace = info.store_namespace, "created table");

        for tc in unique_constraints {
            let mut idx = IndexInfo::new(&info.table_name, tc.paths.clone(), true);
            idx.owner = Some(Owner {
                table_name: info.table_name.clone(),
                paths: tc.paths,
            });
            self.create_index(tx, idx)?;
        }

        Ok(info)
    }

    /// Drop a table, cascading over its indexes and surrogate docid
    /// sequence, and truncating the underlying namespaces.
    pub fn drop_table(&self, tx: &Transaction, name: &str) -> Result<()> {
        self.check_writable(tx)?;

        let info = self.get_table_info(name)?;
        if info.read_only {
            return Err(Error::ReadOnly);
        }

        let indexes = self.cache.read().table_indexes(name);
        for idx in indexes {
            self.cache.write().delete_index(tx, &idx.index_name)?;
            tx.session().namespace(idx.store_namespace).truncate()?;
            self.store.delete(tx, &idx.index_name)?;
        }

        if let Some(seq_name) = &info.docid_sequence_name {
            self.drop_sequence(tx, seq_name)?;
        }

        self.cache.write().delete_table(tx, name)?;
        self.store.delete(tx, name)?;
        tx.session().namespace(info.store_namespace).truncate()?;

        debug!(table = %name, "dropped table");
        Ok(())
    }

    /// Rename a table, rewriting the catalog rows of the table, its
    /// indexes and any sequences owned by it.
    pub fn rename_table(&self, tx: &Transaction, old_name: &str, new_name: &str) -> Result<()> {
        self.check_writable(tx)?;

        let exists = self.cache.read().object_exists(new_name);
        if exists {
            return Err(Error::AlreadyExists {
                name: new_name.to_string(),
            });
        }

        self.store.delete(tx, old_name).map_err(|e| match e {
            Error::KeyNotFound => Error::NotFound {
                kind: "table",
                name: old_name.to_string(),
            },
            e => e,
        })?;

        let info = self.cache.write().delete_table(tx, old_name)?;
        let mut clone = (*info).clone();
        clone.table_name = new_name.to_string();
        let clone = Arc::new(clone);

        self.store.insert(tx, &Relation::Table(clone.clone()))?;
        self.cache.write().add_table(tx, clone)?;

        let table_indexes = self.cache.read().table_indexes(old_name);
        for idx in table_indexes {
            self.cache.write().delete_index(tx, &idx.index_name)?;
            let mut idx_clone = (*idx).clone();
            idx_clone.table_name = new_name.to_string();
            let idx_clone = Arc::new(idx_clone);
            self.cache.write().add_index(tx, idx_clone.clone())?;
            self.store
                .replace(tx, &idx_clone.index_name, &Relation::Index(idx_clone.clone()))?;
        }

        for seq_name in self.list_sequences() {
            let seq = self.get_sequence(&seq_name)?;
            let owned = matches!(&seq.info.owner, Some(owner) if owner.table_name == old_name);
            if !owned {
                continue;
            }

            self.cache.write().delete_sequence(tx, &seq_name)?;
            let mut seq_clone = (*seq.info).clone();
            if let Some(owner) = &mut seq_clone.owner {
                owner.table_name = new_name.to_string();
            }
            let seq_clone = Arc::new(seq_clone);
            self.cache.write().add_sequence(tx, seq_clone.clone())?;
            self.store
                .replace(tx, &seq_name, &Relation::Sequence(seq_clone))?;
        }

        debug!(old = %old_name, new = %new_name, "renamed table");
        Ok(())
    }

    /// Add a field constraint (and extra table constraints) to a table.
    pub fn add_field_constraint(
        &self,
        tx: &Transaction,
        table_name: &str,
        fc: Option<FieldConstraint>,
        tcs: Vec<TableConstraint>,
    ) -> Result<()> {
        self.check_writable(tx)?;

        let info = self.get_table_info(table_name)?;
        let mut clone = (*info).clone();

        if let Some(fc) = fc {
            if clone.field_constraints.iter().any(|c| c.path == fc.path) {
                return Err(Error::InvalidArgument(format!(
                    "field constraint on {} already exists",
                    fc.path
                )));
            }
            clone.field_constraints.push(fc);
        }

        let unique_constraints: Vec<TableConstraint> = tcs
            .iter()
            .filter(|tc| tc.unique && !tc.primary_key)
            .cloned()
            .collect();
        clone.table_constraints.extend(tcs);
        clone.field_constraints =
            schema::infer_field_constraints(clone.field_constraints, &clone.table_constraints)?;

        let clone = Arc::new(clone);
        self.cache.write().replace_table(tx, clone.clone())?;
        self.store
            .replace(tx, table_name, &Relation::Table(clone.clone()))?;

        for tc in unique_constraints {
            let mut idx = IndexInfo::new(table_name, tc.paths.clone(), true);
            idx.owner = Some(Owner {
                table_name: table_name.to_string(),
                paths: tc.paths,
            });
            self.create_index(tx, idx)?;
        }

        Ok(())
    }

    // ---- indexes ----

    pub fn get_index<'t>(&self, tx: &'t Transaction, name: &str) -> Result<Index<'t>> {
        let info = self.get_index_info(name)?;
        Ok(Index::new(
            Tree::new(tx.session().namespace(info.store_namespace)),
            info,
        ))
    }

    pub fn get_index_info(&self, name: &str) -> Result<Arc<IndexInfo>> {
        self.cache.read().get_index(name).ok_or(Error::NotFound {
            kind: "index",
            name: name.to_string(),
        })
    }

    /// All index names, or the indexes of one table, sorted
    /// lexicographically.
    pub fn list_indexes(&self, table_name: Option<&str>) -> Vec<String> {
        match table_name {
            None => self.cache.read().list_indexes(),
            Some(t) => {
                let mut names: Vec<String> = self
                    .cache
                    .read()
                    .table_indexes(t)
                    .into_iter()
                    .map(|idx| idx.index_name.clone())
                    .collect();
                names.sort();
                names
            }
        }
    }

    /// Create an index on an existing table. Unnamed indexes get a
    /// generated `<table>_<paths>_idx` name.
    pub fn create_index(&self, tx: &Transaction, mut info: IndexInfo) -> Result<Arc<IndexInfo>> {
        self.check_writable(tx)?;

        // The owning table must exist.
        self.get_table_info(&info.table_name)?;

        if info.index_name.is_empty() {
            let base = format!(
                "{}_{}_idx",
                info.table_name,
                info.paths
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("_")
            );
            info.index_name = self.cache.read().generate_unused_name(&base);
        } else {
            let exists = self.cache.read().object_exists(&info.index_name);
            if exists {
                return Err(Error::AlreadyExists {
                    name: info.index_name,
                });
            }
        }

        if info.store_namespace == 0 {
            info.store_namespace = self.generate_store_namespace(tx)?;
        }

        let info = Arc::new(info);
        self.store.insert(tx, &Relation::Index(info.clone()))?;
        self.cache.write().add_index(tx, info.clone())?;

        debug!(index = %info.index_name, table = %info.table_name, "created index");
        Ok(info)
    }

    /// Drop an index. Indexes owned by a table constraint cannot be
    /// dropped directly.
    pub fn drop_index(&self, tx: &Transaction, name: &str) -> Result<()> {
        self.check_writable(tx)?;

        let info = self.get_index_info(name)?;

        if let Some(owner) = &info.owner {
            if !owner.paths.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "cannot drop index {} because a constraint on {} requires it",
                    info.index_name, owner.table_name
                )));
            }
        }

        self.cache.write().delete_index(tx, name)?;
        tx.session().namespace(info.store_namespace).truncate()?;
        self.store.delete(tx, name)?;

        debug!(index = %name, "dropped index");
        Ok(())
    }

    // ---- sequences ----

    pub fn get_sequence(&self, name: &str) -> Result<Sequence> {
        let info = self.cache.read().get_sequence(name).ok_or(Error::NotFound {
            kind: "sequence",
            name: name.to_string(),
        })?;
        Ok(Sequence::new(info))
    }

    pub fn list_sequences(&self) -> Vec<String> {
        self.cache.read().list_sequences()
    }

    pub fn create_sequence(
        &self,
        tx: &Transaction,
        mut info: SequenceInfo,
    ) -> Result<Arc<SequenceInfo>> {
        self.check_writable(tx)?;

        if info.name.is_empty() {
            let owner = info.owner.as_ref().ok_or_else(|| {
                Error::InvalidArgument("sequence name not provided".to_string())
            })?;
            let base = format!("{}_seq", owner.table_name);
            info.name = self.cache.read().generate_unused_name(&base);
        } else {
            let exists = self.cache.read().object_exists(&info.name);
            if exists {
                return Err(Error::AlreadyExists { name: info.name });
            }
        }

        let info = Arc::new(info);
        self.store.insert(tx, &Relation::Sequence(info.clone()))?;
        self.cache.write().add_sequence(tx, info.clone())?;
        Ok(info)
    }

    pub fn drop_sequence(&self, tx: &Transaction, name: &str) -> Result<()> {
        self.check_writable(tx)?;

        let info = self.cache.write().delete_sequence(tx, name)?;
        Sequence::new(info).drop_state(tx)?;
        self.store.delete(tx, name)?;
        Ok(())
    }
}
