//! The in-memory catalog cache.
//!
//! One map per relation kind, keyed by object name. Every mutation made
//! under a transaction registers a compensating rollback hook; commit
//! forgets them, abort replays them in reverse so the cache snaps back to
//! its pre-transaction state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::index::IndexInfo;
use crate::sequence::SequenceInfo;
use crate::table::TableInfo;

pub(crate) type RollbackHook = Box<dyn FnOnce(&mut CatalogCache) + Send>;

#[derive(Default)]
pub struct CatalogCache {
    tables: HashMap<String, Arc<TableInfo>>,
    indexes: HashMap<String, Arc<IndexInfo>>,
    sequences: HashMap<String, Arc<SequenceInfo>>,
}

impl CatalogCache {
    /// Name uniqueness is global across tables, indexes and sequences.
    pub fn object_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
            || self.indexes.contains_key(name)
            || self.sequences.contains_key(name)
    }

    /// Generate `base`, `base1`, `base2`, ... picking the first name unused
    /// across all three object maps.
    pub fn generate_unused_name(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut i = 0;
        while self.object_exists(&name) {
            i += 1;
            name = format!("{base}{i}");
        }
        name
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.tables.get(name).cloned()
    }

    pub fn get_index(&self, name: &str) -> Option<Arc<IndexInfo>> {
        self.indexes.get(name).cloned()
    }

    pub fn get_sequence(&self, name: &str) -> Option<Arc<SequenceInfo>> {
        self.sequences.get(name).cloned()
    }

    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.indexes
            .values()
            .filter(|idx| idx.table_name == table_name)
            .cloned()
            .collect()
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn list_indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn list_sequences(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sequences.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn add_table(&mut self, tx: &Transaction, info: Arc<TableInfo>) -> Result<()> {
        let name = info.table_name.clone();
        if self.object_exists(&name) {
            return Err(Error::AlreadyExists { name });
        }
        self.tables.insert(name.clone(), info);
        tx.on_rollback(Box::new(move |cache| {
            cache.tables.remove(&name);
        }));
        Ok(())
    }

    pub fn replace_table(&mut self, tx: &Transaction, info: Arc<TableInfo>) -> Result<()> {
        let name = info.table_name.clone();
        if !self.tables.contains_key(&name) {
            return Err(Error::NotFound {
                kind: "table",
                name,
            });
        }
        let old = self.tables.insert(name.clone(), info).expect("presence checked");
        tx.on_rollback(Box::new(move |cache| {
            cache.tables.insert(name, old);
        }));
        Ok(())
    }

    pub fn delete_table(&mut self, tx: &Transaction, name: &str) -> Result<Arc<TableInfo>> {
        let old = self.tables.remove(name).ok_or(Error::NotFound {
            kind: "table",
            name: name.to_string(),
        })?;
        let name = name.to_string();
        let restored = old.clone();
        tx.on_rollback(Box::new(move |cache| {
            cache.tables.insert(name, restored);
        }));
        Ok(old)
    }

    pub fn add_index(&mut self, tx: &Transaction, info: Arc<IndexInfo>) -> Result<()> {
        let name = info.index_name.clone();
        if self.object_exists(&name) {
            return Err(Error::AlreadyExists { name });
        }
        self.indexes.insert(name.clone(), info);
        tx.on_rollback(Box::new(move |cache| {
            cache.indexes.remove(&name);
        }));
        Ok(())
    }

    pub fn delete_index(&mut self, tx: &Transaction, name: &str) -> Result<Arc<IndexInfo>> {
        let old = self.indexes.remove(name).ok_or(Error::NotFound {
            kind: "index",
            name: name.to_string(),
        })?;
        let name = name.to_string();
        let restored = old.clone();
        tx.on_rollback(Box::new(move |cache| {
            cache.indexes.insert(name, restored);
        }));
        Ok(old)
    }

    pub fn add_sequence(&mut self, tx: &Transaction, info: Arc<SequenceInfo>) -> Result<()> {
        let name = info.name.clone();
        if self.object_exists(&name) {
            return Err(Error::AlreadyExists { name });
        }
        self.sequences.insert(name.clone(), info);
        tx.on_rollback(Box::new(move |cache| {
            cache.sequences.remove(&name);
        }));
        Ok(())
    }

    pub fn delete_sequence(&mut self, tx: &Transaction, name: &str) -> Result<Arc<SequenceInfo>> {
        let old = self.sequences.remove(name).ok_or(Error::NotFound {
            kind: "sequence",
            name: name.to_string(),
        })?;
        let name = name.to_string();
        let restored = old.clone();
        tx.on_rollback(Box::new(move |cache| {
            cache.sequences.insert(name, restored);
        }));
        Ok(old)
    }

    /// Populate the cache while loading the persisted catalog at open
    /// time. No rollback hooks: this mirrors committed state.
    pub fn load_relation(&mut self, relation: super::store::Relation) {
        use super::store::Relation;
        match relation {
            Relation::Table(info) => {
                self.tables.insert(info.table_name.clone(), info);
            }
            Relation::Index(info) => {
                self.indexes.insert(info.index_name.clone(), info);
            }
            Relation::Sequence(info) => {
                self.sequences.insert(info.name.clone(), info);
            }
        }
    }
}
