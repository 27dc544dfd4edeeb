//! DDL statements: executed directly against the catalog.

use crate::database::Transaction;
use crate::error::Result;
use crate::index::IndexInfo;
use crate::schema::{FieldConstraint, TableConstraint};
use crate::sequence::SequenceInfo;
use crate::stream::{Operator, Stream};
use crate::table::TableInfo;
use crate::value::Path;

use super::run_stream;

#[derive(Debug, Clone, Default)]
pub struct CreateTableStmt {
    pub table_name: String,
    pub if_not_exists: bool,
    pub field_constraints: Vec<FieldConstraint>,
    pub table_constraints: Vec<TableConstraint>,
}

impl CreateTableStmt {
    pub fn new(table_name: impl Into<String>) -> CreateTableStmt {
        CreateTableStmt {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        let mut info = TableInfo::new(&self.table_name);
        info.field_constraints = self.field_constraints.clone();
        info.table_constraints = self.table_constraints.clone();

        match tx.catalog().create_table(tx, info) {
            Err(e) if e.is_already_exists() && self.if_not_exists => Ok(()),
            other => other.map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropTableStmt {
    pub table_name: String,
    pub if_exists: bool,
}

impl DropTableStmt {
    pub fn new(table_name: impl Into<String>) -> DropTableStmt {
        DropTableStmt {
            table_name: table_name.into(),
            if_exists: false,
        }
    }

    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        match tx.catalog().drop_table(tx, &self.table_name) {
            Err(e) if e.is_not_found() && self.if_exists => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlterTableRenameStmt {
    pub table_name: String,
    pub new_name: String,
}

impl AlterTableRenameStmt {
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        tx.catalog()
            .rename_table(tx, &self.table_name, &self.new_name)
    }
}

#[derive(Debug, Clone)]
pub struct AlterTableAddFieldStmt {
    pub table_name: String,
    pub field_constraint: Option<FieldConstraint>,
    pub table_constraints: Vec<TableConstraint>,
}

impl AlterTableAddFieldStmt {
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        tx.catalog().add_field_constraint(
            tx,
            &self.table_name,
            self.field_constraint.clone(),
            self.table_constraints.clone(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateIndexStmt {
    /// Empty means the catalog generates a name.
    pub index_name: String,
    pub table_name: String,
    pub paths: Vec<Path>,
    pub unique: bool,
    pub if_not_exists: bool,
}

impl CreateIndexStmt {
    /// Register the index, then backfill it from the table's current
    /// content.
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        let mut info = IndexInfo::new(&self.table_name, self.paths.clone(), self.unique);
        info.index_name = self.index_name.clone();

        let info = match tx.catalog().create_index(tx, info) {
            Err(e) if e.is_already_exists() && self.if_not_exists => return Ok(()),
            other => other?,
        };

        let build = Stream::new(Operator::table_scan(&self.table_name))
            .pipe(Operator::index_insert(&info.index_name));
        run_stream(&build, tx, |_| Ok(()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropIndexStmt {
    pub index_name: String,
    pub if_exists: bool,
}

impl DropIndexStmt {
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        match tx.catalog().drop_index(tx, &self.index_name) {
            Err(e) if e.is_not_found() && self.if_exists => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateSequenceStmt {
    pub info: SequenceInfo,
    pub if_not_exists: bool,
}

impl CreateSequenceStmt {
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        match tx.catalog().create_sequence(tx, self.info.clone()) {
            Err(e) if e.is_already_exists() && self.if_not_exists => Ok(()),
            other => other.map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropSequenceStmt {
    pub sequence_name: String,
    pub if_exists: bool,
}

impl DropSequenceStmt {
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        match tx.catalog().drop_sequence(tx, &self.sequence_name) {
            Err(e) if e.is_not_found() && self.if_exists => Ok(()),
            other => other,
        }
    }
}
