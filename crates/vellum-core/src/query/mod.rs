//! Statement execution.
//!
//! Statements are the shape an external SQL parser lowers into: plain
//! structs carrying names, expressions and constraints. DDL statements run
//! directly against the catalog; DML statements lower to pipelines, pass
//! through the optimizer, then drive the stream to completion.

pub mod ddl;
pub mod delete;
pub mod insert;
pub mod reindex;
pub mod select;
pub mod update;

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::planner;
use crate::stream::{Environment, Stream};
use crate::value::Document;

pub use ddl::{
    AlterTableAddFieldStmt, AlterTableRenameStmt, CreateIndexStmt, CreateSequenceStmt,
    CreateTableStmt, DropIndexStmt, DropSequenceStmt, DropTableStmt,
};
pub use delete::DeleteStmt;
pub use insert::InsertStmt;
pub use reindex::ReindexStmt;
pub use select::{Projection, SelectStmt};
pub use update::UpdateStmt;

/// A parsed statement, ready to prepare and run.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    AlterTableRename(AlterTableRenameStmt),
    AlterTableAddField(AlterTableAddFieldStmt),
    CreateIndex(CreateIndexStmt),
    DropIndex(DropIndexStmt),
    CreateSequence(CreateSequenceStmt),
    DropSequence(DropSequenceStmt),
    Insert(InsertStmt),
    Select(SelectStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    Reindex(ReindexStmt),
}

impl Statement {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Statement::Select(_))
    }
}

/// Rows produced by a statement. Only SELECT fills them.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub rows: Vec<Document>,
}

impl QueryResult {
    /// Render the rows as JSON, for embedders and tests.
    pub fn to_json(&self) -> Vec<serde_json::Value> {
        self.rows.iter().map(|d| d.to_json()).collect()
    }
}

/// Execute one statement within the given transaction.
pub fn execute(stmt: &Statement, tx: &Transaction) -> Result<QueryResult> {
    if !stmt.is_read_only() && !tx.writable() {
        return Err(Error::ReadOnly);
    }

    match stmt {
        Statement::CreateTable(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::DropTable(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::AlterTableRename(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::AlterTableAddField(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::CreateIndex(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::DropIndex(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::CreateSequence(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::DropSequence(s) => s.execute(tx).map(|_| QueryResult::default()),
        Statement::Insert(s) => s.execute(tx),
        Statement::Select(s) => s.execute(tx),
        Statement::Update(s) => {
            let stream = planner::optimize(s.plan(tx)?, tx.catalog())?;
            run_stream(&stream, tx, |_| Ok(()))?;
            Ok(QueryResult::default())
        }
        Statement::Delete(s) => {
            let stream = planner::optimize(s.plan(tx)?, tx.catalog())?;
            run_stream(&stream, tx, |_| Ok(()))?;
            Ok(QueryResult::default())
        }
        Statement::Reindex(s) => s.execute(tx).map(|_| QueryResult::default()),
    }
}

/// Drive a pipeline to completion, handing each produced row to
/// `collect`. A cooperative stream-closed signal reaching the top is
/// normal completion.
pub(crate) fn run_stream(
    stream: &Stream,
    tx: &Transaction,
    mut collect: impl FnMut(&Environment<'_>) -> Result<()>,
) -> Result<()> {
    let root = Environment::root(tx);
    match stream.iterate(&root, &mut collect) {
        Err(e) if e.is_stream_closed() => Ok(()),
        other => other,
    }
}
