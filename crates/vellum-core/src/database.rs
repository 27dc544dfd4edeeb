//! The database handle and its transactions.
//!
//! One writer at a time performs all work; a transaction wraps a KV
//! session (snapshot plus ordered batch) and carries the rollback hooks
//! registered by catalog mutations. Commit publishes the batch and forgets
//! the hooks; abort discards the batch and replays the hooks in reverse.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::catalog::cache::RollbackHook;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::kv::{MemoryEngine, Session};
use crate::query::{self, QueryResult, Statement};

/// An embeddable document database over an ordered key-value engine.
///
/// The handle is cheaply clonable and shares one catalog cache; write
/// transactions are serialized through an internal writer lock.
#[derive(Clone)]
pub struct Database {
    engine: MemoryEngine,
    catalog: Arc<Catalog>,
    /// Serializes write transactions (single-writer model).
    writer_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Create a fresh in-memory database.
    pub fn new() -> Result<Database> {
        Database::with_engine(MemoryEngine::new())
    }

    /// Open a database over an existing engine, loading the persisted
    /// catalog.
    pub fn with_engine(engine: MemoryEngine) -> Result<Database> {
        let db = Database {
            engine,
            catalog: Arc::new(Catalog::new()),
            writer_lock: Arc::new(Mutex::new(())),
        };

        let tx = db.begin(true)?;
        db.catalog.load(&tx)?;
        db.catalog.init(&tx)?;
        tx.commit()?;

        Ok(db)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Begin a transaction. Writable transactions wrap an indexed batch;
    /// read-only transactions wrap a snapshot and refuse every write.
    pub fn begin(&self, writable: bool) -> Result<Transaction> {
        Ok(Transaction {
            session: Session::new(self.engine.clone(), !writable),
            catalog: self.catalog.clone(),
            writable,
            rollback_hooks: RefCell::new(Vec::new()),
            interrupted: Arc::new(AtomicBool::new(false)),
            committed: Cell::new(false),
        })
    }

    /// Execute one statement in its own transaction, committing on
    /// success and rolling back on error.
    pub fn execute(&self, stmt: Statement) -> Result<QueryResult> {
        let _writer = if stmt.is_read_only() {
            None
        } else {
            Some(self.writer_lock.lock())
        };

        let tx = self.begin(!stmt.is_read_only())?;
        let result = query::execute(&stmt, &tx)?;
        tx.commit()?;
        Ok(result)
    }
}

/// A unit of work over the database.
///
/// Dropping a transaction without committing rolls it back: the pending
/// batch is discarded and the rollback hooks run in LIFO order against
/// the catalog cache.
pub struct Transaction {
    session: Session,
    catalog: Arc<Catalog>,
    writable: bool,
    rollback_hooks: RefCell<Vec<RollbackHook>>,
    interrupted: Arc<AtomicBool>,
    committed: Cell<bool>,
}

impl Transaction {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Register a compensating action run if this transaction aborts.
    pub(crate) fn on_rollback(&self, hook: RollbackHook) {
        self.rollback_hooks.borrow_mut().push(hook);
    }

    /// A flag the embedder can set from another thread to interrupt long
    /// iterations; scans check it between rows.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.load(Ordering::Relaxed) {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Flush the batch and forget the rollback hooks.
    pub fn commit(self) -> Result<()> {
        self.session.commit()?;
        self.rollback_hooks.borrow_mut().clear();
        self.committed.set(true);
        trace!("transaction committed");
        Ok(())
    }

    /// Abort explicitly. Equivalent to dropping the transaction.
    pub fn rollback(self) {
        drop(self);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.committed.get() {
            return;
        }

        self.session.discard();

        let hooks: Vec<RollbackHook> = self.rollback_hooks.borrow_mut().drain(..).collect();
        if hooks.is_empty() {
            return;
        }

        trace!(hooks = hooks.len(), "transaction rolled back");
        let mut cache = self.catalog.cache_mut();
        for hook in hooks.into_iter().rev() {
            hook(&mut cache);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::FIRST_USER_NAMESPACE;
    use crate::query::{CreateTableStmt, InsertStmt, SelectStmt, Statement};
    use crate::table::TableInfo;
    use serde_json::json;

    #[test]
    fn test_rollback_restores_catalog_and_namespace_allocation() {
        let db = Database::new().unwrap();

        let tx = db.begin(true).unwrap();
        db.catalog()
            .create_table(&tx, TableInfo::new("t"))
            .unwrap();
        assert!(db.catalog().get_table_info("t").is_ok());
        tx.rollback();

        // The cache entry is gone, along with the implicit docid
        // sequence.
        assert!(db.catalog().get_table_info("t").is_err());
        assert!(db.catalog().get_sequence("t_seq").is_err());

        // The namespace allocation rolled back too: re-creating the table
        // hands out the first user namespace again.
        let tx = db.begin(true).unwrap();
        let info = db.catalog().create_table(&tx, TableInfo::new("t")).unwrap();
        assert_eq!(info.store_namespace, FIRST_USER_NAMESPACE);
        tx.commit().unwrap();
    }

    #[test]
    fn test_rollback_discards_data_writes() {
        let db = Database::new().unwrap();
        db.execute(Statement::CreateTable(CreateTableStmt::new("t")))
            .unwrap();

        let tx = db.begin(true).unwrap();
        crate::query::execute(
            &Statement::Insert(InsertStmt::from_json("t", vec![json!({"a": 1})])),
            &tx,
        )
        .unwrap();
        tx.rollback();

        let result = db.execute(Statement::Select(SelectStmt::count("t"))).unwrap();
        assert_eq!(result.to_json(), vec![json!({"COUNT(*)": 0})]);
    }

    #[test]
    fn test_commit_survives_reopen() {
        let engine = crate::kv::MemoryEngine::new();
        {
            let db = Database::with_engine(engine.clone()).unwrap();
            db.execute(Statement::CreateTable(CreateTableStmt::new("t")))
                .unwrap();
            db.execute(Statement::Insert(InsertStmt::from_json(
                "t",
                vec![json!({"a": 1})],
            )))
            .unwrap();
        }

        let db = Database::with_engine(engine).unwrap();
        assert!(db.catalog().get_table_info("t").is_ok());
        let result = db.execute(Statement::Select(SelectStmt::count("t"))).unwrap();
        assert_eq!(result.to_json(), vec![json!({"COUNT(*)": 1})]);
    }

    #[test]
    fn test_read_only_transaction_refuses_writes() {
        let db = Database::new().unwrap();
        db.execute(Statement::CreateTable(CreateTableStmt::new("t")))
            .unwrap();

        let tx = db.begin(false).unwrap();
        let err = crate::query::execute(
            &Statement::Insert(InsertStmt::from_json("t", vec![json!({"a": 1})])),
            &tx,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ReadOnly));

        // Reads still work.
        let result =
            crate::query::execute(&Statement::Select(SelectStmt::count("t")), &tx).unwrap();
        assert_eq!(result.to_json(), vec![json!({"COUNT(*)": 0})]);
    }

    #[test]
    fn test_interrupt_aborts_scan() {
        let db = Database::new().unwrap();
        db.execute(Statement::CreateTable(CreateTableStmt::new("t")))
            .unwrap();
        db.execute(Statement::Insert(InsertStmt::from_json(
            "t",
            (0..10).map(|i| json!({"a": i})).collect::<Vec<_>>(),
        )))
        .unwrap();

        let tx = db.begin(false).unwrap();
        tx.interrupt_handle()
            .store(true, std::sync::atomic::Ordering::Relaxed);
        let err = crate::query::execute(&Statement::Select(SelectStmt::all("t")), &tx)
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }
}
