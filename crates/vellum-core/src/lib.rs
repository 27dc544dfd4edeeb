//! # VellumDB
//!
//! An embeddable document-oriented database with a SQL-like statement
//! surface. Schemaless or partially-typed documents live in named tables,
//! persisted on an ordered key-value store through namespaced keyspaces
//! and snapshot-isolated batches. Reads and writes flow through pull-based
//! operator pipelines; an optimizer rewrites filter pipelines into index
//! or primary-key range scans.
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use vellum_core::{Database, Statement};
//! use vellum_core::query::{CreateTableStmt, InsertStmt, SelectStmt};
//!
//! let db = Database::new().unwrap();
//!
//! db.execute(Statement::CreateTable(CreateTableStmt::new("users")))
//!     .unwrap();
//!
//! db.execute(Statement::Insert(InsertStmt::from_json(
//!     "users",
//!     vec![json!({"name": "Alice", "age": 30})],
//! )))
//! .unwrap();
//!
//! let result = db
//!     .execute(Statement::Select(SelectStmt::all("users")))
//!     .unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```

pub mod catalog;
pub mod database;
pub mod encoding;
pub mod error;
pub mod expr;
pub mod index;
pub mod kv;
pub mod planner;
pub mod query;
pub mod schema;
pub mod sequence;
pub mod stream;
pub mod table;
pub mod tree;
pub mod value;

pub use database::{Database, Transaction};
pub use error::{Error, Result};
pub use query::{QueryResult, Statement};
pub use value::{Document, Path, Value};
