//! INSERT INTO ... VALUES.

use crate::database::Transaction;
use crate::error::Result;
use crate::expr::Expr;
use crate::planner;
use crate::stream::{Operator, Stream};
use crate::value::Value;

use super::{run_stream, QueryResult};

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table_name: String,
    /// One expression per row; each must evaluate to a document.
    pub values: Vec<Expr>,
}

impl InsertStmt {
    pub fn new(table_name: impl Into<String>, values: Vec<Expr>) -> InsertStmt {
        InsertStmt {
            table_name: table_name.into(),
            values,
        }
    }

    /// Build an INSERT from JSON documents, the way embedders usually
    /// call it.
    pub fn from_json(
        table_name: impl Into<String>,
        docs: impl IntoIterator<Item = serde_json::Value>,
    ) -> InsertStmt {
        InsertStmt {
            table_name: table_name.into(),
            values: docs
                .into_iter()
                .map(|j| Expr::Literal(Value::from_json(&j)))
                .collect(),
        }
    }

    pub fn plan(&self) -> Stream {
        Stream::new(Operator::docs_emit(self.values.clone()))
            .pipe(Operator::table_validate(&self.table_name))
            .pipe(Operator::table_insert(&self.table_name))
    }

    pub fn execute(&self, tx: &Transaction) -> Result<QueryResult> {
        let stream = planner::optimize(self.plan(), tx.catalog())?;
        run_stream(&stream, tx, |_| Ok(()))?;
        Ok(QueryResult::default())
    }
}
