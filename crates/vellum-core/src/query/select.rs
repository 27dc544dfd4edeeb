//! SELECT ... FROM ... [WHERE] [ORDER BY] [LIMIT] [OFFSET].

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::planner;
use crate::stream::{Operator, ProjectionExpr, Stream};
use crate::value::{Document, Path, Value};

use super::{run_stream, QueryResult};

#[derive(Debug, Clone)]
pub enum Projection {
    /// `SELECT *`.
    All,
    /// `SELECT COUNT(*)`: the executor counts produced rows.
    CountStar,
    Exprs(Vec<ProjectionExpr>),
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub table_name: String,
    pub projection: Projection,
    pub where_expr: Option<Expr>,
    pub order_by: Option<Path>,
    pub order_desc: bool,
    pub offset: Option<Expr>,
    pub limit: Option<Expr>,
}

impl SelectStmt {
    /// `SELECT * FROM <table>`.
    pub fn all(table_name: impl Into<String>) -> SelectStmt {
        SelectStmt {
            table_name: table_name.into(),
            projection: Projection::All,
            where_expr: None,
            order_by: None,
            order_desc: false,
            offset: None,
            limit: None,
        }
    }

    /// `SELECT COUNT(*) FROM <table>`.
    pub fn count(table_name: impl Into<String>) -> SelectStmt {
        SelectStmt {
            projection: Projection::CountStar,
            ..SelectStmt::all(table_name)
        }
    }

    pub fn plan(&self) -> Stream {
        let mut s = Stream::new(Operator::table_scan(&self.table_name));

        if let Some(w) = &self.where_expr {
            s = s.pipe(Operator::docs_filter(w.clone()));
        }
        if let Some(p) = &self.order_by {
            let sort_expr = Expr::Path(p.clone());
            s = s.pipe(if self.order_desc {
                Operator::temp_tree_sort_reverse(sort_expr)
            } else {
                Operator::temp_tree_sort(sort_expr)
            });
        }
        if let Some(o) = &self.offset {
            s = s.pipe(Operator::docs_skip(o.clone()));
        }
        if let Some(l) = &self.limit {
            s = s.pipe(Operator::docs_take(l.clone()));
        }
        if let Projection::Exprs(exprs) = &self.projection {
            s = s.pipe(Operator::docs_project(exprs.clone()));
        }

        s
    }

    pub fn execute(&self, tx: &Transaction) -> Result<QueryResult> {
        let stream = planner::optimize(self.plan(), tx.catalog())?;

        let count_only = matches!(self.projection, Projection::CountStar);
        let mut rows = Vec::new();
        let mut count: i64 = 0;

        run_stream(&stream, tx, |env| {
            count += 1;
            if !count_only {
                let doc = env
                    .document()
                    .cloned()
                    .ok_or_else(|| Error::InvalidArgument("missing document".to_string()))?;
                rows.push(doc);
            }
            Ok(())
        })?;

        if count_only {
            let mut doc = Document::new();
            doc.set("COUNT(*)".to_string(), Value::Integer(count));
            rows.push(doc);
        }

        Ok(QueryResult { rows })
    }
}
