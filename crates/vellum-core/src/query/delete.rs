//! DELETE FROM ... [WHERE] [ORDER BY] [LIMIT] [OFFSET].

use crate::database::Transaction;
use crate::error::Result;
use crate::expr::Expr;
use crate::stream::{Operator, Stream};
use crate::value::Path;

#[derive(Debug, Clone, Default)]
pub struct DeleteStmt {
    pub table_name: String,
    pub where_expr: Option<Expr>,
    pub order_by: Option<Path>,
    pub order_desc: bool,
    pub offset: Option<Expr>,
    pub limit: Option<Expr>,
}

impl DeleteStmt {
    pub fn new(table_name: impl Into<String>) -> DeleteStmt {
        DeleteStmt {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn plan(&self, tx: &Transaction) -> Result<Stream> {
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

        for index_name in tx.catalog().list_indexes(Some(&self.table_name)) {
            s = s.pipe(Operator::index_delete(index_name));
        }

        s = s.pipe(Operator::table_delete(&self.table_name));

        Ok(s)
    }
}
