//! UPDATE ... SET | UNSET [WHERE].

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::stream::{Operator, Stream};
use crate::value::Path;

#[derive(Debug, Clone, Default)]
pub struct UpdateStmt {
    pub table_name: String,
    /// SET clause: each path with the expression whose value it takes.
    pub set_pairs: Vec<(Path, Expr)>,
    /// UNSET clause: top-level fields to remove.
    pub unset_fields: Vec<String>,
    pub where_expr: Option<Expr>,
}

impl UpdateStmt {
    pub fn plan(&self, tx: &Transaction) -> Result<Stream> {
        let info = tx.catalog().get_table_info(&self.table_name)?;
        let pk = info.primary_key();

        let mut s = Stream::new(Operator::table_scan(&self.table_name));

        if let Some(w) = &self.where_expr {
            s = s.pipe(Operator::docs_filter(w.clone()));
        }

        // Modifying a primary-key path means the storage key changes: the
        // old document must be deleted and a new one inserted.
        let mut pk_modified = false;
        if !self.set_pairs.is_empty() {
            for (path, expr) in &self.set_pairs {
                if let Some(pk) = pk {
                    if !pk_modified && pk.paths.iter().any(|p| p == path) {
                        pk_modified = true;
                    }
                }
                s = s.pipe(Operator::paths_set(path.clone(), expr.clone()));
            }
        } else if !self.unset_fields.is_empty() {
            for name in &self.unset_fields {
                if let Some(pk) = pk {
                    let path = Path::field(name.clone());
                    if pk.paths.iter().any(|p| *p == path) {
                        return Err(Error::InvalidArgument(
                            "cannot unset primary key path".to_string(),
                        ));
                    }
                }
                s = s.pipe(Operator::paths_unset(name.clone()));
            }
        }

        s = s.pipe(Operator::table_validate(&self.table_name));

        // TODO: this removes and reinserts every index entry for each
        // document even when the update touched a single unindexed field.
        let index_names = tx.catalog().list_indexes(Some(&self.table_name));
        for index_name in &index_names {
            s = s.pipe(Operator::index_delete(index_name.clone()));
        }

        if pk_modified {
            s = s.pipe(Operator::table_delete(&self.table_name));
            s = s.pipe(Operator::table_insert(&self.table_name));
        } else {
            s = s.pipe(Operator::table_replace(&self.table_name));
        }

        for index_name in &index_names {
            s = s.pipe(Operator::index_insert(index_name.clone()));
        }

        Ok(s)
    }
}
