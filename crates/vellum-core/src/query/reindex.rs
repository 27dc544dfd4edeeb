//! REINDEX: rebuild index content from the owning tables.

use tracing::debug;

use crate::database::Transaction;
use crate::error::Result;
use crate::planner;
use crate::stream::{Operator, Stream};

use super::run_stream;

#[derive(Debug, Clone, Default)]
pub struct ReindexStmt {
    /// A table name (reindex all its indexes), an index name, or `None`
    /// to reindex everything.
    pub target: Option<String>,
}

impl ReindexStmt {
    pub fn plan(&self, tx: &Transaction) -> Result<Stream> {
        let catalog = tx.catalog();

        let index_names = match &self.target {
            None => catalog.list_indexes(None),
            Some(name) => match catalog.get_table_info(name) {
                Ok(_) => catalog.list_indexes(Some(name)),
                Err(e) if e.is_not_found() => vec![name.clone()],
                Err(e) => return Err(e),
            },
        };

        let mut streams = Vec::with_capacity(index_names.len());
        for index_name in index_names {
            let index = catalog.get_index(tx, &index_name)?;
            index.truncate()?;

            streams.push(
                Stream::new(Operator::table_scan(index.info.table_name.clone()))
                    .pipe(Operator::index_insert(index_name)),
            );
        }

        Ok(Stream::new(Operator::concat(streams)))
    }

    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        let stream = planner::optimize(self.plan(tx)?, tx.catalog())?;
        run_stream(&stream, tx, |_| Ok(()))?;
        debug!(target = ?self.target, "reindex complete");
        Ok(())
    }
}
