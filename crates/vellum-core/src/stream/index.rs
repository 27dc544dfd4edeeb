//! Index-facing operators: scan (dereferencing primary keys) and entry
//! maintenance.

use crate::error::{Error, Result};
use crate::value::Value;

use super::env::{Environment, DOC_PK_KEY, TABLE_KEY};
use super::range::Range;
use super::table::{current_key, eval_ranges, missing_document};
use super::{iterate_ops, IterFn, Operator};

/// Source: iterate an index over zero or more ranges, dereferencing each
/// entry's primary key from the owning table.
pub(super) fn iterate_index_scan(
    index_name: &str,
    ranges: &[Range],
    reverse: bool,
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let index = tx.catalog().get_index(tx, index_name)?;
    let table = tx.catalog().get_table(tx, &index.info.table_name)?;

    let mut new_env = Environment::wrap(env);
    new_env.set_var(TABLE_KEY, Value::Text(index.info.table_name.clone()));

    let encoded = eval_ranges(ranges, env)?;

    for range in &encoded {
        let res = index.iterate_on_range(range.as_ref(), reverse, |pk| {
            tx.check_interrupted()?;
            let doc = table.get(pk)?;
            new_env.set_var(DOC_PK_KEY, Value::Blob(pk.to_vec()));
            new_env.set_document(doc);
            f(&new_env)
        });
        match res {
            Err(e) if e.is_stream_closed() => continue,
            other => other?,
        }
    }

    Ok(())
}

/// Maintain the named index for the current document: insert its entry.
pub(super) fn iterate_index_insert(
    index_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let index = tx.catalog().get_index(tx, index_name)?;

    iterate_ops(prev, env, &mut |out| {
        let doc = out.document().ok_or_else(missing_document)?;
        let key = current_key(out)?;
        let values = index.values_from_document(doc);
        index.set(&values, &key)?;
        f(out)
    })
}

/// Maintain the named index for the current document: remove its entry.
///
/// The entry is derived from the row as stored, not from the in-flight
/// document: UPDATE pipelines mutate the document before the delete runs,
/// and the entry to remove is the one the old values produced.
pub(super) fn iterate_index_delete(
    index_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let index = tx.catalog().get_index(tx, index_name)?;
    let table = tx.catalog().get_table(tx, &index.info.table_name)?;

    iterate_ops(prev, env, &mut |out| {
        let key = current_key(out)?;
        let stored = match table.get(&key) {
            Ok(doc) => doc,
            Err(Error::KeyNotFound) => {
                out.document().cloned().ok_or_else(missing_document)?
            }
            Err(e) => return Err(e),
        };
        let values = index.values_from_document(&stored);
        index.delete(&values, &key)?;
        f(out)
    })
}
