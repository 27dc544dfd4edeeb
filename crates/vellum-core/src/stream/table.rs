//! Table-facing operators: scan, validate, and the terminal mutation
//! sinks.

use crate::error::{Error, Result};
use crate::tree::EncodedRange;
use crate::value::Value;

use super::env::{Environment, DOC_PK_KEY, TABLE_KEY};
use super::range::Range;
use super::{iterate_ops, IterFn, Operator};

/// Source: iterate the documents of a table over zero or more ranges.
pub(super) fn iterate_table_scan(
    table_name: &str,
    ranges: &[Range],
    reverse: bool,
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let table = tx.catalog().get_table(tx, table_name)?;

    let mut new_env = Environment::wrap(env);
    new_env.set_var(TABLE_KEY, Value::Text(table_name.to_string()));

    let encoded = eval_ranges(ranges, env)?;

    for range in &encoded {
        let res = table.iterate_on_range(range.as_ref(), reverse, |key, doc| {
            tx.check_interrupted()?;
            new_env.set_var(DOC_PK_KEY, Value::Blob(key.to_vec()));
            new_env.set_document(doc);
            f(&new_env)
        });
        match res {
            // The consumer closed the stream: stop this range, let the
            // remaining ranges observe the same signal through f.
            Err(e) if e.is_stream_closed() => continue,
            other => other?,
        }
    }

    Ok(())
}

/// Evaluate planner ranges into byte ranges; no ranges means one
/// unbounded scan.
pub(super) fn eval_ranges(
    ranges: &[Range],
    env: &Environment<'_>,
) -> Result<Vec<Option<EncodedRange>>> {
    if ranges.is_empty() {
        return Ok(vec![None]);
    }
    ranges.iter().map(|r| r.eval(env).map(Some)).collect()
}

/// Validate and coerce incoming documents against the table's
/// constraints.
pub(super) fn iterate_table_validate(
    table_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let info = tx.catalog().get_table_info(table_name)?;

    iterate_ops(prev, env, &mut |out| {
        let doc = out.document().ok_or_else(missing_document)?;
        let validated = info.validate_document(doc)?;

        let mut new_env = Environment::wrap(out);
        new_env.set_document(validated);
        f(&new_env)
    })
}

/// Terminal sink: insert incoming documents, publishing the new key under
/// `DOC_PK_KEY`.
pub(super) fn iterate_table_insert(
    table_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let table = tx.catalog().get_table(tx, table_name)?;

    iterate_ops(prev, env, &mut |out| {
        let doc = out.document().ok_or_else(missing_document)?;
        let (key, stored) = table.insert(doc)?;

        let mut new_env = Environment::wrap(out);
        new_env.set_var(TABLE_KEY, Value::Text(table_name.to_string()));
        new_env.set_var(DOC_PK_KEY, Value::Blob(key));
        new_env.set_document(stored);
        f(&new_env)
    })
}

/// Terminal sink: replace the document stored under the current key.
pub(super) fn iterate_table_replace(
    table_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let table = tx.catalog().get_table(tx, table_name)?;

    iterate_ops(prev, env, &mut |out| {
        let doc = out.document().ok_or_else(missing_document)?;
        let key = current_key(out)?;
        table.replace(&key, doc)?;
        f(out)
    })
}

/// Terminal sink: delete the document stored under the current key.
pub(super) fn iterate_table_delete(
    table_name: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let tx = env.tx()?;
    let table = tx.catalog().get_table(tx, table_name)?;

    iterate_ops(prev, env, &mut |out| {
        let key = current_key(out)?;
        table.delete(&key)?;
        f(out)
    })
}

pub(super) fn current_key(env: &Environment<'_>) -> Result<Vec<u8>> {
    match env.get_var(DOC_PK_KEY) {
        Some(Value::Blob(key)) => Ok(key.clone()),
        _ => Err(Error::InvalidArgument("missing key".to_string())),
    }
}

pub(super) fn missing_document() -> Error {
    Error::InvalidArgument("missing document".to_string())
}
