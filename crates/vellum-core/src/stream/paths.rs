//! Path mutation operators used by UPDATE pipelines.

use crate::error::Result;
use crate::expr::Expr;
use crate::value::Path;

use super::env::Environment;
use super::table::missing_document;
use super::{iterate_ops, IterFn, Operator};

/// Set `path` to the value of `expr` in the current document.
pub(super) fn iterate_paths_set(
    path: &Path,
    expr: &Expr,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    iterate_ops(prev, env, &mut |out| {
        let value = expr.eval(out)?;
        let mut doc = out.document().ok_or_else(missing_document)?.clone();
        path.set_in_document(&mut doc, value)?;

        let mut new_env = Environment::wrap(out);
        new_env.set_document(doc);
        f(&new_env)
    })
}

/// Remove a top-level field from the current document. Rows without the
/// field pass through unchanged.
pub(super) fn iterate_paths_unset(
    field: &str,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    iterate_ops(prev, env, &mut |out| {
        let mut doc = out.document().ok_or_else(missing_document)?.clone();
        doc.remove(field);

        let mut new_env = Environment::wrap(out);
        new_env.set_document(doc);
        f(&new_env)
    })
}
