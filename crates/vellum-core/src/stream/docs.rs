//! Document-facing operators: emit, filter, project, skip and take.

use std::fmt;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::value::{Document, Value};

use super::env::Environment;
use super::table::missing_document;
use super::{iterate_ops, IterFn, Operator};

/// One projected column: either the wildcard or an expression with an
/// optional alias.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionExpr {
    Wildcard,
    Expr { expr: Expr, alias: Option<String> },
}

impl ProjectionExpr {
    pub fn expr(expr: Expr) -> ProjectionExpr {
        ProjectionExpr::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> ProjectionExpr {
        ProjectionExpr::Expr {
            expr,
            alias: Some(alias.into()),
        }
    }
}

impl fmt::Display for ProjectionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionExpr::Wildcard => f.write_str("*"),
            ProjectionExpr::Expr { expr, alias: None } => write!(f, "{expr}"),
            ProjectionExpr::Expr {
                expr,
                alias: Some(alias),
            } => write!(f, "{expr} AS {alias}"),
        }
    }
}

/// Source: emit one document per expression. Feeds INSERT pipelines.
pub(super) fn iterate_docs_emit(
    exprs: &[Expr],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let mut new_env = Environment::wrap(env);
    for e in exprs {
        match e.eval(env)? {
            Value::Document(doc) => {
                new_env.set_document(doc);
                f(&new_env)?;
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "values must be documents, got {other}"
                )))
            }
        }
    }
    Ok(())
}

/// Skip rows whose filter expression evaluates falsy.
pub(super) fn iterate_docs_filter(
    expr: &Expr,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    iterate_ops(prev, env, &mut |out| {
        if expr.eval(out)?.is_truthy() {
            f(out)
        } else {
            Ok(())
        }
    })
}

/// Replace the current document with one built from the projections.
pub(super) fn iterate_docs_project(
    exprs: &[ProjectionExpr],
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    iterate_ops(prev, env, &mut |out| {
        let mut doc = Document::new();
        for pe in exprs {
            match pe {
                ProjectionExpr::Wildcard => {
                    let cur = out.document().ok_or_else(missing_document)?;
                    for (name, value) in cur.iter() {
                        doc.set(name.clone(), value.clone());
                    }
                }
                ProjectionExpr::Expr { expr, alias } => {
                    let name = alias.clone().unwrap_or_else(|| expr.to_string());
                    doc.set(name, expr.eval(out)?);
                }
            }
        }

        let mut new_env = Environment::wrap(out);
        new_env.set_document(doc);
        f(&new_env)
    })
}

/// OFFSET: drop the first `n` rows. The count expression is evaluated
/// once, at the start of iteration.
pub(super) fn iterate_docs_skip(
    expr: &Expr,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let n = eval_count(expr, env)?;
    let mut skipped: i64 = 0;

    iterate_ops(prev, env, &mut |out| {
        if skipped < n {
            skipped += 1;
            Ok(())
        } else {
            f(out)
        }
    })
}

/// LIMIT: pass the first `n` rows, then close the stream cooperatively.
pub(super) fn iterate_docs_take(
    expr: &Expr,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let n = eval_count(expr, env)?;
    let mut taken: i64 = 0;

    iterate_ops(prev, env, &mut |out| {
        if taken < n {
            taken += 1;
            f(out)
        } else {
            Err(Error::StreamClosed)
        }
    })
}

fn eval_count(expr: &Expr, env: &Environment<'_>) -> Result<i64> {
    match expr.eval(env)? {
        Value::Integer(n) => Ok(n),
        other => Err(Error::InvalidArgument(format!(
            "expected an integer, got {other}"
        ))),
    }
}
