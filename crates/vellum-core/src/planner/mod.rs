//! Algebraic rewrites over pipelines.
//!
//! The optimizer runs a fixed rule sequence on every DML pipeline before
//! execution: split top-level ANDs into adjacent filters, fold constant
//! sub-expressions, drop vacuous filters (a constant falsy filter empties
//! the whole stream), then try to replace the table scan with an index or
//! primary-key scan. `concat` and `union` operand streams are optimized
//! recursively.

pub mod index_selection;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::expr::{BinaryOp, Expr};
use crate::stream::{Environment, Operator, Stream};
use crate::value::Value;

/// Run the full rule sequence over a stream.
pub fn optimize(stream: Stream, catalog: &Catalog) -> Result<Stream> {
    let mut stream = stream;

    // Operand streams of concat/union first.
    for op in &mut stream.ops {
        if let Some(subs) = op.substreams_mut() {
            let owned = std::mem::take(subs);
            *subs = owned
                .into_iter()
                .map(|s| optimize(s, catalog))
                .collect::<Result<Vec<_>>>()?;
        }
    }

    let stream = split_and_rule(stream);
    let stream = precalculate_exprs_rule(stream);
    let stream = remove_unnecessary_filter_nodes_rule(stream);
    if stream.is_empty() {
        return Ok(stream);
    }

    index_selection::select_index(stream, catalog)
}

/// Split every filter over a top-level AND into adjacent filters, so each
/// conjunct can be matched to an index path independently.
pub fn split_and_rule(stream: Stream) -> Stream {
    let mut ops = Vec::with_capacity(stream.ops.len());
    for op in stream.ops {
        match op {
            Operator::DocsFilter { expr } => split_and(expr, &mut ops),
            other => ops.push(other),
        }
    }
    Stream { ops }
}

fn split_and(expr: Expr, out: &mut Vec<Operator>) {
    match expr {
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            split_and(*left, out);
            split_and(*right, out);
        }
        e => out.push(Operator::docs_filter(e)),
    }
}

/// Fold constant sub-expressions in filters and row-count expressions.
pub fn precalculate_exprs_rule(stream: Stream) -> Stream {
    let ops = stream
        .ops
        .into_iter()
        .map(|op| match op {
            Operator::DocsFilter { expr } => Operator::docs_filter(expr.fold()),
            Operator::DocsSkip { expr } => Operator::docs_skip(expr.fold()),
            Operator::DocsTake { expr } => Operator::docs_take(expr.fold()),
            other => other,
        })
        .collect();
    Stream { ops }
}

/// Drop filters whose expression is a constant truthy value; a constant
/// falsy filter replaces the whole stream with an empty one.
pub fn remove_unnecessary_filter_nodes_rule(stream: Stream) -> Stream {
    let mut ops = Vec::with_capacity(stream.ops.len());
    for op in stream.ops {
        match &op {
            Operator::DocsFilter { expr } => match constant_truthiness(expr) {
                Some(true) => continue,
                Some(false) => return Stream::empty(),
                None => ops.push(op),
            },
            _ => ops.push(op),
        }
    }
    Stream { ops }
}

/// The truth value of a filter expression that never depends on a row,
/// when decidable.
fn constant_truthiness(expr: &Expr) -> Option<bool> {
    // `x IN []` is false for every row, even though x is a path.
    if let Expr::Binary {
        op: BinaryOp::In,
        right,
        ..
    } = expr
    {
        let empty = match &**right {
            Expr::List(items) => items.is_empty(),
            Expr::Literal(Value::Array(items)) => items.is_empty(),
            _ => false,
        };
        if empty {
            return Some(false);
        }
    }

    if !expr.is_constant() {
        return None;
    }
    expr.eval(&Environment::default())
        .ok()
        .map(|v| v.is_truthy())
}
