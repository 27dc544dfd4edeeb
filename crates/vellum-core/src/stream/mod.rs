//! Pull-based streams of document operators.
//!
//! A stream is a pipeline of operators rooted at a source (a scan or an
//! emit). Iteration is driven from the sink upward: each operator pulls
//! from its predecessors and pushes rows into the consumer callback. The
//! canonical `Display` rendering of a stream is a stable contract the
//! planner tests compare against.

pub mod combine;
pub mod docs;
pub mod env;
pub mod index;
pub mod paths;
pub mod range;
pub mod sort;
pub mod table;

use std::fmt;

use crate::error::Result;
use crate::expr::Expr;
use crate::value::Path;

pub use docs::ProjectionExpr;
pub use env::Environment;
pub use range::Range;

/// The row consumer threaded through a pipeline.
pub type IterFn<'a> = &'a mut dyn FnMut(&Environment<'_>) -> Result<()>;

/// One pipeline operator. The head of a stream is a source; every other
/// operator transforms the rows of its predecessors.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    TableScan {
        table_name: String,
        ranges: Vec<Range>,
        reverse: bool,
    },
    IndexScan {
        index_name: String,
        ranges: Vec<Range>,
        reverse: bool,
    },
    DocsEmit {
        exprs: Vec<Expr>,
    },
    DocsFilter {
        expr: Expr,
    },
    DocsProject {
        exprs: Vec<ProjectionExpr>,
    },
    DocsSkip {
        expr: Expr,
    },
    DocsTake {
        expr: Expr,
    },
    DocsTempTreeSort {
        expr: Expr,
        reverse: bool,
    },
    PathsSet {
        path: Path,
        expr: Expr,
    },
    PathsUnset {
        field: String,
    },
    TableValidate {
        table_name: String,
    },
    TableInsert {
        table_name: String,
    },
    TableReplace {
        table_name: String,
    },
    TableDelete {
        table_name: String,
    },
    IndexInsert {
        index_name: String,
    },
    IndexDelete {
        index_name: String,
    },
    Concat {
        streams: Vec<Stream>,
    },
    Union {
        streams: Vec<Stream>,
    },
}

impl Operator {
    pub fn table_scan(table_name: impl Into<String>) -> Operator {
        Operator::TableScan {
            table_name: table_name.into(),
            ranges: Vec::new(),
            reverse: false,
        }
    }

    pub fn table_scan_ranges(table_name: impl Into<String>, ranges: Vec<Range>) -> Operator {
        Operator::TableScan {
            table_name: table_name.into(),
            ranges,
            reverse: false,
        }
    }

    pub fn index_scan(index_name: impl Into<String>, ranges: Vec<Range>) -> Operator {
        Operator::IndexScan {
            index_name: index_name.into(),
            ranges,
            reverse: false,
        }
    }

    pub fn docs_emit(exprs: Vec<Expr>) -> Operator {
        Operator::DocsEmit { exprs }
    }

    pub fn docs_filter(expr: Expr) -> Operator {
        Operator::DocsFilter { expr }
    }

    pub fn docs_project(exprs: Vec<ProjectionExpr>) -> Operator {
        Operator::DocsProject { exprs }
    }

    pub fn docs_skip(expr: Expr) -> Operator {
        Operator::DocsSkip { expr }
    }

    pub fn docs_take(expr: Expr) -> Operator {
        Operator::DocsTake { expr }
    }

    pub fn temp_tree_sort(expr: Expr) -> Operator {
        Operator::DocsTempTreeSort {
            expr,
            reverse: false,
        }
    }

    pub fn temp_tree_sort_reverse(expr: Expr) -> Operator {
        Operator::DocsTempTreeSort {
            expr,
            reverse: true,
        }
    }

    pub fn paths_set(path: Path, expr: Expr) -> Operator {
        Operator::PathsSet { path, expr }
    }

    pub fn paths_unset(field: impl Into<String>) -> Operator {
        Operator::PathsUnset {
            field: field.into(),
        }
    }

    pub fn table_validate(table_name: impl Into<String>) -> Operator {
        Operator::TableValidate {
            table_name: table_name.into(),
        }
    }

    pub fn table_insert(table_name: impl Into<String>) -> Operator {
        Operator::TableInsert {
            table_name: table_name.into(),
        }
    }

    pub fn table_replace(table_name: impl Into<String>) -> Operator {
        Operator::TableReplace {
            table_name: table_name.into(),
        }
    }

    pub fn table_delete(table_name: impl Into<String>) -> Operator {
        Operator::TableDelete {
            table_name: table_name.into(),
        }
    }

    pub fn index_insert(index_name: impl Into<String>) -> Operator {
        Operator::IndexInsert {
            index_name: index_name.into(),
        }
    }

    pub fn index_delete(index_name: impl Into<String>) -> Operator {
        Operator::IndexDelete {
            index_name: index_name.into(),
        }
    }

    pub fn concat(streams: Vec<Stream>) -> Operator {
        Operator::Concat { streams }
    }

    pub fn union(streams: Vec<Stream>) -> Operator {
        Operator::Union { streams }
    }

    /// The substreams this operator carries, if any. The optimizer
    /// traverses these generically.
    pub fn substreams_mut(&mut self) -> Option<&mut Vec<Stream>> {
        match self {
            Operator::Concat { streams } | Operator::Union { streams } => Some(streams),
            _ => None,
        }
    }

    fn iterate(&self, prev: &[Operator], env: &Environment<'_>, f: IterFn<'_>) -> Result<()> {
        match self {
            Operator::TableScan {
                table_name,
                ranges,
                reverse,
            } => table::iterate_table_scan(table_name, ranges, *reverse, env, f),
            Operator::IndexScan {
                index_name,
                ranges,
                reverse,
            } => index::iterate_index_scan(index_name, ranges, *reverse, env, f),
            Operator::DocsEmit { exprs } => docs::iterate_docs_emit(exprs, env, f),
            Operator::DocsFilter { expr } => docs::iterate_docs_filter(expr, prev, env, f),
            Operator::DocsProject { exprs } => docs::iterate_docs_project(exprs, prev, env, f),
            Operator::DocsSkip { expr } => docs::iterate_docs_skip(expr, prev, env, f),
            Operator::DocsTake { expr } => docs::iterate_docs_take(expr, prev, env, f),
            Operator::DocsTempTreeSort { expr, reverse } => {
                sort::iterate_temp_tree_sort(expr, *reverse, prev, env, f)
            }
            Operator::PathsSet { path, expr } => {
                paths::iterate_paths_set(path, expr, prev, env, f)
            }
            Operator::PathsUnset { field } => paths::iterate_paths_unset(field, prev, env, f),
            Operator::TableValidate { table_name } => {
                table::iterate_table_validate(table_name, prev, env, f)
            }
            Operator::TableInsert { table_name } => {
                table::iterate_table_insert(table_name, prev, env, f)
            }
            Operator::TableReplace { table_name } => {
                table::iterate_table_replace(table_name, prev, env, f)
            }
            Operator::TableDelete { table_name } => {
                table::iterate_table_delete(table_name, prev, env, f)
            }
            Operator::IndexInsert { index_name } => {
                index::iterate_index_insert(index_name, prev, env, f)
            }
            Operator::IndexDelete { index_name } => {
                index::iterate_index_delete(index_name, prev, env, f)
            }
            Operator::Concat { streams } => combine::iterate_concat(streams, env, f),
            Operator::Union { streams } => combine::iterate_union(streams, env, f),
        }
    }
}

/// Drive `ops` as a pipeline, invoking `f` per produced row. An empty
/// slice yields the input environment once (mutation sinks can then run
/// on a standalone row).
pub(crate) fn iterate_ops(
    ops: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    match ops.split_last() {
        None => f(env),
        Some((last, rest)) => last.iterate(rest, env, f),
    }
}

/// A pipeline of operators. An empty stream produces no rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    pub ops: Vec<Operator>,
}

impl Stream {
    pub fn new(op: Operator) -> Stream {
        Stream { ops: vec![op] }
    }

    pub fn empty() -> Stream {
        Stream::default()
    }

    pub fn pipe(mut self, op: Operator) -> Stream {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iterate(&self, env: &Environment<'_>, f: IterFn<'_>) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        iterate_ops(&self.ops, env, f)
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

fn fmt_scan(
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    name: &str,
    ranges: &[Range],
    reverse: bool,
) -> fmt::Result {
    write!(f, "{prefix}{}({name:?}", if reverse { "Reverse" } else { "" })?;
    if !ranges.is_empty() {
        f.write_str(", [")?;
        for (i, r) in ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        f.write_str("]")?;
    }
    f.write_str(")")
}

fn fmt_streams(f: &mut fmt::Formatter<'_>, name: &str, streams: &[Stream]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, s) in streams.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{s}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::TableScan {
                table_name,
                ranges,
                reverse,
            } => fmt_scan(f, "table.Scan", table_name, ranges, *reverse),
            Operator::IndexScan {
                index_name,
                ranges,
                reverse,
            } => fmt_scan(f, "index.Scan", index_name, ranges, *reverse),
            Operator::DocsEmit { exprs } => {
                f.write_str("docs.Emit(")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            Operator::DocsFilter { expr } => write!(f, "docs.Filter({expr})"),
            Operator::DocsProject { exprs } => {
                f.write_str("docs.Project(")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            Operator::DocsSkip { expr } => write!(f, "docs.Skip({expr})"),
            Operator::DocsTake { expr } => write!(f, "docs.Take({expr})"),
            Operator::DocsTempTreeSort { expr, reverse } => {
                if *reverse {
                    write!(f, "docs.TempTreeSortReverse({expr})")
                } else {
                    write!(f, "docs.TempTreeSort({expr})")
                }
            }
            Operator::PathsSet { path, expr } => write!(f, "paths.Set({path}, {expr})"),
            Operator::PathsUnset { field } => write!(f, "paths.Unset({field})"),
            Operator::TableValidate { table_name } => {
                write!(f, "table.Validate({table_name:?})")
            }
            Operator::TableInsert { table_name } => write!(f, "table.Insert({table_name:?})"),
            Operator::TableReplace { table_name } => {
                write!(f, "table.Replace({table_name:?})")
            }
            Operator::TableDelete { table_name } => write!(f, "table.Delete({table_name:?})"),
            Operator::IndexInsert { index_name } => write!(f, "index.Insert({index_name:?})"),
            Operator::IndexDelete { index_name } => write!(f, "index.Delete({index_name:?})"),
            Operator::Concat { streams } => fmt_streams(f, "concat", streams),
            Operator::Union { streams } => fmt_streams(f, "union", streams),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn test_display_is_canonical() {
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(Operator::docs_filter(Expr::eq(
                Expr::path("a"),
                Expr::integer(1),
            )))
            .pipe(Operator::docs_take(Expr::integer(10)));
        assert_eq!(
            s.to_string(),
            "table.Scan(\"foo\") | docs.Filter(a = 1) | docs.Take(10)"
        );

        let s = Stream::new(Operator::index_scan(
            "idx_foo_a",
            vec![Range {
                min: vec![Expr::integer(1)],
                exact: true,
                ..Default::default()
            }],
        ));
        assert_eq!(
            s.to_string(),
            "index.Scan(\"idx_foo_a\", [{\"min\": [1], \"exact\": true}])"
        );

        let concat = Stream::new(Operator::concat(vec![
            Stream::new(Operator::table_scan("a")).pipe(Operator::index_insert("i")),
            Stream::new(Operator::table_scan("b")),
        ]));
        assert_eq!(
            concat.to_string(),
            "concat(table.Scan(\"a\") | index.Insert(\"i\"), table.Scan(\"b\"))"
        );

        assert_eq!(Stream::empty().to_string(), "");
    }

    #[test]
    fn test_reverse_scan_display() {
        let s = Stream::new(Operator::TableScan {
            table_name: "foo".to_string(),
            ranges: Vec::new(),
            reverse: true,
        });
        assert_eq!(s.to_string(), "table.ScanReverse(\"foo\")");
    }

    #[test]
    fn test_concat_yields_all_union_deduplicates() {
        use crate::value::{Document, Value};

        let emit = |values: &[i64]| {
            Stream::new(Operator::docs_emit(
                values
                    .iter()
                    .map(|v| {
                        let mut doc = Document::new();
                        doc.set("a".to_string(), Value::Integer(*v));
                        Expr::Literal(Value::Document(doc))
                    })
                    .collect(),
            ))
        };

        let collect = |s: &Stream| {
            let mut seen = Vec::new();
            s.iterate(&Environment::default(), &mut |env| {
                match env.document().and_then(|d| d.get("a")) {
                    Some(Value::Integer(n)) => seen.push(*n),
                    other => panic!("unexpected row: {other:?}"),
                }
                Ok(())
            })
            .unwrap();
            seen
        };

        let concat = Stream::new(Operator::concat(vec![emit(&[1, 2]), emit(&[2, 3])]));
        assert_eq!(collect(&concat), vec![1, 2, 2, 3]);

        let union = Stream::new(Operator::union(vec![emit(&[1, 2]), emit(&[2, 3])]));
        assert_eq!(collect(&union), vec![1, 2, 3]);
    }
}
