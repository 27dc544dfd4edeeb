//! Index selection.
//!
//! Attempts to replace a sequential table scan by an index scan or a
//! primary-key range scan by analyzing the run of filters sitting directly
//! above it.
//!
//! A filter is indexable when its expression has the form
//! `<path> <op> <expr>` or `<expr> <op> <path>` with `op` one of
//! `=, >, >=, <, <=, IN, BETWEEN`, the non-path side free of path
//! references, and (for IN) a literal expression list on the right.
//!
//! For each candidate (the primary key, then every index of the table)
//! filters are associated to the indexed paths left to right; the chain
//! stops at the first path without a filter, every associated filter but
//! the last must be an equality (or IN), and once an IN participates only
//! further `=`/`IN` filters join the chain. The candidate covering the
//! most filters wins, with the cost model breaking ties.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::expr::{BinaryOp, Expr};
use crate::stream::range::{ranges_cost, Range};
use crate::stream::{Operator, Stream};
use crate::value::{Path, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Between,
}

impl FilterOperator {
    fn is_equality(self) -> bool {
        matches!(self, FilterOperator::Eq | FilterOperator::In)
    }
}

/// An indexable filter broken into `<path> <operator> <operand>`.
#[derive(Debug)]
struct FilterNode {
    /// Position of the filter operator within the stream.
    op_index: usize,
    path: Path,
    operator: FilterOperator,
    operand: Expr,
}

struct Candidate<'a> {
    /// Filters this candidate absorbs into ranges.
    nodes: Vec<&'a FilterNode>,
    ranges_cost: i64,
    is_index: bool,
    is_unique: bool,
    /// The scan that replaces the head of the stream.
    replace_root: Operator,
}

impl Candidate<'_> {
    fn cost(&self) -> i64 {
        let mut cost = self.ranges_cost;
        if self.is_index {
            cost += 20;
        }
        if self.is_unique {
            cost -= 10;
        }
        cost - self.nodes.len() as i64
    }
}

/// Rewrite the stream to scan an index or a primary-key range when the
/// filters allow it. Leaves the stream untouched otherwise.
pub fn select_index(stream: Stream, catalog: &Catalog) -> Result<Stream> {
    let table_name = match stream.ops.first() {
        Some(Operator::TableScan {
            table_name,
            ranges,
            reverse: false,
        }) if ranges.is_empty() => table_name.clone(),
        _ => return Ok(stream),
    };

    // The table must exist.
    let table_info = catalog.get_table_info(&table_name)?;

    // The run of filters adjacent to the scan.
    let mut filter_run = Vec::new();
    for (i, op) in stream.ops.iter().enumerate().skip(1) {
        match op {
            Operator::DocsFilter { .. } => filter_run.push(i),
            _ => break,
        }
    }
    if filter_run.is_empty() {
        return Ok(stream);
    }

    let mut nodes = Vec::new();
    for &i in &filter_run {
        if let Operator::DocsFilter { expr } = &stream.ops[i] {
            if let Some(node) = filter_node_from_expr(i, expr) {
                nodes.push(node);
            }
        }
    }
    if nodes.is_empty() {
        return Ok(stream);
    }

    // Start with the primary key, then consider every index of the table.
    let mut selected: Option<Candidate<'_>> = None;
    let mut best_cost = 0;

    if let Some(pk) = table_info.primary_key() {
        selected = associate(&table_name, false, false, &pk.paths, &nodes);
        if let Some(c) = &selected {
            best_cost = c.cost();
        }
    }

    for index_name in catalog.list_indexes(Some(&table_name)) {
        let index_info = catalog.get_index_info(&index_name)?;
        let candidate = match associate(
            &index_name,
            true,
            index_info.unique,
            &index_info.paths,
            &nodes,
        ) {
            Some(c) => c,
            None => continue,
        };

        match &selected {
            None => {
                best_cost = candidate.cost();
                selected = Some(candidate);
            }
            Some(current) => {
                let cost = candidate.cost();
                // Most filters absorbed wins; cost breaks ties.
                if current.nodes.len() < candidate.nodes.len()
                    || (current.nodes.len() == candidate.nodes.len() && cost < best_cost)
                {
                    best_cost = cost;
                    selected = Some(candidate);
                }
            }
        }
    }

    let selected = match selected {
        Some(s) => s,
        None => return Ok(stream),
    };

    // Replace the scan and drop the absorbed filters; unassigned filters
    // stay in their original order.
    let dropped: HashSet<usize> = selected.nodes.iter().map(|n| n.op_index).collect();
    let mut ops = Vec::with_capacity(stream.ops.len());
    ops.push(selected.replace_root);
    for (i, op) in stream.ops.into_iter().enumerate() {
        if i == 0 || dropped.contains(&i) {
            continue;
        }
        ops.push(op);
    }

    Ok(Stream { ops })
}

/// Break a filter expression into an indexable `(path, op, operand)`
/// triple, when possible.
fn filter_node_from_expr(op_index: usize, expr: &Expr) -> Option<FilterNode> {
    match expr {
        Expr::Between {
            expr: subject,
            low,
            high,
        } => {
            // `x BETWEEN a AND b` is usable when x is a path and both
            // bounds are path-free.
            let path = as_path(subject)?;
            if low.contains_path() || high.contains_path() {
                return None;
            }
            Some(FilterNode {
                op_index,
                path,
                operator: FilterOperator::Between,
                operand: Expr::List(vec![(**low).clone(), (**high).clone()]),
            })
        }
        Expr::Binary { op, left, right } => {
            let operator = match op {
                BinaryOp::Eq => FilterOperator::Eq,
                BinaryOp::Gt => FilterOperator::Gt,
                BinaryOp::Gte => FilterOperator::Gte,
                BinaryOp::Lt => FilterOperator::Lt,
                BinaryOp::Lte => FilterOperator::Lte,
                BinaryOp::In => FilterOperator::In,
                _ => return None,
            };

            if operator == FilterOperator::In {
                // Only `path IN <literal list>` can use an index.
                let path = as_path(left)?;
                if as_path(right).is_some() || right.contains_path() {
                    return None;
                }
                if in_elements(right).is_none() {
                    return None;
                }
                return Some(FilterNode {
                    op_index,
                    path,
                    operator,
                    operand: (**right).clone(),
                });
            }

            // path OP expr
            if let Some(path) = as_path(left) {
                if as_path(right).is_none() && !right.contains_path() {
                    return Some(FilterNode {
                        op_index,
                        path,
                        operator,
                        operand: (**right).clone(),
                    });
                }
                return None;
            }

            // expr OP path: mirror the operator around the path.
            if let Some(path) = as_path(right) {
                if !left.contains_path() {
                    return Some(FilterNode {
                        op_index,
                        path,
                        operator: mirror(operator),
                        operand: (**left).clone(),
                    });
                }
            }

            None
        }
        _ => None,
    }
}

fn as_path(expr: &Expr) -> Option<Path> {
    match expr {
        Expr::Path(p) => Some(p.clone()),
        _ => None,
    }
}

/// `5 < a` selects the same rows as `a > 5`.
fn mirror(op: FilterOperator) -> FilterOperator {
    match op {
        FilterOperator::Gt => FilterOperator::Lt,
        FilterOperator::Gte => FilterOperator::Lte,
        FilterOperator::Lt => FilterOperator::Gt,
        FilterOperator::Lte => FilterOperator::Gte,
        other => other,
    }
}

/// The element expressions of an IN right-hand side: a literal expression
/// list, or the array literal it folds into.
fn in_elements(expr: &Expr) -> Option<Vec<Expr>> {
    match expr {
        Expr::List(items) => Some(items.clone()),
        Expr::Literal(Value::Array(items)) => {
            Some(items.iter().map(|v| Expr::Literal(v.clone())).collect())
        }
        _ => None,
    }
}

/// Associate filters to indexed paths left to right.
fn associate<'a>(
    tree_name: &str,
    is_index: bool,
    is_unique: bool,
    paths: &[Path],
    nodes: &'a [FilterNode],
) -> Option<Candidate<'a>> {
    let mut found: Vec<&FilterNode> = Vec::with_capacity(paths.len());
    let mut has_in = false;

    for path in paths {
        let node = match nodes.iter().find(|n| n.path == *path) {
            Some(n) => n,
            None => break,
        };

        if node.operator == FilterOperator::In {
            has_in = true;
        }

        // Once an IN participates, only further `=` / `IN` filters can
        // join the chain.
        if !has_in || node.operator.is_equality() {
            found.push(node);
        }

        // A range operator ends the chain.
        if !node.operator.is_equality() {
            break;
        }
    }

    if found.is_empty() {
        return None;
    }

    let ranges = if has_in {
        build_ranges_with_in(paths, &found)
    } else {
        vec![build_range_from_nodes(&found)]
    };

    let cost = ranges_cost(&ranges);
    let replace_root = if is_index {
        Operator::index_scan(tree_name, ranges)
    } else {
        Operator::table_scan_ranges(tree_name, ranges)
    };

    Some(Candidate {
        nodes: found,
        ranges_cost: cost,
        is_index,
        is_unique,
        replace_root,
    })
}

fn build_range_from_nodes(nodes: &[&FilterNode]) -> Range {
    let paths: Vec<Path> = nodes.iter().map(|n| n.path.clone()).collect();
    let operands: Vec<Expr> = nodes.iter().map(|n| n.operand.clone()).collect();
    let last = nodes.last().expect("nodes is non-empty");
    build_range_from_operator(last.operator, paths, operands)
}

fn build_range_from_operator(
    last_op: FilterOperator,
    paths: Vec<Path>,
    operands: Vec<Expr>,
) -> Range {
    let mut range = Range {
        paths,
        ..Default::default()
    };

    match last_op {
        FilterOperator::Eq | FilterOperator::In => {
            range.exact = true;
            range.min = operands;
        }
        FilterOperator::Gt => {
            range.exclusive = true;
            range.min = operands;
        }
        FilterOperator::Gte => {
            range.min = operands;
        }
        FilterOperator::Lt => {
            range.exclusive = true;
            range.max = operands;
        }
        FilterOperator::Lte => {
            range.max = operands;
        }
        FilterOperator::Between => {
            // The equality prefix is shared; the last component carries
            // the [low, high] bounds, both inclusive.
            let mut min = Vec::with_capacity(operands.len());
            let mut max = Vec::with_capacity(operands.len());
            for (i, operand) in operands.iter().enumerate() {
                if i == operands.len() - 1 {
                    if let Expr::List(bounds) = operand {
                        min.push(bounds[0].clone());
                        max.push(bounds[1].clone());
                        continue;
                    }
                }
                min.push(operand.clone());
                max.push(operand.clone());
            }
            range.min = min;
            range.max = max;
        }
    }

    range
}

/// IN filters multiply into the Cartesian product of their element lists
/// with the other equalities, one exact range per combination.
fn build_ranges_with_in(paths: &[Path], nodes: &[&FilterNode]) -> Vec<Range> {
    let rows: Vec<Vec<Expr>> = nodes
        .iter()
        .map(|n| {
            if n.operator == FilterOperator::In {
                in_elements(&n.operand).expect("checked at association time")
            } else {
                vec![n.operand.clone()]
            }
        })
        .collect();

    let mut ranges = Vec::new();
    let mut combination = Vec::with_capacity(rows.len());
    walk_product(&rows, &mut combination, &mut |row| {
        ranges.push(build_range_from_operator(
            FilterOperator::Eq,
            paths[..row.len()].to_vec(),
            row.to_vec(),
        ));
    });
    ranges
}

fn walk_product(rows: &[Vec<Expr>], acc: &mut Vec<Expr>, f: &mut impl FnMut(&[Expr])) {
    let first = match rows.first() {
        Some(r) => r,
        None => {
            f(acc);
            return;
        }
    };
    for e in first {
        acc.push(e.clone());
        walk_product(&rows[1..], acc, f);
        acc.pop();
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Database;
    use crate::expr::{BinaryOp, Expr};
    use crate::planner;
    use crate::query::{CreateIndexStmt, CreateTableStmt, Statement};
    use crate::schema::TableConstraint;
    use crate::stream::{Operator, Stream};
    use crate::value::Path;

    /// foo(k PRIMARY KEY) with idx_foo_a(a), idx_foo_b(b) and a unique
    /// idx_foo_c(c); foo2 with a composite idx_foo2_x_y_z(x, y, z).
    fn setup() -> Database {
        let db = Database::new().unwrap();

        let mut ct = CreateTableStmt::new("foo");
        ct.table_constraints = vec![TableConstraint::primary_key(vec![
            Path::parse("k").unwrap()
        ])];
        db.execute(Statement::CreateTable(ct)).unwrap();

        for (name, paths, unique) in [
            ("idx_foo_a", vec!["a"], false),
            ("idx_foo_b", vec!["b"], false),
            ("idx_foo_c", vec!["c"], true),
        ] {
            db.execute(Statement::CreateIndex(CreateIndexStmt {
                index_name: name.to_string(),
                table_name: "foo".to_string(),
                paths: paths.iter().map(|p| Path::parse(p).unwrap()).collect(),
                unique,
                if_not_exists: false,
            }))
            .unwrap();
        }

        db.execute(Statement::CreateTable(CreateTableStmt::new("foo2")))
            .unwrap();
        db.execute(Statement::CreateIndex(CreateIndexStmt {
            index_name: "idx_foo2_x_y_z".to_string(),
            table_name: "foo2".to_string(),
            paths: ["x", "y", "z"]
                .iter()
                .map(|p| Path::parse(p).unwrap())
                .collect(),
            unique: false,
            if_not_exists: false,
        }))
        .unwrap();

        db
    }

    fn optimize(db: &Database, stream: Stream) -> String {
        planner::optimize(stream, db.catalog()).unwrap().to_string()
    }

    fn filter(op: BinaryOp, path: &str, operand: Expr) -> Operator {
        Operator::docs_filter(Expr::binary(op, Expr::path(path), operand))
    }

    #[test]
    fn test_non_indexed_path_is_untouched() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Eq, "d", Expr::integer(1)));
        assert_eq!(
            optimize(&db, s),
            "table.Scan(\"foo\") | docs.Filter(d = 1)"
        );
    }

    #[test]
    fn test_single_equality_selects_index() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Eq, "a", Expr::integer(1)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo_a\", [{\"min\": [1], \"exact\": true}])"
        );
    }

    #[test]
    fn test_residual_filters_stay_in_order() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Eq, "a", Expr::integer(1)))
            .pipe(filter(BinaryOp::Eq, "b", Expr::integer(2)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo_a\", [{\"min\": [1], \"exact\": true}]) | docs.Filter(b = 2)"
        );
    }

    #[test]
    fn test_unique_index_wins_cost_tie() {
        let db = setup();
        // a -> non-unique, c -> unique; both absorb one filter, the
        // unique index is cheaper.
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Eq, "a", Expr::integer(1)))
            .pipe(filter(BinaryOp::Eq, "c", Expr::integer(2)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo_c\", [{\"min\": [2], \"exact\": true}]) | docs.Filter(a = 1)"
        );
    }

    #[test]
    fn test_range_operator_on_unique_index() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Gt, "c", Expr::integer(3)))
            .pipe(filter(BinaryOp::Eq, "b", Expr::integer(2)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo_c\", [{\"min\": [3], \"exclusive\": true}]) | docs.Filter(b = 2)"
        );
    }

    #[test]
    fn test_primary_key_selects_table_range_scan() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo"))
            .pipe(filter(BinaryOp::Eq, "k", Expr::integer(1)));
        assert_eq!(
            optimize(&db, s),
            "table.Scan(\"foo\", [{\"min\": [1], \"exact\": true}])"
        );
    }

    #[test]
    fn test_in_produces_cartesian_exact_ranges() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo2"))
            .pipe(filter(
                BinaryOp::In,
                "x",
                Expr::List(vec![Expr::integer(1), Expr::integer(2)]),
            ))
            .pipe(filter(BinaryOp::Eq, "y", Expr::integer(3)))
            .pipe(filter(BinaryOp::Eq, "z", Expr::integer(4)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo2_x_y_z\", [{\"min\": [1, 3, 4], \"exact\": true}, {\"min\": [2, 3, 4], \"exact\": true}])"
        );
    }

    #[test]
    fn test_composite_chain_stops_at_range_operator() {
        let db = setup();
        // y > 3 ends the chain: only x and y associate, z stays behind.
        let s = Stream::new(Operator::table_scan("foo2"))
            .pipe(filter(BinaryOp::Eq, "x", Expr::integer(1)))
            .pipe(filter(BinaryOp::Gt, "y", Expr::integer(3)))
            .pipe(filter(BinaryOp::Eq, "z", Expr::integer(4)));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo2_x_y_z\", [{\"min\": [1, 3], \"exclusive\": true}]) | docs.Filter(z = 4)"
        );
    }

    #[test]
    fn test_between_bounds_last_component() {
        let db = setup();
        let s = Stream::new(Operator::table_scan("foo2"))
            .pipe(filter(BinaryOp::Eq, "x", Expr::integer(1)))
            .pipe(Operator::docs_filter(Expr::between(
                Expr::path("y"),
                Expr::integer(10),
                Expr::integer(20),
            )));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo2_x_y_z\", [{\"min\": [1, 10], \"max\": [1, 20]}])"
        );
    }

    #[test]
    fn test_mirrored_operand_order() {
        let db = setup();
        // 5 > a selects the same rows as a < 5.
        let s = Stream::new(Operator::table_scan("foo")).pipe(Operator::docs_filter(
            Expr::binary(BinaryOp::Gt, Expr::integer(5), Expr::path("a")),
        ));
        assert_eq!(
            optimize(&db, s),
            "index.Scan(\"idx_foo_a\", [{\"max\": [5], \"exclusive\": true}])"
        );
    }
}
