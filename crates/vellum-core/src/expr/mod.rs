//! The expression tree consumed by filters, projections and the planner.
//!
//! This is the surface an external parser lowers into: literals, document
//! paths, binary operators, expression lists and document constructors.
//! Expressions evaluate against an [`Environment`], and constant
//! sub-expressions fold to literals ahead of execution.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stream::env::Environment;
use crate::value::{Document, Path, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    In,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    Path(Path),
    /// An expression list: the right-hand side of IN, or a literal array
    /// constructor.
    List(Vec<Expr>),
    /// A document constructor: `{"a": 1, "b": x + 1}`.
    DocExpr(Vec<(String, Expr)>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Not(Box<Expr>),
}

impl Expr {
    pub fn integer(n: i64) -> Expr {
        Expr::Literal(Value::Integer(n))
    }

    pub fn double(d: f64) -> Expr {
        Expr::Literal(Value::Double(d))
    }

    pub fn text(s: impl Into<String>) -> Expr {
        Expr::Literal(Value::Text(s.into()))
    }

    pub fn boolean(b: bool) -> Expr {
        Expr::Literal(Value::Bool(b))
    }

    /// A path expression parsed from its dotted form.
    pub fn path(s: &str) -> Expr {
        Expr::Path(Path::parse(s).expect("invalid path literal"))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, left, right)
    }

    pub fn between(expr: Expr, low: Expr, high: Expr) -> Expr {
        Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    /// Evaluate the expression against the environment's current scope.
    pub fn eval(&self, env: &Environment<'_>) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(path) => Ok(env
                .document()
                .and_then(|doc| path.get_from_document(doc))
                .cloned()
                .unwrap_or(Value::Null)),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.eval(env)?);
                }
                Ok(Value::Array(out))
            }
            Expr::DocExpr(pairs) => {
                let mut doc = Document::new();
                for (name, e) in pairs {
                    doc.set(name.clone(), e.eval(env)?);
                }
                Ok(Value::Document(doc))
            }
            Expr::Binary { op, left, right } => eval_binary(*op, left, right, env),
            Expr::Between { expr, low, high } => {
                let v = expr.eval(env)?;
                let lo = low.eval(env)?;
                let hi = high.eval(env)?;
                if v.is_null() || lo.is_null() || hi.is_null() {
                    return Ok(Value::Null);
                }
                let ge_low = matches!(
                    v.compare(&lo),
                    Some(Ordering::Greater | Ordering::Equal)
                );
                let le_high = matches!(v.compare(&hi), Some(Ordering::Less | Ordering::Equal));
                Ok(Value::Bool(ge_low && le_high))
            }
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval(env)?.is_truthy())),
        }
    }

    /// Whether the expression references any document path.
    pub fn contains_path(&self) -> bool {
        match self {
            Expr::Literal(_) => false,
            Expr::Path(_) => true,
            Expr::List(items) => items.iter().any(Expr::contains_path),
            Expr::DocExpr(pairs) => pairs.iter().any(|(_, e)| e.contains_path()),
            Expr::Binary { left, right, .. } => left.contains_path() || right.contains_path(),
            Expr::Between { expr, low, high } => {
                expr.contains_path() || low.contains_path() || high.contains_path()
            }
            Expr::Not(inner) => inner.contains_path(),
        }
    }

    pub fn is_constant(&self) -> bool {
        !self.contains_path()
    }

    /// Fold constant sub-expressions to literals. Constant expressions that
    /// fail to evaluate (for example NaN arithmetic) are left untouched for
    /// execution-time reporting.
    pub fn fold(self) -> Expr {
        if self.is_constant() {
            if matches!(self, Expr::Literal(_)) {
                return self;
            }
            let empty = Environment::default();
            return match self.eval(&empty) {
                Ok(v) => Expr::Literal(v),
                Err(_) => self,
            };
        }

        match self {
            Expr::List(items) => Expr::List(items.into_iter().map(Expr::fold).collect()),
            Expr::DocExpr(pairs) => {
                Expr::DocExpr(pairs.into_iter().map(|(n, e)| (n, e.fold())).collect())
            }
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(left.fold()),
                right: Box::new(right.fold()),
            },
            Expr::Between { expr, low, high } => Expr::Between {
                expr: Box::new(expr.fold()),
                low: Box::new(low.fold()),
                high: Box::new(high.fold()),
            },
            Expr::Not(inner) => Expr::Not(Box::new(inner.fold())),
            other => other,
        }
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, env: &Environment<'_>) -> Result<Value> {
    // Logical operators short-circuit on truthiness.
    match op {
        BinaryOp::And => {
            if !left.eval(env)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(right.eval(env)?.is_truthy()));
        }
        BinaryOp::Or => {
            if left.eval(env)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(right.eval(env)?.is_truthy()));
        }
        _ => {}
    }

    let l = left.eval(env)?;
    let r = right.eval(env)?;

    // SQL-style null propagation: comparing against NULL yields NULL.
    if matches!(
        op,
        BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Gt
            | BinaryOp::Gte
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::In
    ) && (l.is_null() || r.is_null())
    {
        return Ok(Value::Null);
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            Ok(eval_arithmetic(op, &l, &r))
        }
        BinaryOp::Eq => Ok(Value::Bool(l.compare(&r) == Some(Ordering::Equal))),
        BinaryOp::Neq => Ok(Value::Bool(l.compare(&r) != Some(Ordering::Equal))),
        BinaryOp::Gt => Ok(Value::Bool(l.compare(&r) == Some(Ordering::Greater))),
        BinaryOp::Gte => Ok(Value::Bool(matches!(
            l.compare(&r),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::Lt => Ok(Value::Bool(l.compare(&r) == Some(Ordering::Less))),
        BinaryOp::Lte => Ok(Value::Bool(matches!(
            l.compare(&r),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::In => {
            let items = match &r {
                Value::Array(items) => items,
                _ => return Ok(Value::Bool(false)),
            };
            Ok(Value::Bool(items.iter().any(|item| {
                l.compare(item) == Some(Ordering::Equal)
            })))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Arithmetic over numbers. Incompatible operands, integer overflow and
/// division by zero yield `Null`.
fn eval_arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div => a.checked_div(*b),
                _ => None,
            };
            result.map(Value::Integer).unwrap_or(Value::Null)
        }
        (Value::Integer(_) | Value::Double(_), Value::Integer(_) | Value::Double(_)) => {
            let a = match l {
                Value::Integer(n) => *n as f64,
                Value::Double(d) => *d,
                _ => unreachable!(),
            };
            let b = match r {
                Value::Integer(n) => *n as f64,
                Value::Double(d) => *d,
                _ => unreachable!(),
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Value::Null;
                    }
                    a / b
                }
                _ => return Value::Null,
            };
            if result.is_nan() {
                Value::Null
            } else {
                Value::Double(result)
            }
        }
        _ => Value::Null,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Path(p) => write!(f, "{p}"),
            Expr::List(items) => {
                f.write_str("[")?;
                for (i, e) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            Expr::DocExpr(pairs) => {
                f.write_str("{")?;
                for (i, (name, e)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name:?}: {e}")?;
                }
                f.write_str("}")
            }
            Expr::Binary { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            Expr::Between { expr, low, high } => {
                write!(f, "{expr} BETWEEN {low} AND {high}")
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(e: &Expr) -> Value {
        e.eval(&Environment::default()).unwrap()
    }

    fn doc_env(json: serde_json::Value) -> Document {
        Document::from_json(&json)
    }

    #[test]
    fn test_arithmetic_folding_semantics() {
        // 3 + 2.4 -> 5.4 (integer + double widens to double).
        let e = Expr::binary(BinaryOp::Add, Expr::integer(3), Expr::double(2.4));
        assert_eq!(eval(&e), Value::Double(5.4));

        // 3 > 1 - 40 -> true.
        let e = Expr::binary(
            BinaryOp::Gt,
            Expr::integer(3),
            Expr::binary(BinaryOp::Sub, Expr::integer(1), Expr::integer(40)),
        );
        assert_eq!(eval(&e), Value::Bool(true));
    }

    #[test]
    fn test_path_resolution() {
        use serde_json::json;
        let mut env = Environment::default();
        env.set_document(doc_env(json!({"a": {"b": 7}})));

        assert_eq!(
            Expr::path("a.b").eval(&env).unwrap(),
            Value::Integer(7)
        );
        assert_eq!(Expr::path("missing").eval(&env).unwrap(), Value::Null);
    }

    #[test]
    fn test_fold_constant_subexpressions() {
        // a > 1 - 40 -> a > -39.
        let e = Expr::binary(
            BinaryOp::Gt,
            Expr::path("a"),
            Expr::binary(BinaryOp::Sub, Expr::integer(1), Expr::integer(40)),
        );
        let folded = e.fold();
        assert_eq!(
            folded,
            Expr::binary(BinaryOp::Gt, Expr::path("a"), Expr::integer(-39))
        );

        // Constant list folds to an array literal; lists with paths fold
        // element-wise.
        let e = Expr::List(vec![Expr::integer(3), Expr::binary(
            BinaryOp::Sub,
            Expr::integer(1),
            Expr::integer(40),
        )]);
        assert_eq!(
            e.fold(),
            Expr::Literal(Value::Array(vec![Value::Integer(3), Value::Integer(-39)]))
        );

        let e = Expr::List(vec![Expr::path("a"), Expr::binary(
            BinaryOp::Sub,
            Expr::integer(1),
            Expr::integer(40),
        )]);
        assert_eq!(
            e.fold(),
            Expr::List(vec![Expr::path("a"), Expr::integer(-39)])
        );
    }

    #[test]
    fn test_in_and_between() {
        use serde_json::json;
        let mut env = Environment::default();
        env.set_document(doc_env(json!({"a": 2})));

        let e = Expr::binary(
            BinaryOp::In,
            Expr::path("a"),
            Expr::List(vec![Expr::integer(1), Expr::integer(2)]),
        );
        assert_eq!(e.eval(&env).unwrap(), Value::Bool(true));

        let e = Expr::between(Expr::path("a"), Expr::integer(3), Expr::integer(9));
        assert_eq!(e.eval(&env).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_division_by_zero_and_overflow_yield_null() {
        let e = Expr::binary(BinaryOp::Div, Expr::integer(1), Expr::integer(0));
        assert_eq!(eval(&e), Value::Null);

        let e = Expr::binary(BinaryOp::Add, Expr::integer(i64::MAX), Expr::integer(1));
        assert_eq!(eval(&e), Value::Null);
    }

    #[test]
    fn test_display() {
        let e = Expr::eq(Expr::path("a"), Expr::integer(1));
        assert_eq!(e.to_string(), "a = 1");

        let e = Expr::binary(
            BinaryOp::In,
            Expr::path("a"),
            Expr::List(vec![Expr::integer(1), Expr::integer(2)]),
        );
        assert_eq!(e.to_string(), "a IN [1, 2]");

        let e = Expr::between(Expr::path("x"), Expr::integer(1), Expr::integer(2));
        assert_eq!(e.to_string(), "x BETWEEN 1 AND 2");
    }
}
