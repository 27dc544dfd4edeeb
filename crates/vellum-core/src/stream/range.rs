//! Scan ranges at the expression level.
//!
//! The planner builds ranges out of filter expressions; at execution time
//! each range evaluates its bound expressions against the environment and
//! encodes them into concrete byte bounds for the tree.

use std::fmt;

use crate::encoding::key::encode_key;
use crate::error::Result;
use crate::expr::Expr;
use crate::tree::EncodedRange;
use crate::value::Path;

use super::env::Environment;

/// A half-open or closed interval over composite keys. Empty `min`/`max`
/// means unbounded on that side; `exact` marks a single-prefix lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Range {
    pub paths: Vec<Path>,
    pub min: Vec<Expr>,
    pub max: Vec<Expr>,
    pub exclusive: bool,
    pub exact: bool,
}

impl Range {
    /// Evaluate the bound expressions and encode the concrete range.
    pub fn eval(&self, env: &Environment<'_>) -> Result<EncodedRange> {
        Ok(EncodedRange {
            min: encode_side(&self.min, env)?,
            max: encode_side(&self.max, env)?,
            exclusive: self.exclusive,
            exact: self.exact,
        })
    }
}

fn encode_side(exprs: &[Expr], env: &Environment<'_>) -> Result<Option<Vec<u8>>> {
    if exprs.is_empty() {
        return Ok(None);
    }
    let mut values = Vec::with_capacity(exprs.len());
    for e in exprs {
        values.push(e.eval(env)?);
    }
    Ok(Some(encode_key(&values)?))
}

/// Crude selectivity proxy used by the index-selection cost model.
pub fn ranges_cost(ranges: &[Range]) -> i64 {
    ranges
        .iter()
        .map(|r| {
            if r.min.is_empty() && r.max.is_empty() {
                50
            } else if r.exact {
                0
            } else {
                // Length of the shared min/max prefix.
                r.min
                    .iter()
                    .zip(r.max.iter())
                    .take_while(|(a, b)| a == b)
                    .count() as i64
            }
        })
        .sum()
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.min.is_empty() {
            parts.push(format!("\"min\": [{}]", join_exprs(&self.min)));
        }
        if !self.max.is_empty() {
            parts.push(format!("\"max\": [{}]", join_exprs(&self.max)));
        }
        if self.exclusive {
            parts.push("\"exclusive\": true".to_string());
        }
        if self.exact {
            parts.push("\"exact\": true".to_string());
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn join_exprs(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::tree::prefix_successor;
    use crate::value::Value;

    #[test]
    fn test_eval_encodes_bounds() {
        let rng = Range {
            paths: vec![Path::parse("a").unwrap()],
            min: vec![Expr::integer(1)],
            max: Vec::new(),
            exclusive: false,
            exact: true,
        };
        let encoded = rng.eval(&Environment::default()).unwrap();
        assert_eq!(
            encoded.min,
            Some(encode_key(&[Value::Integer(1)]).unwrap())
        );
        assert_eq!(encoded.max, None);
        assert!(encoded.exact);

        // Sanity: the successor of the bound exists for integer keys.
        assert!(prefix_successor(encoded.min.as_ref().unwrap()).is_some());
    }

    #[test]
    fn test_display() {
        let rng = Range {
            paths: vec![Path::parse("a").unwrap()],
            min: vec![Expr::integer(1)],
            max: Vec::new(),
            exclusive: false,
            exact: true,
        };
        assert_eq!(rng.to_string(), "{\"min\": [1], \"exact\": true}");

        let rng = Range {
            paths: vec![Path::parse("a").unwrap()],
            min: vec![Expr::integer(1)],
            max: vec![Expr::integer(10)],
            exclusive: false,
            exact: false,
        };
        assert_eq!(rng.to_string(), "{\"min\": [1], \"max\": [10]}");
    }

    #[test]
    fn test_ranges_cost() {
        // Unbounded.
        assert_eq!(ranges_cost(&[Range::default()]), 50);

        // Exact.
        let exact = Range {
            min: vec![Expr::integer(1)],
            exact: true,
            ..Default::default()
        };
        assert_eq!(ranges_cost(&[exact]), 0);

        // Shared prefix of min and max.
        let between = Range {
            min: vec![Expr::integer(1), Expr::integer(10)],
            max: vec![Expr::integer(1), Expr::integer(20)],
            ..Default::default()
        };
        assert_eq!(ranges_cost(&[between]), 1);
    }
}
