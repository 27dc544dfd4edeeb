//! Field and table constraints.
//!
//! Tables are schemaless by default and optionally constrained: typed
//! fields with NOT NULL and DEFAULT, plus table-level PRIMARY KEY, UNIQUE
//! and CHECK constraints. Validation coerces values to their declared
//! kinds and fills defaults before a document reaches storage.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::stream::env::Environment;
use crate::value::{Document, Path, Value, ValueKind};

/// The identity of the table (and constraint paths) that caused an object
/// to exist implicitly. Owned objects cannot be dropped directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<Path>,
}

/// A constraint on one document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraint {
    pub path: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Expr>,
}

impl FieldConstraint {
    pub fn new(path: Path) -> FieldConstraint {
        FieldConstraint {
            path,
            kind: None,
            not_null: false,
            default_value: None,
        }
    }

    pub fn typed(path: Path, kind: ValueKind) -> FieldConstraint {
        FieldConstraint {
            path,
            kind: Some(kind),
            not_null: false,
            default_value: None,
        }
    }

    /// Apply the constraint to a document: fill the default, enforce
    /// NOT NULL and coerce the value to the declared kind.
    fn apply(&self, doc: &mut Document) -> Result<()> {
        let current = self.path.get_from_document(doc).cloned();

        let current = match current {
            None => {
                if let Some(default) = &self.default_value {
                    let v = default.eval(&Environment::default())?;
                    self.path.set_in_document(doc, v.clone())?;
                    Some(v)
                } else {
                    None
                }
            }
            other => other,
        };

        match current {
            None | Some(Value::Null) => {
                if self.not_null {
                    return Err(Error::constraint_at("NOT NULL", self.path.clone()));
                }
            }
            Some(v) => {
                if let Some(kind) = self.kind {
                    if v.kind() != kind {
                        let coerced = coerce(&v, kind).ok_or_else(|| {
                            Error::constraint_at("TYPE", self.path.clone())
                        })?;
                        self.path.set_in_document(doc, coerced)?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Numeric coercion towards a declared kind. Anything else is a type
/// mismatch.
fn coerce(v: &Value, kind: ValueKind) -> Option<Value> {
    match (v, kind) {
        (Value::Integer(n), ValueKind::Double) => Some(Value::Double(*n as f64)),
        (Value::Double(d), ValueKind::Integer) if d.fract() == 0.0 => {
            Some(Value::Integer(*d as i64))
        }
        _ => None,
    }
}

/// A table-level constraint over a list of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConstraint {
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<Path>,
}

impl TableConstraint {
    pub fn primary_key(paths: Vec<Path>) -> TableConstraint {
        TableConstraint {
            primary_key: true,
            unique: false,
            check: None,
            paths,
        }
    }

    pub fn unique(paths: Vec<Path>) -> TableConstraint {
        TableConstraint {
            primary_key: false,
            unique: true,
            check: None,
            paths,
        }
    }

    pub fn check(expr: Expr) -> TableConstraint {
        TableConstraint {
            primary_key: false,
            unique: false,
            check: Some(expr),
            paths: Vec::new(),
        }
    }
}

/// Replace user-declared field constraints by the inferred list: primary
/// key paths become NOT NULL typed fields.
pub fn infer_field_constraints(
    mut field_constraints: Vec<FieldConstraint>,
    table_constraints: &[TableConstraint],
) -> Result<Vec<FieldConstraint>> {
    for tc in table_constraints {
        if !tc.primary_key {
            continue;
        }
        for path in &tc.paths {
            match field_constraints.iter_mut().find(|fc| fc.path == *path) {
                Some(fc) => fc.not_null = true,
                None => {
                    let mut fc = FieldConstraint::new(path.clone());
                    fc.not_null = true;
                    field_constraints.push(fc);
                }
            }
        }
    }
    Ok(field_constraints)
}

/// Validate a document against the constraints, returning the coerced
/// document that should be stored.
pub fn validate_document(
    field_constraints: &[FieldConstraint],
    table_constraints: &[TableConstraint],
    doc: &Document,
) -> Result<Document> {
    let mut out = doc.clone();

    for fc in field_constraints {
        fc.apply(&mut out)?;
    }

    for tc in table_constraints {
        if let Some(check) = &tc.check {
            let mut env = Environment::default();
            env.set_document(out.clone());
            let v = check.eval(&env)?;
            // NULL passes: a check over missing fields is not a violation.
            if !v.is_null() && !v.is_truthy() {
                return Err(Error::constraint("CHECK"));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Expr};
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(&json)
    }

    #[test]
    fn test_not_null_enforced() {
        let fcs = vec![{
            let mut fc = FieldConstraint::new(Path::parse("a").unwrap());
            fc.not_null = true;
            fc
        }];

        let err = validate_document(&fcs, &[], &doc(json!({}))).unwrap_err();
        assert!(err.is_constraint_violation("NOT NULL"), "got {err}");

        let err = validate_document(&fcs, &[], &doc(json!({"a": null}))).unwrap_err();
        assert!(err.is_constraint_violation("NOT NULL"), "got {err}");

        assert!(validate_document(&fcs, &[], &doc(json!({"a": 1}))).is_ok());
    }

    #[test]
    fn test_default_applied_when_missing() {
        let fcs = vec![{
            let mut fc = FieldConstraint::new(Path::parse("a").unwrap());
            fc.default_value = Some(Expr::integer(10));
            fc
        }];

        let out = validate_document(&fcs, &[], &doc(json!({}))).unwrap();
        assert_eq!(out.get("a"), Some(&Value::Integer(10)));

        // An explicit value wins over the default.
        let out = validate_document(&fcs, &[], &doc(json!({"a": 5}))).unwrap();
        assert_eq!(out.get("a"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_type_coercion() {
        let fcs = vec![FieldConstraint::typed(
            Path::parse("a").unwrap(),
            ValueKind::Double,
        )];
        let out = validate_document(&fcs, &[], &doc(json!({"a": 3}))).unwrap();
        assert_eq!(out.get("a"), Some(&Value::Double(3.0)));

        let fcs = vec![FieldConstraint::typed(
            Path::parse("a").unwrap(),
            ValueKind::Integer,
        )];
        let out = validate_document(&fcs, &[], &doc(json!({"a": 3.0}))).unwrap();
        assert_eq!(out.get("a"), Some(&Value::Integer(3)));

        let err = validate_document(&fcs, &[], &doc(json!({"a": "x"}))).unwrap_err();
        assert!(err.is_constraint_violation("TYPE"), "got {err}");
    }

    #[test]
    fn test_check_constraint() {
        let tcs = vec![TableConstraint::check(Expr::binary(
            BinaryOp::Gt,
            Expr::path("a"),
            Expr::integer(0),
        ))];

        assert!(validate_document(&[], &tcs, &doc(json!({"a": 1}))).is_ok());

        let err = validate_document(&[], &tcs, &doc(json!({"a": -1}))).unwrap_err();
        assert!(err.is_constraint_violation("CHECK"), "got {err}");
    }

    #[test]
    fn test_infer_adds_not_null_for_pk_paths() {
        let tcs = vec![TableConstraint::primary_key(vec![
            Path::parse("id").unwrap()
        ])];
        let fcs = infer_field_constraints(Vec::new(), &tcs).unwrap();
        assert_eq!(fcs.len(), 1);
        assert!(fcs[0].not_null);
        assert_eq!(fcs[0].path, Path::parse("id").unwrap());
    }
}
