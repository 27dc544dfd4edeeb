//! Per-row scope threaded through a pipeline.
//!
//! Each operator receives an immutable outer environment and produces a
//! new one holding the current document and named slots. Environments nest
//! through an outer chain rather than flattening, so inner scopes can
//! still reach the transaction and slots set upstream.

use crate::database::Transaction;
use crate::error::{Error, Result};
use crate::value::{Document, Value};

/// Slot holding the name of the table the current row belongs to.
pub const TABLE_KEY: &str = "@table";
/// Slot holding the primary key (as a blob) of the current row.
pub const DOC_PK_KEY: &str = "@pk";

#[derive(Default)]
pub struct Environment<'e> {
    outer: Option<&'e Environment<'e>>,
    tx: Option<&'e Transaction>,
    doc: Option<Document>,
    vars: Vec<(&'static str, Value)>,
}

impl<'e> Environment<'e> {
    /// The root environment of a statement execution.
    pub fn root(tx: &'e Transaction) -> Environment<'e> {
        Environment {
            tx: Some(tx),
            ..Default::default()
        }
    }

    /// A child environment chained to `outer`.
    pub fn wrap(outer: &'e Environment<'e>) -> Environment<'e> {
        Environment {
            outer: Some(outer),
            ..Default::default()
        }
    }

    pub fn set_document(&mut self, doc: Document) {
        self.doc = Some(doc);
    }

    pub fn take_document(&mut self) -> Option<Document> {
        self.doc.take()
    }

    /// The current document, looked up through the outer chain.
    pub fn document(&self) -> Option<&Document> {
        match &self.doc {
            Some(d) => Some(d),
            None => self.outer.and_then(|o| o.document()),
        }
    }

    pub fn set_var(&mut self, key: &'static str, value: Value) {
        if let Some(slot) = self.vars.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.vars.push((key, value));
        }
    }

    /// A named slot, looked up through the outer chain.
    pub fn get_var(&self, key: &str) -> Option<&Value> {
        match self.vars.iter().find(|(k, _)| *k == key) {
            Some((_, v)) => Some(v),
            None => self.outer.and_then(|o| o.get_var(key)),
        }
    }

    /// The transaction, looked up through the outer chain.
    pub fn tx(&self) -> Result<&'e Transaction> {
        match self.tx {
            Some(tx) => Ok(tx),
            None => self
                .outer
                .ok_or_else(|| Error::InvalidArgument("no transaction in scope".to_string()))?
                .tx(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_resolves_through_outer_chain() {
        let mut outer = Environment::default();
        outer.set_var(TABLE_KEY, Value::Text("foo".into()));
        let mut outer_doc = Document::new();
        outer_doc.set("a".to_string(), Value::Integer(1));
        outer.set_document(outer_doc);

        let mut inner = Environment::wrap(&outer);
        assert_eq!(
            inner.get_var(TABLE_KEY),
            Some(&Value::Text("foo".into())),
            "vars must resolve through the outer chain"
        );
        assert!(inner.document().is_some());

        // Shadowing in the inner scope wins.
        let mut shadow = Document::new();
        shadow.set("a".to_string(), Value::Integer(2));
        inner.set_document(shadow);
        assert_eq!(
            inner.document().unwrap().get("a"),
            Some(&Value::Integer(2))
        );
        assert_eq!(
            outer.document().unwrap().get("a"),
            Some(&Value::Integer(1))
        );
    }
}
