//! External sort through a transient store.
//!
//! Rows are buffered under `(encode(sort_value), counter)` keys so the
//! scratch store hands them back in codec order; a trailing counter keeps
//! duplicate sort keys stable. The payload carries the row's table, key
//! and document so the drain rebuilds the environment downstream
//! operators expect.

use crate::encoding::value::{decode_value, encode_value};
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::kv::TransientStore;
use crate::value::Value;

use super::env::{Environment, DOC_PK_KEY, TABLE_KEY};
use super::{iterate_ops, IterFn, Operator};

pub(super) fn iterate_temp_tree_sort(
    expr: &Expr,
    reverse: bool,
    prev: &[Operator],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let mut store = TransientStore::new();
    let mut counter: u64 = 0;

    iterate_ops(prev, env, &mut |out| {
        let sort_value = expr.eval(out)?;
        let doc = out.document().ok_or_else(super::table::missing_document)?;

        let mut key = Vec::new();
        encode_value(&mut key, &sort_value)?;
        key.extend_from_slice(&counter.to_be_bytes());
        counter += 1;

        let table = out.get_var(TABLE_KEY).cloned().unwrap_or(Value::Null);
        let pk = out.get_var(DOC_PK_KEY).cloned().unwrap_or(Value::Null);
        let mut payload = Vec::new();
        encode_value(
            &mut payload,
            &Value::Array(vec![table, pk, Value::Document(doc.clone())]),
        )?;

        store.insert(key, payload);
        Ok(())
    })?;

    let mut new_env = Environment::wrap(env);

    let entries: Vec<&Vec<u8>> = if reverse {
        store.iter_rev().map(|(_, v)| v).collect()
    } else {
        store.iter().map(|(_, v)| v).collect()
    };

    for payload in entries {
        let (value, _) = decode_value(payload)?;
        let mut parts = match value {
            Value::Array(parts) if parts.len() == 3 => parts,
            _ => return Err(Error::Encoding(crate::error::EncodingError::Malformed)),
        };

        let doc = match parts.pop() {
            Some(Value::Document(d)) => d,
            _ => return Err(Error::Encoding(crate::error::EncodingError::Malformed)),
        };
        let pk = parts.pop().expect("three components");
        let table = parts.pop().expect("three components");

        if !table.is_null() {
            new_env.set_var(TABLE_KEY, table);
        }
        if !pk.is_null() {
            new_env.set_var(DOC_PK_KEY, pk);
        }
        new_env.set_document(doc);
        f(&new_env)?;
    }

    Ok(())
}
