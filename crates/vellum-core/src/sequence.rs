//! Monotonic integer sequences.
//!
//! Sequence state lives in the dedicated sequence namespace keyed by the
//! sequence name. Every allocation reads, increments and writes through
//! the transaction batch, so an aborted transaction rolls the allocation
//! back with everything else; consumers must not assume gap-free values.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::database::Transaction;
use crate::encoding::key::encode_key;
use crate::encoding::value::{decode_value, encode_value};
use crate::error::{Error, Result};
use crate::kv::SEQUENCE_NAMESPACE;
use crate::schema::Owner;
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub name: String,
    pub start: i64,
    pub min: i64,
    pub max: i64,
    pub increment_by: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl SequenceInfo {
    pub fn new(name: impl Into<String>) -> SequenceInfo {
        SequenceInfo {
            name: name.into(),
            start: 1,
            min: 1,
            max: i64::MAX,
            increment_by: 1,
            owner: None,
        }
    }
}

impl fmt::Display for SequenceInfo {
    /// Canonical `CREATE SEQUENCE` rendering stored in the catalog's
    /// `sql` column.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CREATE SEQUENCE {} INCREMENT BY {} MINVALUE {} MAXVALUE {} START WITH {}",
            self.name, self.increment_by, self.min, self.max, self.start
        )
    }
}

pub struct Sequence {
    pub info: Arc<SequenceInfo>,
}

impl Sequence {
    pub fn new(info: Arc<SequenceInfo>) -> Sequence {
        Sequence { info }
    }

    fn state_key(&self) -> Result<Vec<u8>> {
        Ok(encode_key(&[Value::Text(self.info.name.clone())])?)
    }

    /// The value most recently returned by `next`, when any.
    pub fn current(&self, tx: &Transaction) -> Result<Option<i64>> {
        let ns = tx.session().namespace(SEQUENCE_NAMESPACE);
        match ns.get(&self.state_key()?) {
            Ok(bytes) => match decode_value(&bytes)? {
                (Value::Integer(n), _) => Ok(Some(n)),
                _ => Err(Error::Encoding(crate::error::EncodingError::Malformed)),
            },
            Err(Error::KeyNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Allocate the next value: read, increment, persist, return.
    pub fn next(&self, tx: &Transaction) -> Result<i64> {
        let next = match self.current(tx)? {
            None => self.info.start,
            Some(current) => current
                .checked_add(self.info.increment_by)
                .filter(|n| *n >= self.info.min && *n <= self.info.max)
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("sequence {} exhausted", self.info.name))
                })?,
        };

        let mut buf = Vec::new();
        encode_value(&mut buf, &Value::Integer(next))?;
        tx.session()
            .namespace(SEQUENCE_NAMESPACE)
            .put(&self.state_key()?, &buf)?;

        Ok(next)
    }

    /// Remove the persisted state; called when the sequence is dropped.
    pub fn drop_state(&self, tx: &Transaction) -> Result<()> {
        let ns = tx.session().namespace(SEQUENCE_NAMESPACE);
        match ns.delete(&self.state_key()?) {
            Ok(()) | Err(Error::KeyNotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
