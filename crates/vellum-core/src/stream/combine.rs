//! Stream combinators: sequential concatenation and distinct union.

use crate::encoding::key::encode_key;
use crate::encoding::value::encode_value;
use crate::error::Result;
use crate::kv::TransientStore;
use crate::value::Value;

use super::env::{Environment, DOC_PK_KEY, TABLE_KEY};
use super::table::missing_document;
use super::{IterFn, Stream};

/// Sequentially yield every row of each substream.
pub(super) fn iterate_concat(
    streams: &[Stream],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    for s in streams {
        s.iterate(env, &mut *f)?;
    }
    Ok(())
}

/// Distinct union: yield rows of every substream, skipping duplicates.
///
/// Rows coming from a table dedupe on `(table, key)`; rows without a key
/// dedupe on their encoded document.
pub(super) fn iterate_union(
    streams: &[Stream],
    env: &Environment<'_>,
    f: IterFn<'_>,
) -> Result<()> {
    let mut seen = TransientStore::new();

    for s in streams {
        s.iterate(env, &mut |out| {
            let dedup_key = match (out.get_var(TABLE_KEY), out.get_var(DOC_PK_KEY)) {
                (Some(Value::Text(table)), Some(Value::Blob(pk))) => encode_key(&[
                    Value::Text(table.clone()),
                    Value::Blob(pk.clone()),
                ])?,
                _ => {
                    let doc = out.document().ok_or_else(missing_document)?;
                    let mut buf = Vec::new();
                    encode_value(&mut buf, &Value::Document(doc.clone()))?;
                    buf
                }
            };

            if seen.contains(&dedup_key) {
                return Ok(());
            }
            seen.insert(dedup_key, vec![0x00]);
            f(out)
        })?;
    }

    Ok(())
}
