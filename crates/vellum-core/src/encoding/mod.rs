//! Order-preserving binary codec.
//!
//! For any two values `a` and `b` of the same kind,
//! `lex_compare(encode(a), encode(b)) == logical_compare(a, b)`. The
//! encoding is what makes index and primary-key range scans work: byte
//! order over encoded keys is logical order within each type tag.

pub mod bytes;
pub mod key;
pub mod number;
pub mod value;

use crate::value::ValueKind;

// Type tags. Terminators sort below every value tag so that an array (or
// document) that is a prefix of another sorts first.
pub const TAG_ARRAY_END: u8 = 0x01;
pub const TAG_DOC_END: u8 = 0x02;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_FALSE: u8 = 0x06;
pub const TAG_TRUE: u8 = 0x07;
pub const TAG_INTEGER: u8 = 0x08;
pub const TAG_DOUBLE: u8 = 0x09;
pub const TAG_TEXT: u8 = 0x0A;
pub const TAG_BLOB: u8 = 0x0B;
pub const TAG_ARRAY_START: u8 = 0x0C;
pub const TAG_DOC_START: u8 = 0x0D;

/// The tag that starts the encoding of any value of the given kind.
pub fn kind_tag(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Null => TAG_NULL,
        ValueKind::Bool => TAG_FALSE,
        ValueKind::Integer => TAG_INTEGER,
        ValueKind::Double => TAG_DOUBLE,
        ValueKind::Text => TAG_TEXT,
        ValueKind::Blob => TAG_BLOB,
        ValueKind::Array => TAG_ARRAY_START,
        ValueKind::Document => TAG_DOC_START,
    }
}

/// Smallest key that any value of the given kind can encode to.
pub fn min_key_for_kind(kind: ValueKind) -> Vec<u8> {
    vec![kind_tag(kind)]
}

/// Exclusive upper bound over every value of the given kind. Booleans use
/// two tags (false and true), so their bound sits past the true tag.
pub fn max_key_for_kind(kind: ValueKind) -> Vec<u8> {
    match kind {
        ValueKind::Bool => vec![TAG_TRUE + 1],
        other => vec![kind_tag(other) + 1],
    }
}
