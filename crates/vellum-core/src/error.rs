//! Error types for all VellumDB operations.

use thiserror::Error;

use crate::value::Path;

/// Top-level error type for VellumDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A table, index or sequence is missing from the catalog.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A catalog object with the same name already exists. Name uniqueness
    /// is global across tables, indexes and sequences.
    #[error("{name} already exists")]
    AlreadyExists { name: String },

    #[error("{constraint} constraint violation{}", .path.as_ref().map(|p| format!(" on path {p}")).unwrap_or_default())]
    ConstraintViolation {
        constraint: &'static str,
        path: Option<Path>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot write in read-only mode")]
    ReadOnly,

    /// A low-level KV miss, distinct from `NotFound` which concerns catalog
    /// objects. Statement execution translates this into `NotFound` where
    /// a catalog object was being looked up.
    #[error("key not found")]
    KeyNotFound,

    /// Cooperative "stop producing" signal used by stream consumers.
    /// Never surfaced to callers.
    #[error("stream closed")]
    StreamClosed,

    #[error("operation interrupted")]
    Interrupted,

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("NaN is not a valid value")]
    NaN,

    #[error("invalid type tag: {0}")]
    InvalidTag(u8),

    #[error("malformed encoded value")]
    Malformed,
}

impl Error {
    /// Build a `ConstraintViolation` without a path.
    pub(crate) fn constraint(constraint: &'static str) -> Error {
        Error::ConstraintViolation {
            constraint,
            path: None,
        }
    }

    /// Build a `ConstraintViolation` anchored to a document path.
    pub(crate) fn constraint_at(constraint: &'static str, path: Path) -> Error {
        Error::ConstraintViolation {
            constraint,
            path: Some(path),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    pub fn is_constraint_violation(&self, constraint: &str) -> bool {
        matches!(self, Error::ConstraintViolation { constraint: c, .. } if *c == constraint)
    }

    pub fn is_stream_closed(&self) -> bool {
        matches!(self, Error::StreamClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
