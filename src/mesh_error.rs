//! ExodusError: unified error type for exodus-sieve public APIs
//!
//! Every fallible operation in the catalog, cache, and assembly layers returns
//! this type. Recoverable conditions are also collected as warnings by
//! [`ExodusReader`](crate::reader::ExodusReader) rather than aborting a request.

use crate::catalog::object::ObjectType;
use thiserror::Error;

/// Unified error type for exodus-sieve operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExodusError {
    /// The backing store could not be opened. Fatal; no reader state is created.
    #[error("cannot open `{path}`: {reason}")]
    FileOpen { path: String, reason: String },

    /// Object or variable metadata could not be enumerated. When
    /// `object_type` is set only that type is skipped.
    #[error("metadata read failed{}: {reason}", .object_type.map(|t| format!(" for {t}")).unwrap_or_default())]
    MetadataRead {
        object_type: Option<ObjectType>,
        reason: String,
    },

    /// A single array request failed. No cache entry is created for it.
    #[error("cannot read {what}: {reason}")]
    ArrayRead { what: String, reason: String },

    /// Two object types disagree about the shape or storage of one array name.
    #[error("inconsistent schema for array `{array}`: {reason}")]
    InconsistentSchema { array: String, reason: String },

    /// A catalog accessor was called with an index outside its collection.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Connectivity referenced a node that the model does not have.
    #[error("node reference {raw} outside the model's {num_nodes} nodes")]
    InvalidPointReference { raw: i64, num_nodes: usize },

    /// Syntax error while parsing a text store.
    #[error("parse error: {0}")]
    Parse(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExodusError {
    fn from(e: std::io::Error) -> Self {
        ExodusError::Io(e.to_string())
    }
}

impl ExodusError {
    /// Shorthand for an [`ExodusError::ArrayRead`] with owned context.
    pub fn array_read(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ExodusError::ArrayRead {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a per-type [`ExodusError::MetadataRead`].
    pub fn metadata(object_type: Option<ObjectType>, reason: impl Into<String>) -> Self {
        ExodusError::MetadataRead {
            object_type,
            reason: reason.into(),
        }
    }

    /// True for the only globally fatal condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExodusError::FileOpen { .. })
    }
}
