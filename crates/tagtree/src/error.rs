//! Error kinds reported by store decoding and cursor navigation.

use thiserror::Error;

use crate::format::Tag;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Navigation and decoding errors.
///
/// The default-returning cursor methods swallow these after reporting them
/// through `tracing`; the `try_*` methods hand them to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The cursor points at nothing.
    #[error("invalid cursor")]
    InvalidCursor,

    /// The node kind does not support the requested operation or conversion.
    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: &'static str, found: Tag },

    #[error("index {index} out of range (size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("key not found: {0:?}")]
    KeyNotFound(String),

    /// A REFERENCE node whose alias target is invalid or loops.
    #[error("unresolved reference at offset {offset} in store '{store}'")]
    UnresolvedReference { store: String, offset: usize },

    /// Bytes that do not decode as a node.
    #[error("malformed node at offset {offset}: {reason}")]
    MalformedNode { offset: usize, reason: String },

    #[error("string of {len} bytes exceeds the encodable maximum")]
    StringTooLong { len: usize },
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedNode {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: Tag) -> Self {
        Error::KindMismatch { expected, found }
    }

    /// `true` for the absent-path outcomes callers are expected to chain through.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::InvalidCursor
                | Error::KindMismatch { .. }
                | Error::IndexOutOfRange { .. }
                | Error::KeyNotFound(_)
        )
    }
}

/// Sends an error swallowed by a default-returning method to the diagnostic channel.
pub(crate) fn report(op: &'static str, err: &Error) {
    if err.is_not_found() {
        tracing::debug!(op, error = %err, "cursor read fell back to default");
    } else {
        tracing::warn!(op, error = %err, "cursor read failed");
    }
}
