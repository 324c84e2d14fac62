//! Error types for the log engine.

use crate::types::EntryKind;
use std::io;
use thiserror::Error;

/// Result type for log store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in log store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] quill_storage::StorageError),

    /// I/O error.
    ///
    /// Propagated as-is: the engine never retries I/O itself.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record failed structural validation on decode.
    ///
    /// At the tail of the most recent segment during recovery this is
    /// the expected signature of a torn write and is repaired by
    /// truncation. Anywhere else it is fatal.
    #[error("log corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected on decode.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed from the record bytes.
        actual: u32,
    },

    /// Requested index is below the retention watermark or above the
    /// last index. Callers fall back to a snapshot/state-transfer path.
    #[error("entry not found: index {index} in {kind} log")]
    NotFound {
        /// The kind that was queried.
        kind: EntryKind,
        /// The index that was not found.
        index: u64,
    },

    /// An explicit-index append did not match the expected next index.
    #[error("out-of-order append: expected index {expected}, got {actual}")]
    OutOfOrderAppend {
        /// The next index the store would assign.
        expected: u64,
        /// The index the caller supplied.
        actual: u64,
    },

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: EntryKind, index: u64) -> Self {
        Self::NotFound { kind, index }
    }
}
