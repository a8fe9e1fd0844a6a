//! # Container Errors
//!
//! Error types for the multi-index container. Every condition here is an
//! ordinary contract violation surfaced to the immediate caller; none is
//! fatal and the container never retries or recovers on its own.

use thiserror::Error;

use crate::key::IndexKey;

/// Result type for container operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Contract errors surfaced by the container and its indexes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// `add_index` with a name that is already registered
    #[error("index already registered: {0}")]
    DuplicateIndexName(String),

    /// Named accessor for an unregistered index
    #[error("no index named: {0}")]
    IndexNotFound(String),

    /// Delete against a key that is absent from an index
    #[error("key {key} not found in index {index}")]
    KeyNotFound {
        /// Index that rejected the operation
        index: String,
        /// The extracted key that was not present
        key: IndexKey,
    },

    /// Delete that found the key run but not the exact record value
    #[error("record not found in index {index}")]
    RecordNotFound {
        /// Index that rejected the operation
        index: String,
    },
}
