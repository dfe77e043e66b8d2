//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint would be violated.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The item's stage changed since the caller read it.
    #[error("status conflict: expected {expected}, found {actual}")]
    StatusConflict {
        /// The stage the caller assumed.
        expected: String,
        /// The stage currently stored.
        actual: String,
    },

    /// A per-tenant record limit would be exceeded.
    #[error("{what} limit of {limit} reached")]
    LimitReached {
        /// The limited record family.
        what: &'static str,
        /// The configured maximum.
        limit: usize,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
