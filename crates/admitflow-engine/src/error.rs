//! Error types for the CRM engine.
//!
//! Every failure maps to one [`ErrorKind`] with a stable machine-readable code.
//! Duplicate-lead conflicts additionally carry the colliding lead ids.

use admitflow_core::LeadId;
use admitflow_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A result type using `CrmError`.
pub type Result<T> = std::result::Result<T, CrmError>;

/// Stable classification of a [`CrmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No valid principal.
    Unauthorized,
    /// Valid principal, insufficient role or ownership.
    Forbidden,
    /// Resource absent or in another tenant.
    NotFound,
    /// Malformed input.
    #[serde(rename = "validation_error")]
    Validation,
    /// Duplicate record or concurrent modification.
    Conflict,
    /// Collaborator failure.
    #[serde(rename = "storage_error")]
    Storage,
}

impl ErrorKind {
    /// The machine-readable code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Validation => "validation_error",
            Self::Conflict => "conflict",
            Self::Storage => "storage_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in CRM operations.
#[derive(Debug, Error)]
pub enum CrmError {
    /// No authenticated principal.
    #[error("authentication required")]
    Unauthorized,

    /// The principal may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The resource does not exist or is not visible to the principal.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A lead with the same identity already exists in the tenant.
    #[error("duplicate lead: matches {} existing lead(s)", lead_ids.len())]
    DuplicateLead {
        /// The colliding leads.
        lead_ids: Vec<LeadId>,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for CrmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("record"),
            StoreError::AlreadyExists(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::StatusConflict { expected, actual } => Self::Conflict(format!(
                "item is in stage {actual}, expected {expected}"
            )),
            limit @ StoreError::LimitReached { .. } => Self::Validation(limit.to_string()),
            other @ (StoreError::Database(_) | StoreError::Serialization(_)) => {
                tracing::error!(error = %other, "Storage failure");
                Self::Storage(other)
            }
        }
    }
}

impl CrmError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) | Self::DuplicateLead { .. } => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}
