//! API error types and responses.
//!
//! Every error renders as `{"error": {"code", "message"}}`; duplicate-lead
//! conflicts add `lead_ids` so a client can offer a merge.

use admitflow_auth::AuthError;
use admitflow_core::LeadId;
use admitflow_engine::CrmError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication token.
    #[error("unauthorized")]
    Unauthorized,

    /// The principal may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The lead already exists.
    #[error("lead already exists")]
    DuplicateLead {
        /// The colliding leads.
        lead_ids: Vec<LeadId>,
    },

    /// Too many requests, rate limit exceeded.
    #[error("rate limited")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },

    /// Storage collaborator failure.
    #[error("storage error")]
    Storage,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lead_ids: Option<Vec<LeadId>>,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::DuplicateLead { .. } => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) | Self::DuplicateLead { .. } => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Storage => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let retry_after = match &self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let lead_ids = match self {
            Self::DuplicateLead { lead_ids } => Some(lead_ids),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                lead_ids,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidSignature
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::InvalidUserId
            | AuthError::InvalidTenantId
            | AuthError::InvalidSubAccountId
            | AuthError::InvalidRole(_)
            | AuthError::InvalidToken(_) => {
                tracing::debug!(error = %err, "Rejected bearer token");
                Self::Unauthorized
            }
            AuthError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            AuthError::MissingSecret | AuthError::Internal(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Unauthorized => Self::Unauthorized,
            CrmError::Forbidden(msg) => Self::Forbidden(msg),
            CrmError::NotFound(what) => Self::NotFound(what.to_string()),
            CrmError::Validation(msg) => Self::Validation(msg),
            CrmError::Conflict(msg) => Self::Conflict(msg),
            CrmError::DuplicateLead { lead_ids } => Self::DuplicateLead { lead_ids },
            CrmError::Storage(store_err) => {
                tracing::error!(error = %store_err, "Store error");
                Self::Storage
            }
        }
    }
}
