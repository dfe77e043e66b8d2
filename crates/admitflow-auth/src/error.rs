//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving a principal or admitting a request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("missing bearer token")]
    MissingToken,

    /// The JWT has expired.
    #[error("token expired")]
    TokenExpired,

    /// The JWT signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// The JWT issuer does not match the expected value.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The JWT audience does not match the expected value.
    #[error("invalid audience")]
    InvalidAudience,

    /// The user ID in the token is malformed.
    #[error("invalid user ID format")]
    InvalidUserId,

    /// The tenant ID in the token is malformed.
    #[error("invalid tenant ID format")]
    InvalidTenantId,

    /// The sub-account ID in the token is malformed.
    #[error("invalid sub-account ID format")]
    InvalidSubAccountId,

    /// The role claim names no known role.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// The token format is invalid.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// Too many requests in the current window.
    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },

    /// No signing secret is configured.
    #[error("AUTH_SECRET is not set")]
    MissingSecret,

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
