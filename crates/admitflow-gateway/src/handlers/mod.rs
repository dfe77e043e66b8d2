//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod health;
pub mod leads;
pub mod pipelines;
pub mod tenants;

use std::str::FromStr;

use crate::error::ApiError;

/// Parse an identifier taken from a path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("invalid {what} id: {raw}")))
}
