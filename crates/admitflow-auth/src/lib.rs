//! Principal resolution and rate limiting for admitflow.
//!
//! This crate turns bearer tokens into [`Principal`](admitflow_core::Principal)
//! values and decides whether a principal may issue another request:
//!
//! - HS256 JWT verification with issuer and audience checks
//! - Claims extraction into the `(user, tenant, sub-account?, role)` tuple
//! - Fixed-window rate limiting over an injected counter store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────────┐
//! │   Gateway        │────▶│  PrincipalResolver  │
//! │   (HTTP)         │     │  (trait)            │
//! └────────┬─────────┘     └──────────┬──────────┘
//!          │                          │
//!          │               ┌──────────▼──────────┐
//!          │               │ JwtPrincipalResolver│
//!          │               └─────────────────────┘
//!          │
//! ┌────────▼─────────┐     ┌─────────────────────┐
//! │   RateLimiter    │────▶│  RateLimitStore     │
//! └──────────────────┘     │  (trait)            │
//!                          └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use admitflow_auth::{AuthConfig, JwtPrincipalResolver, PrincipalResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = JwtPrincipalResolver::new(AuthConfig::from_env()?);
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...";
//! let principal = resolver.resolve(token).await?;
//!
//! println!("Tenant: {}", principal.tenant_id);
//! println!("Role: {}", principal.role);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;
pub mod ratelimit;

pub use error::{AuthError, Result};
pub use jwt::{JwtPrincipalResolver, PrincipalResolver};
pub use ratelimit::{InMemoryRateLimitStore, RateLimitStore, RateLimiter, WindowCount};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockPrincipalResolver;

/// Token verification settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 shared secret.
    pub secret: String,
    /// Expected JWT issuer (`iss` claim).
    pub issuer: String,
    /// Expected JWT audience (`aud` claim).
    pub audience: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl AuthConfig {
    /// Issuer expected when `AUTH_ISSUER` is unset.
    pub const DEFAULT_ISSUER: &'static str = "admitflow";
    /// Audience expected when `AUTH_AUDIENCE` is unset.
    pub const DEFAULT_AUDIENCE: &'static str = "admitflow-api";

    /// Settings for `secret` with the default issuer and audience.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: Self::DEFAULT_ISSUER.to_string(),
            audience: Self::DEFAULT_AUDIENCE.to_string(),
        }
    }

    /// Read `AUTH_SECRET`, `AUTH_ISSUER` and `AUTH_AUDIENCE`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingSecret` if `AUTH_SECRET` is unset or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingSecret` if `AUTH_SECRET` is unset or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = lookup("AUTH_SECRET")
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(AuthError::MissingSecret)?;

        let mut config = Self::new(secret);
        if let Some(issuer) = lookup("AUTH_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(audience) = lookup("AUTH_AUDIENCE") {
            config.audience = audience;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_issuer_and_audience() {
        let config = AuthConfig::new("s3cret");
        assert_eq!(config.issuer, "admitflow");
        assert_eq!(config.audience, "admitflow-api");
    }

    #[test]
    fn debug_redacts_secret() {
        let config = AuthConfig::new("do-not-print-me");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("do-not-print-me"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn lookup_requires_a_secret() {
        assert!(matches!(
            AuthConfig::from_lookup(|_| None),
            Err(AuthError::MissingSecret)
        ));
        assert!(matches!(
            AuthConfig::from_lookup(|key| (key == "AUTH_SECRET").then(|| "  ".to_string())),
            Err(AuthError::MissingSecret)
        ));
    }

    #[test]
    fn lookup_overrides_issuer_and_audience() {
        let config = AuthConfig::from_lookup(|key| match key {
            "AUTH_SECRET" => Some("s3cret".to_string()),
            "AUTH_AUDIENCE" => Some("portal".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.secret, "s3cret");
        assert_eq!(config.issuer, "admitflow");
        assert_eq!(config.audience, "portal");
    }
}
