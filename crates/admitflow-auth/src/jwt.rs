//! Principal resolution from bearer tokens.
//!
//! The resolver performs a pure lookup: it verifies the token and turns its
//! claims into a [`Principal`]. Whether the tenant or sub-account still exists
//! is decided later, when the tenant context is built.

use std::str::FromStr;

use admitflow_core::{Principal, Role, SubAccountId, TenantId, UserId};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Trait for turning a bearer token into a principal.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Verify a token and extract the principal it names.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or names malformed ids.
    async fn resolve(&self, token: &str) -> Result<Principal>;
}

/// Claims carried by an admitflow access token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject (`user_id` as UUID string).
    sub: String,
    tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_account_id: Option<String>,
    role: String,
    iss: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// HS256 JWT principal resolver.
pub struct JwtPrincipalResolver {
    config: AuthConfig,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
}

impl JwtPrincipalResolver {
    /// Create a resolver from the shared secret, issuer and audience.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            decoding_key,
            encoding_key,
        }
    }

    /// Issue a signed token for a principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id.to_string(),
            tenant_id: principal.tenant_id.to_string(),
            sub_account_id: principal.sub_account_id.map(|id| id.to_string()),
            role: principal.role.as_str().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

#[async_trait]
impl PrincipalResolver for JwtPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                    jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })?;

        principal_from_parts(
            &token_data.claims.sub,
            &token_data.claims.tenant_id,
            &token_data.claims.role,
            token_data.claims.sub_account_id.as_deref(),
        )
    }
}

fn principal_from_parts(
    user: &str,
    tenant: &str,
    role: &str,
    sub_account: Option<&str>,
) -> Result<Principal> {
    let user_id = UserId::from_str(user).map_err(|_| AuthError::InvalidUserId)?;
    let tenant_id = TenantId::from_str(tenant).map_err(|_| AuthError::InvalidTenantId)?;
    let role = Role::from_str(role).map_err(|e| AuthError::InvalidRole(e.0))?;

    let mut principal = Principal::new(user_id, tenant_id, role);
    if let Some(sub) = sub_account {
        let sub_account_id =
            SubAccountId::from_str(sub).map_err(|_| AuthError::InvalidSubAccountId)?;
        principal = principal.in_sub_account(sub_account_id);
    }
    Ok(principal)
}

/// A mock principal resolver for testing.
///
/// Accepts tokens of the form
/// `test-token:<user_uuid>:<tenant_uuid>:<role>[:<sub_account_uuid>]`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockPrincipalResolver;

#[cfg(any(test, feature = "test-utils"))]
impl MockPrincipalResolver {
    /// Build the token that resolves to `principal`.
    #[must_use]
    pub fn token_for(principal: &Principal) -> String {
        let mut token = format!(
            "test-token:{}:{}:{}",
            principal.user_id, principal.tenant_id, principal.role
        );
        if let Some(sub) = principal.sub_account_id {
            token.push(':');
            token.push_str(&sub.to_string());
        }
        token
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PrincipalResolver for MockPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<Principal> {
        const FORMAT: &str = "expected test-token:<user>:<tenant>:<role>[:<sub_account>]";

        let rest = token
            .strip_prefix("test-token:")
            .ok_or_else(|| AuthError::InvalidToken(FORMAT.to_string()))?;

        let parts: Vec<&str> = rest.split(':').collect();
        match parts.as_slice() {
            [user, tenant, role] => principal_from_parts(user, tenant, role, None),
            [user, tenant, role, sub] => principal_from_parts(user, tenant, role, Some(*sub)),
            _ => Err(AuthError::InvalidToken(FORMAT.to_string())),
        }
    }
}
