//! Authentication extractors.
//!
//! [`AuthUser`] validates the `Authorization: Bearer <token>` header, resolves
//! it into a principal and charges the principal's rate-limit window.
//! [`TenantScope`] builds on it to load the per-request tenant context.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use admitflow_auth::PrincipalResolver;
use admitflow_core::Principal;
use admitflow_engine::{Crm, TenantContext};

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated, rate-limited principal.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The resolved principal.
    pub principal: Principal,
}

impl AuthUser {
    fn rate_limit_key(&self) -> String {
        format!("principal:{}", self.principal.user_id)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized)
}

#[async_trait]
impl<C, R> FromRequestParts<Arc<GatewayState<C, R>>> for AuthUser
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, R>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let principal = state.resolver.resolve(token).await?;
        let user = Self { principal };

        state.rate_limiter.check(&user.rate_limit_key()).await?;

        Ok(user)
    }
}

/// The tenant context of an authenticated request.
///
/// Rebuilt on every request, so role and sub-account changes apply at once.
#[derive(Debug, Clone)]
pub struct TenantScope(pub TenantContext);

#[async_trait]
impl<C, R> FromRequestParts<Arc<GatewayState<C, R>>> for TenantScope
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, R>>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let ctx = state.crm.resolve_context(Some(&user.principal)).await?;
        Ok(Self(ctx))
    }
}
