//! Tenant, sub-account and user endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use admitflow_auth::PrincipalResolver;
use admitflow_core::{Role, SubAccountId, TenantId, UserId};
use admitflow_engine::{
    CreateSubAccountRequest, CreateUserRequest, Crm, RegisterTenantRequest, TenantContext,
};
use admitflow_store::{Activity, SubAccount, Tenant};

use crate::auth::TenantScope;
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Response Types
// =============================================================================

/// The caller's resolved context.
#[derive(Debug, Serialize)]
pub struct ContextResponse {
    /// Tenant of the caller.
    pub tenant_id: TenantId,
    /// Sub-account of the caller, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// The caller.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
    /// Whether queries are narrowed to the sub-account.
    pub sub_account_scoped: bool,
    /// The tenant record.
    pub tenant: Tenant,
    /// The sub-account record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<SubAccount>,
}

impl From<TenantContext> for ContextResponse {
    fn from(ctx: TenantContext) -> Self {
        let sub_account_scoped = ctx.scope().sub_account_id.is_some();
        Self {
            tenant_id: ctx.tenant_id,
            sub_account_id: ctx.sub_account_id,
            user_id: ctx.user_id,
            role: ctx.user_role,
            sub_account_scoped,
            tenant: ctx.tenant,
            sub_account: ctx.sub_account,
        }
    }
}

/// Sub-account list.
#[derive(Debug, Serialize)]
pub struct ListSubAccountsResponse {
    /// Visible sub-accounts, by name.
    pub sub_accounts: Vec<SubAccount>,
}

/// Activity feed.
#[derive(Debug, Serialize)]
pub struct ListActivitiesResponse {
    /// Visible activities, newest first.
    pub activities: Vec<Activity>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /v1/tenants`. Public sign-up of an agency and its first admin.
///
/// # Errors
///
/// Returns `ApiError::Validation` for a blank name or admin email.
pub async fn register_tenant<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    Json(body): Json<RegisterTenantRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let registration = state.crm.register_tenant(body).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// `GET /v1/context`.
pub async fn get_context(TenantScope(ctx): TenantScope) -> Json<ContextResponse> {
    Json(ContextResponse::from(ctx))
}

/// `GET /v1/sub-accounts`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` for students.
pub async fn list_sub_accounts<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let sub_accounts = state.crm.list_sub_accounts(&ctx).await?;
    Ok(Json(ListSubAccountsResponse { sub_accounts }))
}

/// `POST /v1/sub-accounts`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` unless the caller is a tenant admin.
pub async fn create_sub_account<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<CreateSubAccountRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let sub_account = state.crm.create_sub_account(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(sub_account)))
}

/// `POST /v1/users`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` when granting a role above the caller's.
pub async fn create_user<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let user = state.crm.create_user(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /v1/activities`.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list_activities<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let activities = state.crm.list_activities(&ctx).await?;
    Ok(Json(ListActivitiesResponse { activities }))
}
