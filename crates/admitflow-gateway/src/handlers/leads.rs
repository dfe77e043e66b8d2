//! Lead intake and application endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use admitflow_auth::PrincipalResolver;
use admitflow_core::LeadId;
use admitflow_engine::{CreateApplicationRequest, Crm, LeadCandidate};
use admitflow_store::Lead;

use crate::auth::TenantScope;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::GatewayState;

/// Lead list.
#[derive(Debug, Serialize)]
pub struct ListLeadsResponse {
    /// Active leads visible to the caller.
    pub leads: Vec<Lead>,
}

/// Duplicate lookup result.
#[derive(Debug, Serialize)]
pub struct DuplicatesResponse {
    /// Whether any active lead collides.
    pub duplicate: bool,
    /// The colliding leads.
    pub leads: Vec<Lead>,
}

/// `POST /v1/leads`.
///
/// Responds `201` with the enriched lead. A collision responds `409` with the
/// colliding `lead_ids`.
///
/// # Errors
///
/// Returns `ApiError::DuplicateLead` or `ApiError::Validation`.
pub async fn create_lead<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<LeadCandidate>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let lead = state.crm.create_lead(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// `GET /v1/leads`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` for students.
pub async fn list_leads<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let leads = state.crm.list_leads(&ctx).await?;
    Ok(Json(ListLeadsResponse { leads }))
}

/// `GET /v1/leads/:lead_id`.
///
/// # Errors
///
/// Returns `ApiError::NotFound` for leads of another tenant.
pub async fn get_lead<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(lead_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let lead_id: LeadId = parse_id(&lead_id, "lead")?;
    let lead = state.crm.get_lead(&ctx, &lead_id).await?;
    Ok(Json(lead))
}

/// `DELETE /v1/leads/:lead_id`. Soft delete.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` for leads of another sub-account.
pub async fn deactivate_lead<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(lead_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let lead_id: LeadId = parse_id(&lead_id, "lead")?;
    let lead = state.crm.deactivate_lead(&ctx, &lead_id).await?;
    Ok(Json(lead))
}

/// `POST /v1/leads/duplicates`. Checks a candidate without creating it.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn detect_duplicates<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<LeadCandidate>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let leads = state.crm.detect_duplicates(&ctx, &body).await?;
    Ok(Json(DuplicatesResponse {
        duplicate: !leads.is_empty(),
        leads,
    }))
}

/// `POST /v1/applications`.
///
/// # Errors
///
/// Returns `ApiError::Validation` for an inactive lead.
pub async fn create_application<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let application = state.crm.create_application(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(application)))
}
