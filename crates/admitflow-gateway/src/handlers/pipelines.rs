//! Pipeline, stage move and analytics endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use admitflow_auth::PrincipalResolver;
use admitflow_core::{ItemId, PipelineId, SubAccountId, UserId};
use admitflow_engine::{BulkItemResult, CreatePipelineRequest, Crm};
use admitflow_store::{Pipeline, PipelineType};

use crate::auth::TenantScope;
use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Pipeline list.
#[derive(Debug, Serialize)]
pub struct ListPipelinesResponse {
    /// Visible pipelines.
    pub pipelines: Vec<Pipeline>,
}

/// Body of `POST /v1/pipelines/defaults`.
#[derive(Debug, Deserialize)]
pub struct CreateDefaultPipelineBody {
    /// Lead or application.
    pub pipeline_type: PipelineType,
    /// Target sub-account; omitted for the tenant-level default.
    #[serde(default)]
    pub sub_account_id: Option<SubAccountId>,
}

/// Body of a single-item move.
#[derive(Debug, Deserialize)]
pub struct MoveItemBody {
    /// Stage the caller believes the item is in.
    pub from_stage: String,
    /// Destination stage.
    pub to_stage: String,
}

/// Body of a bulk move.
#[derive(Debug, Deserialize)]
pub struct BulkMoveBody {
    /// Items to move.
    pub item_ids: Vec<ItemId>,
    /// Destination stage.
    pub to_stage: String,
}

/// Body of a bulk assignment.
#[derive(Debug, Deserialize)]
pub struct BulkAssignBody {
    /// Items to assign.
    pub item_ids: Vec<ItemId>,
    /// The agent taking them over.
    pub agent_id: UserId,
}

/// Per-item outcome of a bulk operation.
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
    /// One entry per requested item, in request order.
    pub results: Vec<BulkItemResult>,
}

impl From<Vec<BulkItemResult>> for BulkResponse {
    fn from(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

// =============================================================================
// Pipelines
// =============================================================================

/// `GET /v1/pipelines`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` for students.
pub async fn list_pipelines<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipelines = state.crm.list_pipelines(&ctx).await?;
    Ok(Json(ListPipelinesResponse { pipelines }))
}

/// `POST /v1/pipelines`.
///
/// # Errors
///
/// Returns `ApiError::Validation` for an empty or inconsistent stage list.
pub async fn create_pipeline<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<CreatePipelineRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline = state.crm.create_pipeline(&ctx, body).await?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// `POST /v1/pipelines/defaults`.
///
/// # Errors
///
/// Returns `ApiError::Conflict` if the scope already has a default of that type.
pub async fn create_default_pipeline<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Json(body): Json<CreateDefaultPipelineBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline = state
        .crm
        .create_default_pipeline(&ctx, body.sub_account_id, body.pipeline_type)
        .await?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// `GET /v1/pipelines/:pipeline_id`.
///
/// # Errors
///
/// Returns `ApiError::NotFound` for pipelines of another tenant.
pub async fn get_pipeline<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let pipeline = state.crm.get_pipeline(&ctx, &pipeline_id).await?;
    Ok(Json(pipeline))
}

/// `DELETE /v1/pipelines/:pipeline_id`.
///
/// # Errors
///
/// Returns `ApiError::Validation` for a default pipeline.
pub async fn delete_pipeline<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    state.crm.delete_pipeline(&ctx, &pipeline_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Items
// =============================================================================

/// `GET /v1/pipelines/:pipeline_id/items`. The board view.
///
/// # Errors
///
/// Returns `ApiError::NotFound` for an invisible pipeline.
pub async fn get_pipeline_items<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let items = state.crm.get_pipeline_items(&ctx, &pipeline_id).await?;
    Ok(Json(items))
}

/// `POST /v1/pipelines/:pipeline_id/items/:item_id/move`.
///
/// # Errors
///
/// Returns `ApiError::Conflict` when the item is no longer in `from_stage`.
pub async fn move_item<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path((pipeline_id, item_id)): Path<(String, String)>,
    Json(body): Json<MoveItemBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let item_id: ItemId = parse_id(&item_id, "item")?;
    let item = state
        .crm
        .move_item(&ctx, &pipeline_id, &item_id, &body.from_stage, &body.to_stage)
        .await?;
    Ok(Json(item))
}

/// `POST /v1/pipelines/:pipeline_id/bulk-move`. Always `200`; failures are
/// reported per item.
///
/// # Errors
///
/// Returns an error only for a malformed pipeline id.
pub async fn bulk_move<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
    Json(body): Json<BulkMoveBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let results = state
        .crm
        .bulk_move(&ctx, &pipeline_id, &body.item_ids, &body.to_stage)
        .await;
    Ok(Json(BulkResponse::from(results)))
}

/// `POST /v1/pipelines/:pipeline_id/bulk-assign`.
///
/// # Errors
///
/// Returns an error only for a malformed pipeline id.
pub async fn bulk_assign<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
    Json(body): Json<BulkAssignBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let results = state
        .crm
        .bulk_assign(&ctx, &pipeline_id, &body.item_ids, &body.agent_id)
        .await;
    Ok(Json(BulkResponse::from(results)))
}

/// `GET /v1/pipelines/:pipeline_id/analytics`.
///
/// # Errors
///
/// Returns `ApiError::NotFound` for an invisible pipeline.
pub async fn get_analytics<C, R>(
    State(state): State<Arc<GatewayState<C, R>>>,
    TenantScope(ctx): TenantScope,
    Path(pipeline_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let pipeline_id: PipelineId = parse_id(&pipeline_id, "pipeline")?;
    let analytics = state.crm.get_analytics(&ctx, &pipeline_id).await?;
    Ok(Json(analytics))
}
