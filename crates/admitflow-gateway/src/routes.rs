//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use admitflow_auth::PrincipalResolver;
use admitflow_engine::Crm;

use crate::handlers::{health, leads, pipelines, tenants};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /v1/tenants` - Register a tenant and its admin
///
/// ## Tenancy (authenticated)
/// - `GET /v1/context` - Resolved caller context
/// - `GET /v1/sub-accounts` - List sub-accounts
/// - `POST /v1/sub-accounts` - Create sub-account
/// - `POST /v1/users` - Create user
/// - `GET /v1/activities` - Audit feed
///
/// ## Leads (authenticated)
/// - `GET /v1/leads` - List leads
/// - `POST /v1/leads` - Create lead
/// - `POST /v1/leads/duplicates` - Duplicate check
/// - `GET /v1/leads/:lead_id` - Get lead
/// - `DELETE /v1/leads/:lead_id` - Deactivate lead
/// - `POST /v1/applications` - Create application
///
/// ## Pipelines (authenticated)
/// - `GET /v1/pipelines` - List pipelines
/// - `POST /v1/pipelines` - Create custom pipeline
/// - `POST /v1/pipelines/defaults` - Create default pipeline
/// - `GET /v1/pipelines/:pipeline_id` - Get pipeline
/// - `DELETE /v1/pipelines/:pipeline_id` - Delete custom pipeline
/// - `GET /v1/pipelines/:pipeline_id/items` - Board view
/// - `POST /v1/pipelines/:pipeline_id/items/:item_id/move` - Move item
/// - `POST /v1/pipelines/:pipeline_id/bulk-move` - Bulk move
/// - `POST /v1/pipelines/:pipeline_id/bulk-assign` - Bulk assign
/// - `GET /v1/pipelines/:pipeline_id/analytics` - Stage analytics
pub fn create_router<C, R>(state: GatewayState<C, R>) -> Router
where
    C: Crm + 'static,
    R: PrincipalResolver + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Public
        .route("/health", get(health::health))
        .route("/v1/tenants", post(tenants::register_tenant::<C, R>))
        // Tenancy
        .route("/v1/context", get(tenants::get_context))
        .route(
            "/v1/sub-accounts",
            get(tenants::list_sub_accounts::<C, R>).post(tenants::create_sub_account::<C, R>),
        )
        .route("/v1/users", post(tenants::create_user::<C, R>))
        .route("/v1/activities", get(tenants::list_activities::<C, R>))
        // Leads
        .route(
            "/v1/leads",
            get(leads::list_leads::<C, R>).post(leads::create_lead::<C, R>),
        )
        .route(
            "/v1/leads/duplicates",
            post(leads::detect_duplicates::<C, R>),
        )
        .route(
            "/v1/leads/:lead_id",
            get(leads::get_lead::<C, R>).delete(leads::deactivate_lead::<C, R>),
        )
        .route(
            "/v1/applications",
            post(leads::create_application::<C, R>),
        )
        // Pipelines
        .route(
            "/v1/pipelines",
            get(pipelines::list_pipelines::<C, R>).post(pipelines::create_pipeline::<C, R>),
        )
        .route(
            "/v1/pipelines/defaults",
            post(pipelines::create_default_pipeline::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id",
            get(pipelines::get_pipeline::<C, R>).delete(pipelines::delete_pipeline::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id/items",
            get(pipelines::get_pipeline_items::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id/items/:item_id/move",
            post(pipelines::move_item::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id/bulk-move",
            post(pipelines::bulk_move::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id/bulk-assign",
            post(pipelines::bulk_assign::<C, R>),
        )
        .route(
            "/v1/pipelines/:pipeline_id/analytics",
            get(pipelines::get_analytics::<C, R>),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_any_origin() {
        let _layer = build_cors_layer(&["*".to_string()]);
    }

    #[test]
    fn cors_skips_unparseable_origins() {
        let _layer = build_cors_layer(&[
            "https://portal.example-agency.com".to_string(),
            "not a header\nvalue".to_string(),
        ]);
    }
}
