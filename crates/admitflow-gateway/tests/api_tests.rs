//! HTTP-level tests for the gateway router.
//!
//! Each test runs the full router over a throwaway RocksDB directory and
//! authenticates with mock `test-token:` bearer tokens.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use admitflow_auth::{AuthConfig, JwtPrincipalResolver, MockPrincipalResolver};
use admitflow_core::{Principal, Role, TenantId, UserId};
use admitflow_engine::{Crm, CrmService, RegisterTenantRequest};
use admitflow_gateway::{create_router, GatewayConfig, GatewayState};
use admitflow_store::RocksStore;

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    fn with_config(config: GatewayConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let crm = Arc::new(CrmService::with_defaults(store));
        let state = GatewayState::new(crm, Arc::new(MockPrincipalResolver), config);
        Self {
            router: create_router(state),
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send(request(method, uri, Some(token), body)).await
    }

    /// Register a tenant and return its admin's bearer token.
    async fn register(&self, name: &str) -> String {
        let (status, body) = self
            .send(request(
                "POST",
                "/v1/tenants",
                None,
                Some(json!({
                    "name": name,
                    "admin_email": format!("owner@{}.edu", name.to_lowercase()),
                    "admin_display_name": "Owner",
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let tenant_id: TenantId = body["tenant"]["tenant_id"].as_str().unwrap().parse().unwrap();
        let user_id: UserId = body["admin"]["user_id"].as_str().unwrap().parse().unwrap();
        MockPrincipalResolver::token_for(&Principal::new(user_id, tenant_id, Role::TenantAdmin))
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn lead_body(email: &str) -> Value {
    json!({
        "first_name": "Ngozi",
        "last_name": "Adeyemi",
        "email": email,
        "phone": "+234 803 000 1111",
        "budget": 12000.0,
    })
}

async fn default_lead_pipeline(app: &TestApp, token: &str) -> String {
    let (status, body) = app.call("GET", "/v1/pipelines", token, None).await;
    assert_eq!(status, StatusCode::OK);
    body["pipelines"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["is_default"] == true && p["pipeline_type"] == "lead")
        .unwrap()["pipeline_id"]
        .as_str()
        .unwrap()
        .to_string()
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new();
    let (status, body) = app.send(request("GET", "/v1/leads", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app
        .send(request("GET", "/v1/leads", Some("garbage"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_rejects_blank_name() {
    let app = TestApp::new();
    let (status, body) = app
        .send(request(
            "POST",
            "/v1/tenants",
            None,
            Some(json!({"name": "  ", "admin_email": "a@b.edu", "admin_display_name": "A"})),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn token_for_unknown_user_is_unauthorized() {
    let app = TestApp::new();
    let admin = app.register("Acme").await;
    let (_, context) = app.call("GET", "/v1/context", &admin, None).await;
    let tenant_id: TenantId = context["tenant_id"].as_str().unwrap().parse().unwrap();

    let stranger = Principal::new(UserId::generate(), tenant_id, Role::TenantAdmin);
    let token = MockPrincipalResolver::token_for(&stranger);
    let (status, body) = app.call("GET", "/v1/leads", &token, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn stored_role_overrides_token_claims() {
    let app = TestApp::new();
    let admin = app.register("Acme").await;
    let (_, context) = app.call("GET", "/v1/context", &admin, None).await;
    let tenant_id: TenantId = context["tenant_id"].as_str().unwrap().parse().unwrap();

    let (status, agent) = app
        .call(
            "POST",
            "/v1/users",
            &admin,
            Some(json!({
                "email": "agent@acme.edu",
                "display_name": "Agent",
                "role": "agent",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let agent_id: UserId = agent["user_id"].as_str().unwrap().parse().unwrap();

    // Still claims tenant_admin, e.g. a token issued before a demotion.
    let stale = MockPrincipalResolver::token_for(&Principal::new(
        agent_id,
        tenant_id,
        Role::TenantAdmin,
    ));
    let (status, body) = app
        .call("POST", "/v1/sub-accounts", &stale, Some(json!({"name": "Lagos"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let crm = Arc::new(CrmService::with_defaults(store));
    let reg = crm
        .register_tenant(RegisterTenantRequest {
            name: "Acme".to_string(),
            domain: None,
            admin_email: "owner@acme.edu".to_string(),
            admin_display_name: "Owner".to_string(),
        })
        .await
        .unwrap();
    let admin = Principal::new(reg.admin.user_id, reg.tenant.tenant_id, Role::TenantAdmin);

    let resolver = JwtPrincipalResolver::new(AuthConfig::new("deployment-secret"));
    let genuine = resolver.issue(&admin, chrono::Duration::minutes(5)).unwrap();
    let forged = JwtPrincipalResolver::new(AuthConfig::new("guessed-secret"))
        .issue(&admin, chrono::Duration::minutes(5))
        .unwrap();

    let router = create_router(GatewayState::new(
        crm,
        Arc::new(resolver),
        GatewayConfig::default(),
    ));
    let send = |token: &str| {
        router
            .clone()
            .oneshot(request("GET", "/v1/leads", Some(token), None))
    };

    assert_eq!(send(&forged).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(send(&genuine).await.unwrap().status(), StatusCode::OK);
}

// =============================================================================
// Leads
// =============================================================================

#[tokio::test]
async fn create_then_fetch_lead() {
    let app = TestApp::new();
    let token = app.register("Acme").await;

    let (status, lead) = app
        .call("POST", "/v1/leads", &token, Some(lead_body("ngozi@adeyemi.ng")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lead["status"], "new");
    assert!(lead["score"].as_u64().unwrap() > 0);

    let uri = format!("/v1/leads/{}", lead["lead_id"].as_str().unwrap());
    let (status, fetched) = app.call("GET", &uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["email"], "ngozi@adeyemi.ng");

    let (status, list) = app.call("GET", "/v1/leads", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["leads"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_lead_is_a_conflict_with_ids() {
    let app = TestApp::new();
    let token = app.register("Acme").await;

    let (_, first) = app
        .call("POST", "/v1/leads", &token, Some(lead_body("dup@example.org")))
        .await;
    let (status, body) = app
        .call("POST", "/v1/leads", &token, Some(lead_body("dup@example.org")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
    assert_eq!(body["error"]["lead_ids"], json!([first["lead_id"]]));

    let (status, check) = app
        .call(
            "POST",
            "/v1/leads/duplicates",
            &token,
            Some(lead_body("dup@example.org")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["duplicate"], true);
}

#[tokio::test]
async fn other_tenants_leads_are_not_found() {
    let app = TestApp::new();
    let acme = app.register("Acme").await;
    let globex = app.register("Globex").await;

    let (_, lead) = app
        .call("POST", "/v1/leads", &acme, Some(lead_body("private@acme.test")))
        .await;
    let uri = format!("/v1/leads/{}", lead["lead_id"].as_str().unwrap());

    let (status, body) = app.call("GET", &uri, &globex, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_path_id_is_bad_request() {
    let app = TestApp::new();
    let token = app.register("Acme").await;

    let (status, body) = app.call("GET", "/v1/leads/not-a-uuid", &token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

// =============================================================================
// Pipelines
// =============================================================================

#[tokio::test]
async fn move_then_stale_move_conflicts() {
    let app = TestApp::new();
    let token = app.register("Acme").await;
    let pipeline_id = default_lead_pipeline(&app, &token).await;

    let (_, lead) = app
        .call("POST", "/v1/leads", &token, Some(lead_body("mover@example.org")))
        .await;
    let move_uri = format!(
        "/v1/pipelines/{pipeline_id}/items/{}/move",
        lead["lead_id"].as_str().unwrap()
    );

    let (status, item) = app
        .call(
            "POST",
            &move_uri,
            &token,
            Some(json!({"from_stage": "new", "to_stage": "contacted"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "contacted");

    let (status, body) = app
        .call(
            "POST",
            &move_uri,
            &token,
            Some(json!({"from_stage": "new", "to_stage": "qualified"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let analytics_uri = format!("/v1/pipelines/{pipeline_id}/analytics");
    let (status, analytics) = app.call("GET", &analytics_uri, &token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["total_items"], 1);
}

#[tokio::test]
async fn bulk_move_reports_per_item() {
    let app = TestApp::new();
    let token = app.register("Acme").await;
    let pipeline_id = default_lead_pipeline(&app, &token).await;

    let (_, lead) = app
        .call("POST", "/v1/leads", &token, Some(lead_body("bulk@example.org")))
        .await;
    let missing = UserId::generate().to_string();

    let (status, body) = app
        .call(
            "POST",
            &format!("/v1/pipelines/{pipeline_id}/bulk-move"),
            &token,
            Some(json!({
                "item_ids": [lead["lead_id"], missing],
                "to_stage": "qualified",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][1]["error"]["code"], "not_found");
}

#[tokio::test]
async fn default_pipeline_cannot_be_deleted() {
    let app = TestApp::new();
    let token = app.register("Acme").await;
    let pipeline_id = default_lead_pipeline(&app, &token).await;

    let (status, _) = app
        .call("DELETE", &format!("/v1/pipelines/{pipeline_id}"), &token, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn rate_limit_returns_429_with_retry_after() {
    let config = GatewayConfig {
        rate_limit_per_minute: 2,
        ..GatewayConfig::default()
    };
    let app = TestApp::with_config(config);
    let token = app.register("Acme").await;

    for _ in 0..2 {
        let (status, _) = app.call("GET", "/v1/context", &token, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/v1/context", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}
