//! admitflow gateway entry point.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to resolve tokens of the form
//! `test-token:<user>:<tenant>:<role>[:<sub_account>]` without a signing secret.
//! Otherwise `AUTH_SECRET` is required and startup fails without it.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use admitflow_auth::MockPrincipalResolver;
#[cfg(not(feature = "dev-mode"))]
use admitflow_auth::{AuthConfig, JwtPrincipalResolver};
use admitflow_engine::{CrmService, EngineConfig, MissingSubAccountPolicy};
use admitflow_gateway::{create_router, GatewayConfig, GatewayState};
use admitflow_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,admitflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting admitflow gateway");

    let gateway_config = GatewayConfig::from_env()?;
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/admitflow".into());

    let mut engine_config = EngineConfig::default();
    if let Ok(policy) = std::env::var("MISSING_SUB_ACCOUNT_POLICY") {
        engine_config.missing_sub_account = policy.parse::<MissingSubAccountPolicy>()?;
    }

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %data_dir,
        rate_limit_per_minute = gateway_config.rate_limit_per_minute,
        missing_sub_account = ?engine_config.missing_sub_account,
        "Gateway configuration loaded"
    );

    tracing::info!(path = %data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&data_dir)?);
    let crm = Arc::new(CrmService::new(store, engine_config));

    #[cfg(feature = "dev-mode")]
    let resolver = {
        tracing::warn!("DEV MODE ENABLED - using mock principal resolver");
        Arc::new(MockPrincipalResolver)
    };

    #[cfg(not(feature = "dev-mode"))]
    let resolver = {
        let auth_config = AuthConfig::from_env().inspect_err(|e| {
            tracing::error!(error = %e, "Refusing to start without a token signing secret");
        })?;
        tracing::info!(
            issuer = %auth_config.issuer,
            audience = %auth_config.audience,
            "Verifying HS256 tokens"
        );
        Arc::new(JwtPrincipalResolver::new(auth_config))
    };
    tracing::info!("Principal resolver initialized");

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(crm, resolver, gateway_config);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
