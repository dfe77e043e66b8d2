//! HTTP gateway for the admitflow CRM.
//!
//! This crate exposes the CRM core over REST. It handles:
//!
//! - Bearer token resolution into a principal
//! - Per-principal rate limiting
//! - Per-request tenant context and error mapping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Clients (HTTP/JSON)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     admitflow-gateway                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  AuthUser + │ │   Router    │ │      ApiError       │    │
//! │  │ TenantScope │ │  + Handlers │ │      mapping        │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌─────────────┐
//!        │   Crm    │   │ Principal│   │ RateLimiter │
//!        │ (engine) │   │ Resolver │   │             │
//!        └──────────┘   └──────────┘   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use admitflow_auth::{AuthConfig, JwtPrincipalResolver};
//! use admitflow_engine::CrmService;
//! use admitflow_gateway::{create_router, GatewayConfig, GatewayState};
//! use admitflow_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/admitflow")?);
//! let crm = Arc::new(CrmService::with_defaults(store));
//! let resolver = Arc::new(JwtPrincipalResolver::new(AuthConfig::from_env()?));
//!
//! let state = GatewayState::new(crm, resolver, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AuthUser, TenantScope};
pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
