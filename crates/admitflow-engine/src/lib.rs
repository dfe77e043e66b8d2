//! Tenant scoping, lead intake and pipeline stage engine for admitflow.
//!
//! This crate holds the business logic of the CRM. It resolves a request's
//! tenant context, authorizes every operation against it, and drives leads
//! and applications through pipeline stages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Principal
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         CrmService                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Context +  │ │   Leads +   │ │   Pipeline stage    │    │
//! │  │    Guard    │ │   Scoring   │ │  engine, analytics  │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Scope
//!                              ▼
//!                     ┌─────────────────┐
//!                     │ Store (RocksDB) │
//!                     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use admitflow_engine::{Crm, CrmService, LeadCandidate, RegisterTenantRequest};
//! use admitflow_core::{Principal, Role};
//! use admitflow_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/admitflow")?);
//! let crm = CrmService::with_defaults(store);
//!
//! let reg = crm
//!     .register_tenant(RegisterTenantRequest {
//!         name: "Acme Education".to_string(),
//!         domain: None,
//!         admin_email: "owner@acme.edu".to_string(),
//!         admin_display_name: "Owner".to_string(),
//!     })
//!     .await?;
//!
//! let principal = Principal::new(reg.admin.user_id, reg.tenant.tenant_id, Role::TenantAdmin);
//! let ctx = crm.resolve_context(Some(&principal)).await?;
//!
//! let lead = crm
//!     .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
//!     .await?;
//! println!("Lead {} scored {}", lead.lead_id, lead.score);
//! # Ok(())
//! # }
//! ```
//!
//! # Authorization
//!
//! Roles form a total order `student < agent < sub_account_admin <
//! tenant_admin`. Only `tenant_admin` sees the whole tenant; every other role
//! is confined to its sub-account. A resource in another tenant is reported
//! as `NotFound`; one in another sub-account of the same tenant as
//! `Forbidden`. See the [`guard`] module.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accounts;
pub mod analytics;
pub mod context;
pub mod error;
pub mod guard;
pub mod leads;
pub mod pipeline;
pub mod scoring;
pub mod service;
pub mod types;

pub use context::TenantContext;
pub use error::{CrmError, ErrorKind, Result};
pub use leads::{LeadScorer, ScorerError};
pub use service::{Crm, CrmService};
pub use types::{
    BulkItemError, BulkItemResult, CreateApplicationRequest, CreatePipelineRequest,
    CreateSubAccountRequest, CreateUserRequest, EngineConfig, LeadCandidate,
    MissingSubAccountPolicy, PipelineAnalytics, PipelineItem, PipelineItems,
    RegisterTenantRequest, ScoringRules, StageBucket, StageInput, StageMetrics,
    TenantRegistration,
};
