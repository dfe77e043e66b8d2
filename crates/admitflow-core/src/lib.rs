//! Core types for admitflow.
//!
//! This crate provides the foundational types used throughout the admitflow CRM:
//!
//! - **Identifiers**: Strongly-typed UUID ids for tenants, sub-accounts, users,
//!   leads, applications, pipelines and activities
//! - **Roles**: The closed role enum and its rank ordering
//! - **Principal**: The authenticated `(user, tenant, sub-account?, role)` tuple
//!
//! # Example
//!
//! ```
//! use admitflow_core::{Principal, Role, SubAccountId, TenantId, UserId};
//!
//! let principal = Principal::new(UserId::generate(), TenantId::generate(), Role::Agent)
//!     .in_sub_account(SubAccountId::generate());
//!
//! assert!(principal.role.satisfies(Role::Student));
//! assert!(!principal.role.satisfies(Role::TenantAdmin));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod principal;
pub mod role;

pub use ids::{
    ActivityId, ApplicationId, IdError, ItemId, LeadId, PipelineId, ProgramId, SubAccountId,
    TenantId, UserId,
};
pub use principal::Principal;
pub use role::{Role, UnknownRole};
