//! `RocksDB` storage layer for admitflow.
//!
//! This crate provides persistent storage for tenants, sub-accounts, users,
//! leads, applications, pipelines and the activity audit trail using `RocksDB`
//! with column families for tenant-scoped indexing.
//!
//! # Architecture
//!
//! Each tenant-owned record family has a primary column family keyed by the
//! record id and an index keyed by `tenant_id || record_id`. Scoped reads take a
//! [`Scope`] value and never see another tenant's rows.
//!
//! Multi-record writes go through [`Store::apply`], which commits a set of
//! [`WriteOp`]s as one batch. Guarded writes check their precondition and
//! commit while other writers are excluded:
//!
//! - [`Store::insert_default_pipeline`] refuses a second default for the same
//!   `(tenant, sub-account, type)`
//! - [`Store::insert_lead_unless_duplicate`] refuses a lead colliding with an
//!   active lead of the tenant
//! - [`Store::insert_sub_account`] enforces the tenant's sub-account limit
//! - [`Store::commit_item_change`] compares the item's stored stage with the
//!   caller's expectation before applying the change, its history entry and its
//!   activity record together
//!
//! # Example
//!
//! ```no_run
//! use admitflow_store::{RocksStore, Scope, Store};
//! use admitflow_core::TenantId;
//!
//! let store = RocksStore::open("/tmp/admitflow-db").unwrap();
//!
//! let tenant_id = TenantId::generate();
//! let leads = store.list_leads(&Scope::tenant(tenant_id)).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    Activity, ActivityKind, Application, Branding, EngagementEvent, EngagementKind, ItemChange,
    ItemMutation, Lead, Pipeline, PipelineRecord, PipelineType, Scope, SourceCategory, Stage,
    SubAccount, Tenant, TenantSettings, User,
};

use admitflow_core::{ApplicationId, ItemId, LeadId, PipelineId, SubAccountId, TenantId, UserId};

/// A single write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert or replace a tenant.
    PutTenant(Tenant),
    /// Insert or replace a sub-account.
    PutSubAccount(SubAccount),
    /// Insert or replace a user.
    PutUser(User),
    /// Insert or replace a lead.
    PutLead(Lead),
    /// Insert or replace an application.
    PutApplication(Application),
    /// Insert or replace a pipeline.
    PutPipeline(Pipeline),
    /// Delete a pipeline and its index entries.
    DeletePipeline(PipelineId),
    /// Append an activity record.
    AppendActivity(Activity),
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a set of writes atomically, maintaining all indexes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if a `DeletePipeline` target is missing,
    /// or an error if the database operation fails. Nothing is written on error.
    fn apply(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Insert a default pipeline and its creation activity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if a default pipeline is already
    /// registered for the pipeline's tenant, sub-account and type.
    fn insert_default_pipeline(&self, pipeline: &Pipeline, activity: &Activity) -> Result<()>;

    /// Insert a lead and its creation activity unless an active lead of the
    /// same tenant matches `is_duplicate`.
    ///
    /// The match runs while writers are excluded. Returns the matching leads;
    /// nothing is written when the list is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_lead_unless_duplicate(
        &self,
        lead: &Lead,
        activity: &Activity,
        is_duplicate: &dyn Fn(&Lead) -> bool,
    ) -> Result<Vec<Lead>>;

    /// Insert a sub-account and its creation activity unless its tenant
    /// already has `limit` sub-accounts.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LimitReached` when the tenant is at its limit.
    fn insert_sub_account(
        &self,
        sub_account: &SubAccount,
        activity: &Activity,
        limit: usize,
    ) -> Result<()>;

    /// Apply a single-item change, its history entry and its activity record as
    /// one unit.
    ///
    /// The item's stored stage is compared with `change.expected_status` while
    /// writers are excluded, so two concurrent changes cannot interleave.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the item doesn't exist and
    /// `StoreError::StatusConflict` if its stage no longer matches.
    fn commit_item_change(&self, change: ItemChange) -> Result<PipelineRecord>;

    // =========================================================================
    // Tenant Operations
    // =========================================================================

    /// Get a tenant by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>>;

    /// Insert or update a tenant record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.apply(vec![WriteOp::PutTenant(tenant.clone())])
    }

    // =========================================================================
    // Sub-account Operations
    // =========================================================================

    /// Get a sub-account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_sub_account(&self, sub_account_id: &SubAccountId) -> Result<Option<SubAccount>>;

    /// List all sub-accounts of a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sub_accounts(&self, tenant_id: &TenantId) -> Result<Vec<SubAccount>>;

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &User) -> Result<()> {
        self.apply(vec![WriteOp::PutUser(user.clone())])
    }

    // =========================================================================
    // Lead Operations
    // =========================================================================

    /// Get a lead by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_lead(&self, lead_id: &LeadId) -> Result<Option<Lead>>;

    /// List all leads visible in a scope, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_leads(&self, scope: &Scope) -> Result<Vec<Lead>>;

    // =========================================================================
    // Application Operations
    // =========================================================================

    /// Get an application by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_application(&self, application_id: &ApplicationId) -> Result<Option<Application>>;

    /// List all applications visible in a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_applications(&self, scope: &Scope) -> Result<Vec<Application>>;

    // =========================================================================
    // Pipeline Operations
    // =========================================================================

    /// Get a pipeline by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_pipeline(&self, pipeline_id: &PipelineId) -> Result<Option<Pipeline>>;

    /// List every pipeline of a tenant, tenant-wide and per sub-account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_pipelines(&self, tenant_id: &TenantId) -> Result<Vec<Pipeline>>;

    /// Find the default pipeline for a tenant, sub-account and type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_default_pipeline(
        &self,
        tenant_id: &TenantId,
        sub_account_id: Option<&SubAccountId>,
        pipeline_type: PipelineType,
    ) -> Result<Option<Pipeline>>;

    // =========================================================================
    // Pipeline Items
    // =========================================================================

    /// Get a lead or application as a pipeline record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_item(
        &self,
        pipeline_type: PipelineType,
        item_id: &ItemId,
    ) -> Result<Option<PipelineRecord>> {
        Ok(match pipeline_type {
            PipelineType::Lead => self
                .get_lead(&LeadId::from(*item_id))?
                .map(PipelineRecord::Lead),
            PipelineType::Application => self
                .get_application(&ApplicationId::from(*item_id))?
                .map(PipelineRecord::Application),
        })
    }

    /// List all records of a type visible in a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_items(
        &self,
        pipeline_type: PipelineType,
        scope: &Scope,
    ) -> Result<Vec<PipelineRecord>> {
        Ok(match pipeline_type {
            PipelineType::Lead => self
                .list_leads(scope)?
                .into_iter()
                .map(PipelineRecord::Lead)
                .collect(),
            PipelineType::Application => self
                .list_applications(scope)?
                .into_iter()
                .map(PipelineRecord::Application)
                .collect(),
        })
    }

    // =========================================================================
    // Activity Operations
    // =========================================================================

    /// List all activities visible in a scope, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_activities(&self, scope: &Scope) -> Result<Vec<Activity>>;
}
