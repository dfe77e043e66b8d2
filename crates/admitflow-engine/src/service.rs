//! CRM service implementation.
//!
//! This module provides the `Crm` trait and the `CrmService` implementation
//! that ties tenant scoping, lead intake and the pipeline engine to a store.

use std::sync::Arc;

use admitflow_core::{ItemId, LeadId, PipelineId, Principal, Role, SubAccountId, UserId};
use admitflow_store::{
    Activity, Application, Lead, Pipeline, PipelineType, Store, SubAccount, User,
};
use async_trait::async_trait;

use crate::context::{self, TenantContext};
use crate::error::Result;
use crate::leads::{self, LeadScorer};
use crate::types::{
    BulkItemResult, CreateApplicationRequest, CreatePipelineRequest, CreateSubAccountRequest,
    CreateUserRequest, EngineConfig, LeadCandidate, PipelineAnalytics, PipelineItem,
    PipelineItems, RegisterTenantRequest, TenantRegistration,
};
use crate::{accounts, analytics, guard, pipeline};

/// Trait defining the CRM operations.
///
/// Every operation except [`Crm::resolve_context`] and
/// [`Crm::register_tenant`] acts on behalf of an already-resolved
/// [`TenantContext`], and performs its authorization checks before any write.
#[async_trait]
pub trait Crm: Send + Sync {
    // =========================================================================
    // Tenancy
    // =========================================================================

    /// Build the per-request context for a principal.
    ///
    /// # Errors
    ///
    /// Returns `CrmError::Unauthorized` without a principal and
    /// `CrmError::NotFound` for a vanished tenant.
    async fn resolve_context(&self, principal: Option<&Principal>) -> Result<TenantContext>;

    /// Register a tenant and its first administrator.
    async fn register_tenant(&self, request: RegisterTenantRequest) -> Result<TenantRegistration>;

    /// Add a user to the caller's tenant.
    async fn create_user(&self, ctx: &TenantContext, request: CreateUserRequest) -> Result<User>;

    /// Create a sub-account.
    async fn create_sub_account(
        &self,
        ctx: &TenantContext,
        request: CreateSubAccountRequest,
    ) -> Result<SubAccount>;

    /// List sub-accounts visible to the caller.
    async fn list_sub_accounts(&self, ctx: &TenantContext) -> Result<Vec<SubAccount>>;

    // =========================================================================
    // Leads
    // =========================================================================

    /// Create, persist and enrich a lead.
    ///
    /// # Errors
    ///
    /// Returns `CrmError::DuplicateLead` naming the colliding leads. Enrichment
    /// failures are never returned.
    async fn create_lead(&self, ctx: &TenantContext, candidate: LeadCandidate) -> Result<Lead>;

    /// Get a lead visible to the caller.
    async fn get_lead(&self, ctx: &TenantContext, lead_id: &LeadId) -> Result<Lead>;

    /// List active leads visible to the caller.
    async fn list_leads(&self, ctx: &TenantContext) -> Result<Vec<Lead>>;

    /// Active leads of the caller's tenant that collide with a candidate.
    async fn detect_duplicates(
        &self,
        ctx: &TenantContext,
        candidate: &LeadCandidate,
    ) -> Result<Vec<Lead>>;

    /// Soft-delete a lead.
    async fn deactivate_lead(&self, ctx: &TenantContext, lead_id: &LeadId) -> Result<Lead>;

    /// Open an application for a lead.
    async fn create_application(
        &self,
        ctx: &TenantContext,
        request: CreateApplicationRequest,
    ) -> Result<Application>;

    // =========================================================================
    // Pipelines
    // =========================================================================

    /// List pipelines visible to the caller.
    async fn list_pipelines(&self, ctx: &TenantContext) -> Result<Vec<Pipeline>>;

    /// Get a pipeline visible to the caller.
    async fn get_pipeline(&self, ctx: &TenantContext, pipeline_id: &PipelineId)
        -> Result<Pipeline>;

    /// Create a custom pipeline.
    async fn create_pipeline(
        &self,
        ctx: &TenantContext,
        request: CreatePipelineRequest,
    ) -> Result<Pipeline>;

    /// Create the default pipeline for a scope and type.
    ///
    /// # Errors
    ///
    /// Returns `CrmError::Conflict` if one already exists.
    async fn create_default_pipeline(
        &self,
        ctx: &TenantContext,
        sub_account_id: Option<SubAccountId>,
        pipeline_type: PipelineType,
    ) -> Result<Pipeline>;

    /// Delete a custom pipeline.
    ///
    /// # Errors
    ///
    /// Returns `CrmError::Validation` for a default pipeline.
    async fn delete_pipeline(&self, ctx: &TenantContext, pipeline_id: &PipelineId) -> Result<()>;

    // =========================================================================
    // Pipeline Items
    // =========================================================================

    /// Items of a pipeline grouped by stage.
    async fn get_pipeline_items(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
    ) -> Result<PipelineItems>;

    /// Move one item between stages.
    async fn move_item(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_id: &ItemId,
        from_stage: &str,
        to_stage: &str,
    ) -> Result<PipelineItem>;

    /// Move many items to one stage. Never fails as a whole.
    async fn bulk_move(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_ids: &[ItemId],
        to_stage: &str,
    ) -> Vec<BulkItemResult>;

    /// Assign many items to one agent. Never fails as a whole.
    async fn bulk_assign(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_ids: &[ItemId],
        agent_id: &UserId,
    ) -> Vec<BulkItemResult>;

    /// Stage counts and conversion for a pipeline.
    async fn get_analytics(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
    ) -> Result<PipelineAnalytics>;

    // =========================================================================
    // Audit
    // =========================================================================

    /// Activities visible to the caller, newest first.
    async fn list_activities(&self, ctx: &TenantContext) -> Result<Vec<Activity>>;
}

/// The main CRM service implementation.
pub struct CrmService<S: Store> {
    store: Arc<S>,
    config: EngineConfig,
    scorer: Option<Arc<dyn LeadScorer>>,
}

impl<S: Store> CrmService<S> {
    /// Create a new CRM service.
    #[must_use]
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            scorer: None,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    /// Use an external scorer during lead enrichment.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn LeadScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl<S: Store + 'static> Crm for CrmService<S> {
    async fn resolve_context(&self, principal: Option<&Principal>) -> Result<TenantContext> {
        context::resolve_context(&*self.store, principal, self.config.missing_sub_account)
    }

    async fn register_tenant(&self, request: RegisterTenantRequest) -> Result<TenantRegistration> {
        accounts::register_tenant(&*self.store, request)
    }

    async fn create_user(&self, ctx: &TenantContext, request: CreateUserRequest) -> Result<User> {
        accounts::create_user(&*self.store, ctx, request)
    }

    async fn create_sub_account(
        &self,
        ctx: &TenantContext,
        request: CreateSubAccountRequest,
    ) -> Result<SubAccount> {
        accounts::create_sub_account(&*self.store, ctx, request)
    }

    async fn list_sub_accounts(&self, ctx: &TenantContext) -> Result<Vec<SubAccount>> {
        accounts::list_sub_accounts(&*self.store, ctx)
    }

    async fn create_lead(&self, ctx: &TenantContext, candidate: LeadCandidate) -> Result<Lead> {
        let lead = leads::create_with_validation(&*self.store, ctx, candidate)?;

        match leads::enrich(
            &*self.store,
            self.scorer.as_deref(),
            &self.config,
            &lead,
        )
        .await
        {
            Ok(enriched) => Ok(enriched),
            Err(e) => {
                tracing::warn!(lead_id = %lead.lead_id, error = %e, "Lead enrichment failed");
                Ok(lead)
            }
        }
    }

    async fn get_lead(&self, ctx: &TenantContext, lead_id: &LeadId) -> Result<Lead> {
        guard::require_role(ctx, Role::Agent)?;
        guard::require_ownership(ctx, self.store.get_lead(lead_id)?, "lead")
    }

    async fn list_leads(&self, ctx: &TenantContext) -> Result<Vec<Lead>> {
        guard::require_role(ctx, Role::Agent)?;
        let scope = guard::require_tenant_scope(ctx);
        let mut leads: Vec<Lead> = self
            .store
            .list_leads(&scope)?
            .into_iter()
            .filter(|lead| lead.is_active)
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn detect_duplicates(
        &self,
        ctx: &TenantContext,
        candidate: &LeadCandidate,
    ) -> Result<Vec<Lead>> {
        guard::require_role(ctx, Role::Agent)?;
        leads::detect_duplicates(&*self.store, candidate, &ctx.tenant_id)
    }

    async fn deactivate_lead(&self, ctx: &TenantContext, lead_id: &LeadId) -> Result<Lead> {
        leads::deactivate(&*self.store, ctx, lead_id)
    }

    async fn create_application(
        &self,
        ctx: &TenantContext,
        request: CreateApplicationRequest,
    ) -> Result<Application> {
        leads::create_application(&*self.store, ctx, request)
    }

    async fn list_pipelines(&self, ctx: &TenantContext) -> Result<Vec<Pipeline>> {
        pipeline::list(&*self.store, ctx)
    }

    async fn get_pipeline(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
    ) -> Result<Pipeline> {
        pipeline::get(&*self.store, ctx, pipeline_id)
    }

    async fn create_pipeline(
        &self,
        ctx: &TenantContext,
        request: CreatePipelineRequest,
    ) -> Result<Pipeline> {
        pipeline::create(&*self.store, ctx, request)
    }

    async fn create_default_pipeline(
        &self,
        ctx: &TenantContext,
        sub_account_id: Option<SubAccountId>,
        pipeline_type: PipelineType,
    ) -> Result<Pipeline> {
        pipeline::create_default(&*self.store, ctx, sub_account_id, pipeline_type)
    }

    async fn delete_pipeline(&self, ctx: &TenantContext, pipeline_id: &PipelineId) -> Result<()> {
        pipeline::delete(&*self.store, ctx, pipeline_id)
    }

    async fn get_pipeline_items(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
    ) -> Result<PipelineItems> {
        pipeline::get_items(&*self.store, ctx, pipeline_id)
    }

    async fn move_item(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_id: &ItemId,
        from_stage: &str,
        to_stage: &str,
    ) -> Result<PipelineItem> {
        pipeline::move_item(&*self.store, ctx, pipeline_id, item_id, from_stage, to_stage)
    }

    async fn bulk_move(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_ids: &[ItemId],
        to_stage: &str,
    ) -> Vec<BulkItemResult> {
        pipeline::bulk_move(
            &*self.store,
            ctx,
            pipeline_id,
            item_ids,
            to_stage,
            self.config.max_bulk_items,
        )
    }

    async fn bulk_assign(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
        item_ids: &[ItemId],
        agent_id: &UserId,
    ) -> Vec<BulkItemResult> {
        pipeline::bulk_assign(
            &*self.store,
            ctx,
            pipeline_id,
            item_ids,
            agent_id,
            self.config.max_bulk_items,
        )
    }

    async fn get_analytics(
        &self,
        ctx: &TenantContext,
        pipeline_id: &PipelineId,
    ) -> Result<PipelineAnalytics> {
        analytics::get_analytics(&*self.store, ctx, pipeline_id)
    }

    async fn list_activities(&self, ctx: &TenantContext) -> Result<Vec<Activity>> {
        guard::require_role(ctx, Role::Agent)?;
        Ok(self
            .store
            .list_activities(&guard::require_tenant_scope(ctx))?)
    }
}
