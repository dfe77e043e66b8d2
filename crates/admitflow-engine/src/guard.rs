//! Authorization guard.
//!
//! Pure predicates over an already-built [`TenantContext`]. None of them write
//! or retry; a failed check ends the request with the returned error.

use admitflow_core::{Principal, Role, SubAccountId, TenantId};
use admitflow_store::{Activity, Application, Lead, Pipeline, PipelineRecord, Scope};

use crate::context::TenantContext;
use crate::error::{CrmError, Result};

/// A resource owned by exactly one tenant and at most one sub-account.
pub trait Scoped {
    /// Owning tenant.
    fn owner_tenant(&self) -> &TenantId;

    /// Owning sub-account.
    fn owner_sub_account(&self) -> Option<&SubAccountId>;

    /// Whether a tenant-level instance is visible to every sub-account.
    fn shared_across_sub_accounts(&self) -> bool {
        false
    }
}

impl Scoped for Lead {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn owner_sub_account(&self) -> Option<&SubAccountId> {
        self.sub_account_id.as_ref()
    }
}

impl Scoped for Application {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn owner_sub_account(&self) -> Option<&SubAccountId> {
        self.sub_account_id.as_ref()
    }
}

impl Scoped for PipelineRecord {
    fn owner_tenant(&self) -> &TenantId {
        self.tenant_id()
    }

    fn owner_sub_account(&self) -> Option<&SubAccountId> {
        self.sub_account_id()
    }
}

impl Scoped for Activity {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn owner_sub_account(&self) -> Option<&SubAccountId> {
        self.sub_account_id.as_ref()
    }
}

impl Scoped for Pipeline {
    fn owner_tenant(&self) -> &TenantId {
        &self.tenant_id
    }

    fn owner_sub_account(&self) -> Option<&SubAccountId> {
        self.sub_account_id.as_ref()
    }

    fn shared_across_sub_accounts(&self) -> bool {
        self.sub_account_id.is_none()
    }
}

/// Require an authenticated principal.
///
/// # Errors
///
/// Returns `CrmError::Unauthorized` if there is none.
pub fn require_authenticated(principal: Option<&Principal>) -> Result<&Principal> {
    principal.ok_or(CrmError::Unauthorized)
}

/// Narrow a query to the context's scope. Never denies.
#[must_use]
pub fn require_tenant_scope(ctx: &TenantContext) -> Scope {
    ctx.scope()
}

/// Require the context's role to be at least `at_least`.
///
/// # Errors
///
/// Returns `CrmError::Forbidden` if the role ranks lower.
pub fn require_role(ctx: &TenantContext, at_least: Role) -> Result<()> {
    if ctx.user_role.satisfies(at_least) {
        return Ok(());
    }
    tracing::debug!(
        user_id = %ctx.user_id,
        role = %ctx.user_role,
        required = %at_least,
        "Role check denied"
    );
    Err(CrmError::Forbidden(format!("requires role {at_least}")))
}

/// Verify that a loaded resource is visible to the context.
///
/// A missing resource and a resource of another tenant both yield
/// `NotFound`, so existence never leaks across tenants. Within the tenant, a
/// sub-account-confined principal may only reach resources of its own
/// sub-account (and shared tenant-level resources).
///
/// # Errors
///
/// Returns `CrmError::NotFound` or `CrmError::Forbidden`.
pub fn require_ownership<R: Scoped>(
    ctx: &TenantContext,
    resource: Option<R>,
    resource_type: &'static str,
) -> Result<R> {
    let resource = resource.ok_or(CrmError::NotFound(resource_type))?;

    if resource.owner_tenant() != &ctx.tenant_id {
        tracing::debug!(
            user_id = %ctx.user_id,
            resource_type,
            "Cross-tenant access hidden as not found"
        );
        return Err(CrmError::NotFound(resource_type));
    }

    if resource.shared_across_sub_accounts() {
        return Ok(resource);
    }

    if !ctx
        .scope()
        .contains(resource.owner_tenant(), resource.owner_sub_account())
    {
        tracing::debug!(
            user_id = %ctx.user_id,
            resource_type,
            "Sub-account ownership check denied"
        );
        return Err(CrmError::Forbidden(format!(
            "{resource_type} belongs to another sub-account"
        )));
    }

    Ok(resource)
}

/// Like [`require_ownership`], but tenant-level shared resources are only
/// writable by principals with tenant-wide scope.
///
/// # Errors
///
/// Returns `CrmError::NotFound` or `CrmError::Forbidden`.
pub fn require_write_ownership<R: Scoped>(
    ctx: &TenantContext,
    resource: Option<R>,
    resource_type: &'static str,
) -> Result<R> {
    let resource = require_ownership(ctx, resource, resource_type)?;

    if resource.owner_sub_account().is_none() && ctx.scope().sub_account_id.is_some() {
        return Err(CrmError::Forbidden(format!(
            "tenant-level {resource_type} requires tenant-wide scope"
        )));
    }

    Ok(resource)
}
