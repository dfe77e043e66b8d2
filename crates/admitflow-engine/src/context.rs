//! Tenant context resolution.
//!
//! A [`TenantContext`] is built once per request from the resolved principal.
//! It is never cached across requests since a user's role or sub-account can
//! change mid-session.

use admitflow_core::{ActivityId, Principal, Role, SubAccountId, TenantId, UserId};
use admitflow_store::{Activity, ActivityKind, Scope, Store, SubAccount, Tenant};
use chrono::Utc;

use crate::error::{CrmError, Result};
use crate::guard;
use crate::types::MissingSubAccountPolicy;

/// The resolved scope of one request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// The principal's tenant.
    pub tenant_id: TenantId,
    /// The principal's sub-account, if it still exists.
    pub sub_account_id: Option<SubAccountId>,
    /// The acting user.
    pub user_id: UserId,
    /// The acting user's role.
    pub user_role: Role,
    /// The loaded tenant.
    pub tenant: Tenant,
    /// The loaded sub-account.
    pub sub_account: Option<SubAccount>,
}

impl TenantContext {
    /// The storage scope every query of this request is narrowed to.
    ///
    /// Tenant administrators, and principals without a sub-account, see the
    /// whole tenant.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match (self.user_role.is_sub_account_confined(), self.sub_account_id) {
            (true, Some(sub_account_id)) => Scope::sub_account(self.tenant_id, sub_account_id),
            _ => Scope::tenant(self.tenant_id),
        }
    }

    /// Start an audit record of an action taken by this request's user.
    #[must_use]
    pub fn activity(
        &self,
        kind: ActivityKind,
        sub_account_id: Option<SubAccountId>,
        description: impl Into<String>,
    ) -> Activity {
        Activity {
            activity_id: ActivityId::generate(),
            tenant_id: self.tenant_id,
            sub_account_id,
            user_id: self.user_id,
            lead_id: None,
            application_id: None,
            kind,
            description: description.into(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}

/// Build the tenant context for a principal.
///
/// The role and sub-account come from the stored user record, not from the
/// token, so a demotion or move applies to the next request.
///
/// # Errors
///
/// Returns `CrmError::Unauthorized` without a principal or when the user no
/// longer exists in the principal's tenant, and `CrmError::NotFound` if the
/// tenant no longer exists. A missing sub-account is handled according to
/// `policy`.
pub fn resolve_context<S: Store>(
    store: &S,
    principal: Option<&Principal>,
    policy: MissingSubAccountPolicy,
) -> Result<TenantContext> {
    let principal = guard::require_authenticated(principal)?;

    let tenant = store.get_tenant(&principal.tenant_id)?.ok_or_else(|| {
        tracing::debug!(tenant_id = %principal.tenant_id, "Principal references unknown tenant");
        CrmError::NotFound("tenant")
    })?;

    let user = store
        .get_user(&principal.user_id)?
        .filter(|user| user.tenant_id == principal.tenant_id)
        .ok_or_else(|| {
            tracing::debug!(
                user_id = %principal.user_id,
                tenant_id = %principal.tenant_id,
                "Principal references unknown user"
            );
            CrmError::Unauthorized
        })?;

    if user.role != principal.role || user.sub_account_id != principal.sub_account_id {
        tracing::debug!(
            user_id = %user.user_id,
            token_role = %principal.role,
            role = %user.role,
            "Token claims are stale, using stored role and sub-account"
        );
    }

    let sub_account = match user.sub_account_id {
        None => None,
        Some(sub_account_id) => {
            let found = store
                .get_sub_account(&sub_account_id)?
                .filter(|sub| sub.tenant_id == user.tenant_id);

            match (found, policy) {
                (Some(sub), _) => Some(sub),
                (None, MissingSubAccountPolicy::PromoteToTenant) => {
                    tracing::warn!(
                        user_id = %user.user_id,
                        sub_account_id = %sub_account_id,
                        "Sub-account missing, continuing with tenant-wide scope"
                    );
                    None
                }
                (None, MissingSubAccountPolicy::Deny) => {
                    tracing::debug!(
                        user_id = %user.user_id,
                        sub_account_id = %sub_account_id,
                        "Sub-account missing, denying request"
                    );
                    return Err(CrmError::NotFound("sub-account"));
                }
            }
        }
    };

    Ok(TenantContext {
        tenant_id: user.tenant_id,
        sub_account_id: sub_account.as_ref().map(|sub| sub.sub_account_id),
        user_id: user.user_id,
        user_role: user.role,
        tenant,
        sub_account,
    })
}
