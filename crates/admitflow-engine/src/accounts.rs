//! Tenant registration, users and sub-accounts.

use admitflow_core::{ActivityId, Role, SubAccountId, TenantId, UserId};
use admitflow_store::{
    Activity, ActivityKind, Branding, PipelineType, Store, SubAccount, Tenant, TenantSettings,
    User, WriteOp,
};
use chrono::Utc;

use crate::context::TenantContext;
use crate::error::{CrmError, Result};
use crate::types::{
    CreateSubAccountRequest, CreateUserRequest, RegisterTenantRequest, TenantRegistration,
};
use crate::{guard, pipeline, scoring};

fn require_email(email: &str) -> Result<String> {
    let email = email.trim();
    if scoring::email_local_part(email).is_none() || scoring::email_domain(email).is_none() {
        return Err(CrmError::Validation(format!("invalid email address: {email}")));
    }
    Ok(email.to_string())
}

fn require_name(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CrmError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Register a tenant with its first `tenant_admin`.
///
/// The tenant-level default lead and application pipelines are created in
/// the same batch.
///
/// # Errors
///
/// Returns `Validation` for a blank name or malformed admin email.
pub fn register_tenant<S: Store>(
    store: &S,
    request: RegisterTenantRequest,
) -> Result<TenantRegistration> {
    let name = require_name(&request.name, "tenant name")?;
    let admin_email = require_email(&request.admin_email)?;
    let display_name = require_name(&request.admin_display_name, "admin display name")?;
    let now = Utc::now();

    let tenant = Tenant {
        tenant_id: TenantId::generate(),
        name,
        domain: request.domain.filter(|d| !d.trim().is_empty()),
        branding: Branding::default(),
        settings: TenantSettings::default(),
        created_at: now,
    };
    let admin = User {
        user_id: UserId::generate(),
        tenant_id: tenant.tenant_id,
        sub_account_id: None,
        role: Role::TenantAdmin,
        email: admin_email,
        display_name,
        created_at: now,
    };

    let mut ops = vec![
        WriteOp::PutTenant(tenant.clone()),
        WriteOp::PutUser(admin.clone()),
    ];
    for pipeline_type in [PipelineType::Lead, PipelineType::Application] {
        ops.push(WriteOp::PutPipeline(pipeline::build_default_pipeline(
            tenant.tenant_id,
            None,
            pipeline_type,
        )));
    }
    ops.push(WriteOp::AppendActivity(Activity {
        activity_id: ActivityId::generate(),
        tenant_id: tenant.tenant_id,
        sub_account_id: None,
        user_id: admin.user_id,
        lead_id: None,
        application_id: None,
        kind: ActivityKind::TenantRegistered,
        description: format!("Registered tenant {}", tenant.name),
        metadata: serde_json::Value::Null,
        created_at: now,
    }));
    store.apply(ops)?;

    tracing::info!(
        tenant_id = %tenant.tenant_id,
        admin_id = %admin.user_id,
        "Registered tenant"
    );

    Ok(TenantRegistration { tenant, admin })
}

/// Add a user to the caller's tenant.
///
/// # Errors
///
/// Returns `Forbidden` when the new role outranks the caller or the
/// sub-account is outside the caller's scope, and `Validation` for malformed
/// input or an unknown sub-account.
pub fn create_user<S: Store>(
    store: &S,
    ctx: &TenantContext,
    request: CreateUserRequest,
) -> Result<User> {
    guard::require_role(ctx, Role::SubAccountAdmin)?;
    if request.role > ctx.user_role {
        return Err(CrmError::Forbidden(format!(
            "cannot grant role {} above your own",
            request.role
        )));
    }
    let email = require_email(&request.email)?;
    let display_name = require_name(&request.display_name, "display name")?;
    let sub_account_id = crate::leads::target_sub_account(store, ctx, request.sub_account_id)?;

    let user = User {
        user_id: UserId::generate(),
        tenant_id: ctx.tenant_id,
        sub_account_id,
        role: request.role,
        email,
        display_name,
        created_at: Utc::now(),
    };

    let mut activity = ctx.activity(
        ActivityKind::UserCreated,
        sub_account_id,
        format!("Added {} as {}", user.display_name, user.role),
    );
    activity.metadata = serde_json::json!({ "user_id": user.user_id, "role": user.role });

    store.apply(vec![
        WriteOp::PutUser(user.clone()),
        WriteOp::AppendActivity(activity),
    ])?;

    tracing::info!(
        user_id = %user.user_id,
        tenant_id = %ctx.tenant_id,
        role = %user.role,
        "Created user"
    );

    Ok(user)
}

/// Create a sub-account within the caller's tenant.
///
/// # Errors
///
/// Returns `Validation` if the tenant does not allow sub-accounts or is at
/// its `max_sub_accounts` limit.
pub fn create_sub_account<S: Store>(
    store: &S,
    ctx: &TenantContext,
    request: CreateSubAccountRequest,
) -> Result<SubAccount> {
    guard::require_role(ctx, Role::TenantAdmin)?;
    let name = require_name(&request.name, "sub-account name")?;

    let settings = &ctx.tenant.settings;
    if !settings.allow_sub_accounts {
        return Err(CrmError::Validation(
            "this tenant does not allow sub-accounts".to_string(),
        ));
    }
    let sub_account = SubAccount {
        sub_account_id: SubAccountId::generate(),
        tenant_id: ctx.tenant_id,
        name,
        description: request.description,
        settings: request.settings,
        created_at: Utc::now(),
    };
    let activity = ctx.activity(
        ActivityKind::SubAccountCreated,
        Some(sub_account.sub_account_id),
        format!("Created sub-account {}", sub_account.name),
    );

    store.insert_sub_account(&sub_account, &activity, settings.max_sub_accounts as usize)?;

    tracing::info!(
        sub_account_id = %sub_account.sub_account_id,
        tenant_id = %ctx.tenant_id,
        "Created sub-account"
    );

    Ok(sub_account)
}

/// Sub-accounts visible to the context.
///
/// # Errors
///
/// Returns `Forbidden` below `agent`.
pub fn list_sub_accounts<S: Store>(store: &S, ctx: &TenantContext) -> Result<Vec<SubAccount>> {
    guard::require_role(ctx, Role::Agent)?;
    let scope = guard::require_tenant_scope(ctx);
    let mut subs: Vec<SubAccount> = store
        .list_sub_accounts(&ctx.tenant_id)?
        .into_iter()
        .filter(|sub| scope.contains(&sub.tenant_id, Some(&sub.sub_account_id)))
        .collect();
    subs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(subs)
}
