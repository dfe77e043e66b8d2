//! Lead intake, deduplication and enrichment.
//!
//! Intake persists a lead together with its `lead_created` history entry and
//! activity. Enrichment runs after the lead is durable and only appends to the
//! lead's history; its failures are logged and never reach the caller.

use std::time::Duration;

use admitflow_core::{ApplicationId, ItemId, LeadId, Role, SubAccountId, TenantId, UserId};
use admitflow_store::{
    ActivityKind, Application, EngagementEvent, EngagementKind, ItemChange, ItemMutation, Lead,
    PipelineRecord, PipelineType, Scope, Store, WriteOp,
};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::context::TenantContext;
use crate::error::{CrmError, Result};
use crate::types::{CreateApplicationRequest, EngineConfig, LeadCandidate};
use crate::{guard, pipeline, scoring};

const DEFAULT_SOURCE: &str = "manual";

/// Failure reported by an external lead scorer.
#[derive(Debug, Error)]
#[error("scorer failed: {0}")]
pub struct ScorerError(pub String);

/// An optional external (AI) lead scorer.
///
/// Its result replaces the rule-based score during enrichment. The engine
/// treats it as best-effort: errors, timeouts and non-finite values keep the
/// rule-based score.
#[async_trait]
pub trait LeadScorer: Send + Sync {
    /// Score a lead; values outside `0..=100` are clamped.
    ///
    /// # Errors
    ///
    /// Returns an error if the scorer is unavailable.
    async fn score(&self, lead: &Lead) -> std::result::Result<f64, ScorerError>;
}

/// Returns true if `existing` looks like the same person as `candidate`.
///
/// Matches on any of: exact email with exact first and last name, equal phone
/// (when the candidate has one), or case-insensitive full-name match with the
/// candidate's email local part contained in the existing email.
#[must_use]
pub fn is_duplicate(existing: &Lead, candidate: &LeadCandidate) -> bool {
    let exact_identity = existing.email == candidate.email
        && existing.first_name == candidate.first_name
        && existing.last_name == candidate.last_name;
    if exact_identity {
        return true;
    }

    if let Some(phone) = candidate.phone.as_deref().map(str::trim) {
        if !phone.is_empty() && existing.phone.as_deref().map(str::trim) == Some(phone) {
            return true;
        }
    }

    let same_name = existing
        .first_name
        .trim()
        .eq_ignore_ascii_case(candidate.first_name.trim())
        && existing
            .last_name
            .trim()
            .eq_ignore_ascii_case(candidate.last_name.trim());
    same_name
        && scoring::email_local_part(&candidate.email)
            .is_some_and(|local| existing.email.to_ascii_lowercase().contains(&local))
}

/// Find active leads of a tenant that collide with a candidate.
///
/// # Errors
///
/// Returns `CrmError::Storage` if the lookup fails.
pub fn detect_duplicates<S: Store>(
    store: &S,
    candidate: &LeadCandidate,
    tenant_id: &TenantId,
) -> Result<Vec<Lead>> {
    Ok(store
        .list_leads(&Scope::tenant(*tenant_id))?
        .into_iter()
        .filter(|lead| lead.is_active && is_duplicate(lead, candidate))
        .collect())
}

fn validate_candidate(candidate: &LeadCandidate) -> Result<()> {
    if candidate.first_name.trim().is_empty() || candidate.last_name.trim().is_empty() {
        return Err(CrmError::Validation(
            "first_name and last_name are required".to_string(),
        ));
    }
    if scoring::email_local_part(&candidate.email).is_none()
        || scoring::email_domain(&candidate.email).is_none()
    {
        return Err(CrmError::Validation(format!(
            "invalid email address: {}",
            candidate.email
        )));
    }
    if candidate.budget.is_some_and(|b| !b.is_finite() || b < 0.0) {
        return Err(CrmError::Validation(
            "budget must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

/// Decide which sub-account a new record belongs to.
///
/// Confined principals always write into their own sub-account; tenant-wide
/// principals may target any sub-account of the tenant.
pub(crate) fn target_sub_account<S: Store>(
    store: &S,
    ctx: &TenantContext,
    requested: Option<SubAccountId>,
) -> Result<Option<SubAccountId>> {
    match (ctx.scope().sub_account_id, requested) {
        (Some(own), Some(other)) if own != other => Err(CrmError::Forbidden(
            "cannot write into another sub-account".to_string(),
        )),
        (Some(own), _) => Ok(Some(own)),
        (None, Some(requested)) => {
            store
                .get_sub_account(&requested)?
                .filter(|sub| sub.tenant_id == ctx.tenant_id)
                .ok_or_else(|| CrmError::Validation(format!("unknown sub-account: {requested}")))?;
            Ok(Some(requested))
        }
        (None, None) => Ok(ctx.sub_account_id),
    }
}

/// Verify that a user may be assigned work in the context's tenant.
pub(crate) fn validate_assignee<S: Store>(
    store: &S,
    ctx: &TenantContext,
    agent_id: &UserId,
) -> Result<()> {
    match store.get_user(agent_id)? {
        Some(user) if user.tenant_id == ctx.tenant_id && user.role.satisfies(Role::Agent) => Ok(()),
        _ => Err(CrmError::Validation(format!(
            "assignee {agent_id} is not an agent of this tenant"
        ))),
    }
}

fn into_lead(record: PipelineRecord) -> Result<Lead> {
    match record {
        PipelineRecord::Lead(lead) => Ok(lead),
        PipelineRecord::Application(_) => Err(CrmError::NotFound("lead")),
    }
}

/// Validate, deduplicate and persist a new lead.
///
/// # Errors
///
/// Returns `CrmError::Validation` for malformed input,
/// `CrmError::DuplicateLead` naming the colliding leads, or `Forbidden` if the
/// principal may not create leads in the requested sub-account.
pub fn create_with_validation<S: Store>(
    store: &S,
    ctx: &TenantContext,
    candidate: LeadCandidate,
) -> Result<Lead> {
    guard::require_role(ctx, Role::Agent)?;
    validate_candidate(&candidate)?;

    let sub_account_id = target_sub_account(store, ctx, candidate.sub_account_id)?;
    if let Some(agent_id) = &candidate.assigned_agent_id {
        validate_assignee(store, ctx, agent_id)?;
    }

    let status = pipeline::initial_stage(
        store,
        &ctx.tenant_id,
        sub_account_id.as_ref(),
        PipelineType::Lead,
    )?;
    let now = Utc::now();
    let lead_id = LeadId::generate();
    let source = candidate
        .source
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let lead = Lead {
        lead_id,
        tenant_id: ctx.tenant_id,
        sub_account_id,
        assigned_agent_id: candidate.assigned_agent_id,
        first_name: candidate.first_name.trim().to_string(),
        last_name: candidate.last_name.trim().to_string(),
        email: candidate.email.trim().to_string(),
        phone: candidate.phone.clone().filter(|p| !p.trim().is_empty()),
        source,
        source_category: None,
        status,
        score: 0,
        program_interest: candidate.program_interest.clone(),
        target_country: candidate.target_country.clone(),
        budget: candidate.budget,
        engagement_history: vec![EngagementEvent {
            kind: EngagementKind::LeadCreated,
            description: "Lead created".to_string(),
            actor_id: Some(ctx.user_id),
            metadata: serde_json::Value::Null,
            occurred_at: now,
        }],
        custom_fields: candidate.custom_fields.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let mut activity = ctx.activity(
        ActivityKind::LeadCreated,
        sub_account_id,
        format!("Created lead {}", lead.full_name()),
    );
    activity.lead_id = Some(lead_id);

    // Detection runs under the store's write guard.
    let duplicates = store.insert_lead_unless_duplicate(&lead, &activity, &|existing| {
        is_duplicate(existing, &candidate)
    })?;
    if !duplicates.is_empty() {
        let lead_ids: Vec<LeadId> = duplicates.iter().map(|lead| lead.lead_id).collect();
        tracing::info!(
            tenant_id = %ctx.tenant_id,
            duplicates = lead_ids.len(),
            "Rejected duplicate lead"
        );
        return Err(CrmError::DuplicateLead { lead_ids });
    }

    tracing::info!(
        lead_id = %lead_id,
        tenant_id = %ctx.tenant_id,
        status = %lead.status,
        "Created lead"
    );

    Ok(lead)
}

/// Score and categorise a persisted lead.
///
/// # Errors
///
/// Returns an error if the enriched lead cannot be written back. Scorer
/// failures are not errors.
pub async fn enrich<S: Store>(
    store: &S,
    scorer: Option<&dyn LeadScorer>,
    config: &EngineConfig,
    lead: &Lead,
) -> Result<Lead> {
    let rule_score = scoring::score(lead, &config.scoring);
    let source_category = scoring::categorize_source(&lead.source);

    let final_score = match scorer {
        None => rule_score,
        Some(scorer) => {
            let budget = Duration::from_millis(config.scorer_timeout_ms);
            match tokio::time::timeout(budget, scorer.score(lead)).await {
                Ok(Ok(value)) if value.is_finite() => {
                    // Clamped to 0..=100 before the cast.
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let clamped = value.round().clamp(0.0, 100.0) as u8;
                    clamped
                }
                Ok(Ok(value)) => {
                    tracing::warn!(
                        lead_id = %lead.lead_id,
                        value,
                        "Scorer returned non-finite value"
                    );
                    rule_score
                }
                Ok(Err(e)) => {
                    tracing::warn!(lead_id = %lead.lead_id, error = %e, "Scorer failed");
                    rule_score
                }
                Err(_) => {
                    tracing::warn!(
                        lead_id = %lead.lead_id,
                        timeout_ms = config.scorer_timeout_ms,
                        "Scorer timed out"
                    );
                    rule_score
                }
            }
        }
    };

    let metadata = serde_json::json!({
        "score": final_score,
        "rule_score": rule_score,
        "source_category": source_category,
    });

    // Part of intake: recorded in the lead's history, not as a second activity.
    let record = store.commit_item_change(ItemChange {
        pipeline_type: PipelineType::Lead,
        item_id: ItemId::from(lead.lead_id),
        expected_status: lead.status.clone(),
        mutation: ItemMutation::Enrich {
            score: final_score,
            source_category,
        },
        event: EngagementEvent {
            kind: EngagementKind::LeadEnriched,
            description: format!("Scored {final_score}"),
            actor_id: None,
            metadata,
            occurred_at: Utc::now(),
        },
        activity: None,
    })?;

    tracing::info!(
        lead_id = %lead.lead_id,
        score = final_score,
        source_category = ?source_category,
        "Enriched lead"
    );

    into_lead(record)
}

/// Soft-delete a lead. Deactivating an inactive lead is a no-op.
///
/// # Errors
///
/// Returns `NotFound`/`Forbidden` from the ownership check.
pub fn deactivate<S: Store>(store: &S, ctx: &TenantContext, lead_id: &LeadId) -> Result<Lead> {
    guard::require_role(ctx, Role::Agent)?;
    let lead = guard::require_ownership(ctx, store.get_lead(lead_id)?, "lead")?;
    if !lead.is_active {
        return Ok(lead);
    }

    let mut activity = ctx.activity(
        ActivityKind::LeadDeactivated,
        lead.sub_account_id,
        format!("Deactivated lead {}", lead.full_name()),
    );
    activity.lead_id = Some(*lead_id);

    let record = store.commit_item_change(ItemChange {
        pipeline_type: PipelineType::Lead,
        item_id: ItemId::from(*lead_id),
        expected_status: lead.status.clone(),
        mutation: ItemMutation::Deactivate,
        event: EngagementEvent {
            kind: EngagementKind::Deactivated,
            description: "Lead deactivated".to_string(),
            actor_id: Some(ctx.user_id),
            metadata: serde_json::Value::Null,
            occurred_at: Utc::now(),
        },
        activity: Some(activity),
    })?;

    tracing::info!(lead_id = %lead_id, "Deactivated lead");

    into_lead(record)
}

/// Open an application for an active lead.
///
/// The application starts in the initial stage of the default application
/// pipeline.
///
/// # Errors
///
/// Returns `NotFound`/`Forbidden` from the ownership check, or `Validation`
/// if the lead is inactive or the assignee is not an agent of the tenant.
pub fn create_application<S: Store>(
    store: &S,
    ctx: &TenantContext,
    request: CreateApplicationRequest,
) -> Result<Application> {
    guard::require_role(ctx, Role::Agent)?;
    let lead = guard::require_ownership(ctx, store.get_lead(&request.lead_id)?, "lead")?;
    if !lead.is_active {
        return Err(CrmError::Validation(format!(
            "lead {} is inactive",
            lead.lead_id
        )));
    }

    let assigned_agent_id = request.assigned_agent_id.or(lead.assigned_agent_id);
    if let Some(agent_id) = &request.assigned_agent_id {
        validate_assignee(store, ctx, agent_id)?;
    }

    let status = pipeline::initial_stage(
        store,
        &lead.tenant_id,
        lead.sub_account_id.as_ref(),
        PipelineType::Application,
    )?;
    let now = Utc::now();
    let application_id = ApplicationId::generate();

    let application = Application {
        application_id,
        tenant_id: lead.tenant_id,
        sub_account_id: lead.sub_account_id,
        lead_id: lead.lead_id,
        program_id: request.program_id,
        assigned_agent_id,
        status,
        timeline: vec![EngagementEvent {
            kind: EngagementKind::ApplicationCreated,
            description: "Application opened".to_string(),
            actor_id: Some(ctx.user_id),
            metadata: serde_json::json!({ "program_id": request.program_id }),
            occurred_at: now,
        }],
        created_at: now,
        updated_at: now,
    };

    let mut activity = ctx.activity(
        ActivityKind::ApplicationCreated,
        lead.sub_account_id,
        format!("Opened application for {}", lead.full_name()),
    );
    activity.lead_id = Some(lead.lead_id);
    activity.application_id = Some(application_id);

    store.apply(vec![
        WriteOp::PutApplication(application.clone()),
        WriteOp::AppendActivity(activity),
    ])?;

    tracing::info!(
        application_id = %application_id,
        lead_id = %lead.lead_id,
        status = %application.status,
        "Created application"
    );

    Ok(application)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(first: &str, last: &str, email: &str, phone: Option<&str>) -> Lead {
        Lead {
            lead_id: LeadId::generate(),
            tenant_id: TenantId::generate(),
            sub_account_id: None,
            assigned_agent_id: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.to_string(),
            phone: phone.map(String::from),
            source: "website".to_string(),
            source_category: None,
            status: "new".to_string(),
            score: 50,
            program_interest: None,
            target_country: None,
            budget: None,
            engagement_history: Vec::new(),
            custom_fields: std::collections::BTreeMap::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exact_identity_is_duplicate() {
        let lead = existing("Ada", "Lovelace", "ada@example.org", None);
        let candidate = LeadCandidate::new("Ada", "Lovelace", "ada@example.org");
        assert!(is_duplicate(&lead, &candidate));
    }

    #[test]
    fn same_email_different_name_is_not_duplicate() {
        let lead = existing("Ada", "Lovelace", "ada@example.org", None);
        let candidate = LeadCandidate::new("Grace", "Hopper", "ada@example.org");
        assert!(!is_duplicate(&lead, &candidate));
    }

    #[test]
    fn phone_match_is_duplicate() {
        let lead = existing("Ada", "Lovelace", "ada@example.org", Some("+1 555 0100"));
        let mut candidate = LeadCandidate::new("Augusta", "King", "augusta@example.com");
        candidate.phone = Some(" +1 555 0100 ".to_string());
        assert!(is_duplicate(&lead, &candidate));

        candidate.phone = Some(String::new());
        let no_phone = existing("Ada", "Lovelace", "ada@example.org", Some(""));
        assert!(!is_duplicate(&no_phone, &candidate));
    }

    #[test]
    fn fuzzy_name_and_local_part_is_duplicate() {
        let lead = existing("Ada", "Lovelace", "ada.lovelace@uni.ac.uk", None);
        let candidate = LeadCandidate::new("ADA", "lovelace", "Lovelace@gmail.com");
        assert!(is_duplicate(&lead, &candidate));

        let unrelated = LeadCandidate::new("Ada", "Lovelace", "countess@gmail.com");
        assert!(!is_duplicate(&lead, &unrelated));
    }

    #[test]
    fn candidate_validation() {
        assert!(validate_candidate(&LeadCandidate::new("Ada", "Lovelace", "ada@x.org")).is_ok());
        assert!(matches!(
            validate_candidate(&LeadCandidate::new("", "Lovelace", "ada@x.org")),
            Err(CrmError::Validation(_))
        ));
        assert!(matches!(
            validate_candidate(&LeadCandidate::new("Ada", "Lovelace", "ada")),
            Err(CrmError::Validation(_))
        ));

        let mut negative = LeadCandidate::new("Ada", "Lovelace", "ada@x.org");
        negative.budget = Some(-5.0);
        assert!(matches!(
            validate_candidate(&negative),
            Err(CrmError::Validation(_))
        ));
    }
}
