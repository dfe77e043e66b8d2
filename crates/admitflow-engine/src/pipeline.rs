//! Pipeline stage engine.
//!
//! Items are leads or applications; their `status` names the stage they sit
//! in. Moves and assignments go through [`Store::commit_item_change`], which
//! checks the observed stage and writes the status, the history entry and the
//! activity together.
//!
//! Stage transitions are not constrained by `order`: any declared stage may
//! be entered from any other.

use std::collections::{HashMap, HashSet};

use admitflow_core::{ItemId, PipelineId, Role, SubAccountId, TenantId, UserId};
use admitflow_store::{
    Activity, ActivityKind, EngagementEvent, EngagementKind, ItemChange, ItemMutation, Pipeline,
    PipelineRecord, PipelineType, Scope, Stage, Store, WriteOp,
};
use chrono::Utc;

use crate::context::TenantContext;
use crate::error::{CrmError, Result};
use crate::types::{
    BulkItemResult, CreatePipelineRequest, PipelineItem, PipelineItems, StageBucket, StageInput,
};
use crate::{guard, leads};

/// Color given to custom stages created without one.
pub const DEFAULT_STAGE_COLOR: &str = "#6b7280";

const LEAD_STAGES: [(&str, &str, &str); 5] = [
    ("new", "New", "#3b82f6"),
    ("contacted", "Contacted", "#8b5cf6"),
    ("qualified", "Qualified", "#f59e0b"),
    ("proposal", "Proposal", "#ec4899"),
    ("converted", "Converted", "#10b981"),
];

const APPLICATION_STAGES: [(&str, &str, &str); 5] = [
    ("draft", "Draft", "#94a3b8"),
    ("submitted", "Submitted", "#3b82f6"),
    ("under_review", "Under Review", "#f59e0b"),
    ("accepted", "Accepted", "#10b981"),
    ("enrolled", "Enrolled", "#059669"),
];

/// The canonical five stages of a default pipeline.
#[must_use]
pub fn default_stages(pipeline_type: PipelineType) -> Vec<Stage> {
    let table = match pipeline_type {
        PipelineType::Lead => &LEAD_STAGES,
        PipelineType::Application => &APPLICATION_STAGES,
    };
    (1..)
        .zip(table.iter())
        .map(|(order, (id, name, color))| Stage {
            id: (*id).to_string(),
            name: (*name).to_string(),
            order,
            color: (*color).to_string(),
            description: None,
        })
        .collect()
}

/// Build (but do not persist) the default pipeline for a scope and type.
#[must_use]
pub fn build_default_pipeline(
    tenant_id: TenantId,
    sub_account_id: Option<SubAccountId>,
    pipeline_type: PipelineType,
) -> Pipeline {
    let now = Utc::now();
    let name = match pipeline_type {
        PipelineType::Lead => "Lead Pipeline",
        PipelineType::Application => "Application Pipeline",
    };
    Pipeline {
        pipeline_id: PipelineId::generate(),
        tenant_id,
        sub_account_id,
        name: name.to_string(),
        pipeline_type,
        stages: default_stages(pipeline_type),
        is_default: true,
        created_at: now,
        updated_at: now,
    }
}

/// The stage a new item of `pipeline_type` starts in.
///
/// Uses the lowest stage of the sub-account's default pipeline, then the
/// tenant's, then the built-in first stage.
///
/// # Errors
///
/// Returns `CrmError::Storage` if the lookup fails.
pub fn initial_stage<S: Store>(
    store: &S,
    tenant_id: &TenantId,
    sub_account_id: Option<&SubAccountId>,
    pipeline_type: PipelineType,
) -> Result<String> {
    let mut default = None;
    if sub_account_id.is_some() {
        default = store.find_default_pipeline(tenant_id, sub_account_id, pipeline_type)?;
    }
    if default.is_none() {
        default = store.find_default_pipeline(tenant_id, None, pipeline_type)?;
    }

    Ok(default
        .as_ref()
        .and_then(Pipeline::first_stage)
        .map_or_else(
            || match pipeline_type {
                PipelineType::Lead => LEAD_STAGES[0].0.to_string(),
                PipelineType::Application => APPLICATION_STAGES[0].0.to_string(),
            },
            |stage| stage.id.clone(),
        ))
}

fn pipeline_activity(ctx: &TenantContext, kind: ActivityKind, pipeline: &Pipeline) -> Activity {
    let verb = match kind {
        ActivityKind::PipelineDeleted => "Deleted",
        _ => "Created",
    };
    let mut activity = ctx.activity(
        kind,
        pipeline.sub_account_id,
        format!("{verb} pipeline {}", pipeline.name),
    );
    activity.metadata = serde_json::json!({
        "pipeline_id": pipeline.pipeline_id,
        "pipeline_type": pipeline.pipeline_type,
        "is_default": pipeline.is_default,
    });
    activity
}

fn item_activity(
    ctx: &TenantContext,
    kind: ActivityKind,
    record: &PipelineRecord,
    description: String,
    metadata: serde_json::Value,
) -> Activity {
    let mut activity = ctx.activity(kind, record.sub_account_id().copied(), description);
    match record {
        PipelineRecord::Lead(lead) => activity.lead_id = Some(lead.lead_id),
        PipelineRecord::Application(app) => {
            activity.lead_id = Some(app.lead_id);
            activity.application_id = Some(app.application_id);
        }
    }
    activity.metadata = metadata;
    activity
}

// =============================================================================
// Pipelines
// =============================================================================

/// Create the protected default pipeline for a scope and type.
///
/// A tenant-level default requires `tenant_admin`; a sub-account default
/// requires `sub_account_admin` over that sub-account.
///
/// # Errors
///
/// Returns `Conflict` if a default already exists for the scope and type.
pub fn create_default<S: Store>(
    store: &S,
    ctx: &TenantContext,
    sub_account_id: Option<SubAccountId>,
    pipeline_type: PipelineType,
) -> Result<Pipeline> {
    match sub_account_id {
        None => guard::require_role(ctx, Role::TenantAdmin)?,
        Some(sub_account_id) => {
            guard::require_role(ctx, Role::SubAccountAdmin)?;
            store
                .get_sub_account(&sub_account_id)?
                .filter(|sub| sub.tenant_id == ctx.tenant_id)
                .ok_or(CrmError::NotFound("sub-account"))?;
            if !ctx.scope().contains(&ctx.tenant_id, Some(&sub_account_id)) {
                return Err(CrmError::Forbidden(
                    "sub-account is outside your scope".to_string(),
                ));
            }
        }
    }

    let pipeline = build_default_pipeline(ctx.tenant_id, sub_account_id, pipeline_type);
    let activity = pipeline_activity(ctx, ActivityKind::PipelineCreated, &pipeline);
    store
        .insert_default_pipeline(&pipeline, &activity)
        .map_err(|e| match e {
            admitflow_store::StoreError::AlreadyExists(_) => CrmError::Conflict(format!(
                "a default {} pipeline already exists",
                pipeline_type.as_str()
            )),
            other => other.into(),
        })?;

    tracing::info!(
        pipeline_id = %pipeline.pipeline_id,
        tenant_id = %ctx.tenant_id,
        pipeline_type = pipeline_type.as_str(),
        "Created default pipeline"
    );

    Ok(pipeline)
}

fn build_stages(inputs: Vec<StageInput>) -> Result<Vec<Stage>> {
    if inputs.is_empty() {
        return Err(CrmError::Validation(
            "a pipeline needs at least one stage".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    (1..)
        .zip(inputs)
        .map(|(order, input)| {
            let id = input.id.trim().to_string();
            if id.is_empty() || input.name.trim().is_empty() {
                return Err(CrmError::Validation(
                    "stage id and name are required".to_string(),
                ));
            }
            if !seen.insert(id.clone()) {
                return Err(CrmError::Validation(format!("duplicate stage id: {id}")));
            }
            Ok(Stage {
                id,
                name: input.name.trim().to_string(),
                order,
                color: input
                    .color
                    .unwrap_or_else(|| DEFAULT_STAGE_COLOR.to_string()),
                description: input.description,
            })
        })
        .collect()
}

/// Create a custom, non-default pipeline.
///
/// # Errors
///
/// Returns `Validation` for an empty name or malformed stages and
/// `Forbidden` for a sub-account outside the caller's scope.
pub fn create<S: Store>(
    store: &S,
    ctx: &TenantContext,
    request: CreatePipelineRequest,
) -> Result<Pipeline> {
    guard::require_role(ctx, Role::SubAccountAdmin)?;
    if request.name.trim().is_empty() {
        return Err(CrmError::Validation("pipeline name is required".to_string()));
    }
    let stages = build_stages(request.stages)?;

    // Tenant-wide callers get a tenant-level pipeline unless they name one.
    let sub_account_id = match request.sub_account_id {
        None if ctx.scope().sub_account_id.is_none() => None,
        requested => leads::target_sub_account(store, ctx, requested)?,
    };

    let now = Utc::now();
    let pipeline = Pipeline {
        pipeline_id: PipelineId::generate(),
        tenant_id: ctx.tenant_id,
        sub_account_id,
        name: request.name.trim().to_string(),
        pipeline_type: request.pipeline_type,
        stages,
        is_default: false,
        created_at: now,
        updated_at: now,
    };

    store.apply(vec![
        WriteOp::PutPipeline(pipeline.clone()),
        WriteOp::AppendActivity(pipeline_activity(ctx, ActivityKind::PipelineCreated, &pipeline)),
    ])?;

    tracing::info!(
        pipeline_id = %pipeline.pipeline_id,
        tenant_id = %ctx.tenant_id,
        stages = pipeline.stages.len(),
        "Created pipeline"
    );

    Ok(pipeline)
}

/// Pipelines visible to the context: tenant-level ones plus those of its
/// sub-account (every sub-account for tenant-wide scope).
///
/// # Errors
///
/// Returns `Forbidden` below `agent`.
pub fn list<S: Store>(store: &S, ctx: &TenantContext) -> Result<Vec<Pipeline>> {
    guard::require_role(ctx, Role::Agent)?;
    let scope = guard::require_tenant_scope(ctx);

    let mut pipelines: Vec<Pipeline> = store
        .list_pipelines(&ctx.tenant_id)?
        .into_iter()
        .filter(|p| {
            p.sub_account_id.is_none() || scope.contains(&p.tenant_id, p.sub_account_id.as_ref())
        })
        .collect();
    pipelines.sort_by_key(|p| p.created_at);
    Ok(pipelines)
}

/// Load a pipeline visible to the context.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden`.
pub fn get<S: Store>(store: &S, ctx: &TenantContext, pipeline_id: &PipelineId) -> Result<Pipeline> {
    guard::require_role(ctx, Role::Agent)?;
    guard::require_ownership(ctx, store.get_pipeline(pipeline_id)?, "pipeline")
}

/// Delete a custom pipeline.
///
/// # Errors
///
/// Returns `Validation` for a default pipeline.
pub fn delete<S: Store>(store: &S, ctx: &TenantContext, pipeline_id: &PipelineId) -> Result<()> {
    guard::require_role(ctx, Role::SubAccountAdmin)?;
    let pipeline =
        guard::require_write_ownership(ctx, store.get_pipeline(pipeline_id)?, "pipeline")?;
    if pipeline.is_default {
        return Err(CrmError::Validation(
            "cannot delete default pipeline".to_string(),
        ));
    }

    store.apply(vec![
        WriteOp::DeletePipeline(*pipeline_id),
        WriteOp::AppendActivity(pipeline_activity(ctx, ActivityKind::PipelineDeleted, &pipeline)),
    ])?;

    tracing::info!(pipeline_id = %pipeline_id, tenant_id = %ctx.tenant_id, "Deleted pipeline");
    Ok(())
}

// =============================================================================
// Items
// =============================================================================

/// Group a pipeline's active items into its stages, including empty ones.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden` for the pipeline.
pub fn get_items<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline_id: &PipelineId,
) -> Result<PipelineItems> {
    let pipeline = get(store, ctx, pipeline_id)?;

    let scope = match pipeline.sub_account_id {
        Some(sub_account_id) => Scope::sub_account(pipeline.tenant_id, sub_account_id),
        None => guard::require_tenant_scope(ctx),
    };

    let mut by_stage: HashMap<String, Vec<PipelineItem>> = HashMap::new();
    for record in store.list_items(pipeline.pipeline_type, &scope)? {
        if record.is_active() {
            by_stage
                .entry(record.status().to_string())
                .or_default()
                .push(PipelineItem::from(&record));
        }
    }

    let stages = pipeline
        .ordered_stages()
        .into_iter()
        .map(|stage| StageBucket {
            items: by_stage.remove(&stage.id).unwrap_or_default(),
            stage: stage.clone(),
        })
        .collect();
    let unstaged = by_stage.into_values().flatten().collect();

    Ok(PipelineItems {
        pipeline,
        stages,
        unstaged,
    })
}

fn load_item<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline: &Pipeline,
    item_id: &ItemId,
) -> Result<PipelineRecord> {
    let record = guard::require_ownership(
        ctx,
        store.get_item(pipeline.pipeline_type, item_id)?,
        "item",
    )?;
    if !record.is_active() {
        return Err(CrmError::NotFound("item"));
    }
    // A sub-account pipeline only carries that sub-account's items.
    if let Some(sub_account_id) = &pipeline.sub_account_id {
        if record.sub_account_id() != Some(sub_account_id) {
            tracing::debug!(
                item_id = %item_id,
                pipeline_id = %pipeline.pipeline_id,
                "Item is outside the pipeline's sub-account"
            );
            return Err(CrmError::NotFound("item"));
        }
    }
    Ok(record)
}

fn transition<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline: &Pipeline,
    record: &PipelineRecord,
    from_stage: &str,
    to_stage: &str,
) -> Result<PipelineRecord> {
    let target = pipeline.stage(to_stage).ok_or_else(|| {
        CrmError::Validation(format!(
            "{to_stage} is not a stage of pipeline {}",
            pipeline.pipeline_id
        ))
    })?;

    let metadata = serde_json::json!({
        "pipeline_id": pipeline.pipeline_id,
        "from": from_stage,
        "to": to_stage,
    });
    let activity = item_activity(
        ctx,
        ActivityKind::PipelineItemMoved,
        record,
        format!("Moved item from {from_stage} to {}", target.name),
        metadata.clone(),
    );

    let updated = store
        .commit_item_change(ItemChange {
            pipeline_type: pipeline.pipeline_type,
            item_id: record.item_id(),
            expected_status: from_stage.to_string(),
            mutation: ItemMutation::Move {
                to_stage: to_stage.to_string(),
            },
            event: EngagementEvent {
                kind: EngagementKind::StageChanged,
                description: format!("Moved from {from_stage} to {to_stage}"),
                actor_id: Some(ctx.user_id),
                metadata,
                occurred_at: Utc::now(),
            },
            activity: Some(activity),
        })
        .map_err(|e| match e {
            admitflow_store::StoreError::StatusConflict { actual, .. } => CrmError::Conflict(
                format!("item is in stage {actual}, not {from_stage}"),
            ),
            other => other.into(),
        })?;

    tracing::info!(
        item_id = %record.item_id(),
        pipeline_id = %pipeline.pipeline_id,
        from = from_stage,
        to = to_stage,
        user_id = %ctx.user_id,
        "Moved pipeline item"
    );

    Ok(updated)
}

/// Move one item between stages of a pipeline.
///
/// Moving to the stage the item is already in is a no-op.
///
/// # Errors
///
/// Returns `NotFound`/`Forbidden` for the pipeline or item, `Validation` for
/// an unknown target stage, and `Conflict` if the item is no longer in
/// `from_stage`.
pub fn move_item<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline_id: &PipelineId,
    item_id: &ItemId,
    from_stage: &str,
    to_stage: &str,
) -> Result<PipelineItem> {
    let pipeline = get(store, ctx, pipeline_id)?;
    let record = load_item(store, ctx, &pipeline, item_id)?;

    if !pipeline.has_stage(to_stage) {
        return Err(CrmError::Validation(format!(
            "{to_stage} is not a stage of pipeline {pipeline_id}"
        )));
    }
    if from_stage == to_stage {
        return Ok(PipelineItem::from(&record));
    }

    let updated = transition(store, ctx, &pipeline, &record, from_stage, to_stage)?;
    Ok(PipelineItem::from(&updated))
}

// =============================================================================
// Bulk
// =============================================================================

/// Run `op` for each id independently, collecting one result per id.
///
/// Ids past `max_items` are reported as validation failures.
pub fn run_bulk<F>(item_ids: &[ItemId], max_items: usize, mut op: F) -> Vec<BulkItemResult>
where
    F: FnMut(&ItemId) -> Result<()>,
{
    item_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let outcome = if i < max_items {
                op(id)
            } else {
                Err(CrmError::Validation(format!(
                    "bulk requests are limited to {max_items} items"
                )))
            };
            match outcome {
                Ok(()) => BulkItemResult::ok(*id),
                Err(e) => {
                    tracing::debug!(item_id = %id, error = %e, "Bulk item failed");
                    BulkItemResult::failed(*id, &e)
                }
            }
        })
        .collect()
}

fn fail_all(item_ids: &[ItemId], err: &CrmError) -> Vec<BulkItemResult> {
    item_ids
        .iter()
        .map(|id| BulkItemResult::failed(*id, err))
        .collect()
}

/// Move many items to one stage, each independently.
#[must_use]
pub fn bulk_move<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline_id: &PipelineId,
    item_ids: &[ItemId],
    to_stage: &str,
    max_items: usize,
) -> Vec<BulkItemResult> {
    let pipeline = match get(store, ctx, pipeline_id) {
        Ok(pipeline) => pipeline,
        Err(e) => return fail_all(item_ids, &e),
    };

    let results = run_bulk(item_ids, max_items, |id| {
        let record = load_item(store, ctx, &pipeline, id)?;
        let from_stage = record.status().to_string();
        if from_stage != to_stage {
            transition(store, ctx, &pipeline, &record, &from_stage, to_stage)?;
        }
        Ok(())
    });

    tracing::info!(
        pipeline_id = %pipeline_id,
        requested = item_ids.len(),
        succeeded = results.iter().filter(|r| r.success).count(),
        "Bulk move finished"
    );
    results
}

/// Assign many items to one agent, each independently.
#[must_use]
pub fn bulk_assign<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline_id: &PipelineId,
    item_ids: &[ItemId],
    agent_id: &UserId,
    max_items: usize,
) -> Vec<BulkItemResult> {
    let setup = guard::require_role(ctx, Role::SubAccountAdmin)
        .and_then(|()| leads::validate_assignee(store, ctx, agent_id))
        .and_then(|()| get(store, ctx, pipeline_id));
    let pipeline = match setup {
        Ok(pipeline) => pipeline,
        Err(e) => return fail_all(item_ids, &e),
    };

    let results = run_bulk(item_ids, max_items, |id| {
        let record = load_item(store, ctx, &pipeline, id)?;
        if record.assigned_to() == Some(agent_id) {
            return Ok(());
        }

        let metadata = serde_json::json!({
            "pipeline_id": pipeline.pipeline_id,
            "from": record.assigned_to(),
            "to": agent_id,
        });
        let activity = item_activity(
            ctx,
            ActivityKind::PipelineItemAssigned,
            &record,
            format!("Assigned item to {agent_id}"),
            metadata.clone(),
        );
        store
            .commit_item_change(ItemChange {
                pipeline_type: pipeline.pipeline_type,
                item_id: *id,
                expected_status: record.status().to_string(),
                mutation: ItemMutation::Assign {
                    agent_id: Some(*agent_id),
                },
                event: EngagementEvent {
                    kind: EngagementKind::Assigned,
                    description: format!("Assigned to {agent_id}"),
                    actor_id: Some(ctx.user_id),
                    metadata,
                    occurred_at: Utc::now(),
                },
                activity: Some(activity),
            })
            .map_err(|e| match e {
                admitflow_store::StoreError::StatusConflict { .. } => {
                    CrmError::Conflict("item changed stage during assignment".to_string())
                }
                other => other.into(),
            })?;
        Ok(())
    });

    tracing::info!(
        pipeline_id = %pipeline_id,
        agent_id = %agent_id,
        requested = item_ids.len(),
        succeeded = results.iter().filter(|r| r.success).count(),
        "Bulk assign finished"
    );
    results
}
