//! Behavioral properties of the CRM engine, exercised against a real
//! `RocksStore` through the public `Crm` API.

mod common;

use std::sync::Arc;

use admitflow_core::{ItemId, LeadId, Role};
use admitflow_engine::{
    CreatePipelineRequest, Crm, CrmError, ErrorKind, LeadCandidate, StageInput,
};
use admitflow_store::{ActivityKind, PipelineType};

use common::Harness;

// =============================================================================
// Scope leakage
// =============================================================================

#[tokio::test]
async fn other_tenants_never_see_a_resource() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let globex = h.register("Globex").await;
    let acme_ctx = h.context_for(&acme.admin).await;
    let globex_ctx = h.context_for(&globex.admin).await;

    let lead = h
        .crm
        .create_lead(&acme_ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();
    let pipeline = h.default_lead_pipeline(&acme_ctx).await;
    let item = ItemId::from(lead.lead_id);

    assert!(matches!(
        h.crm.get_lead(&globex_ctx, &lead.lead_id).await,
        Err(CrmError::NotFound(_))
    ));
    assert!(matches!(
        h.crm.get_pipeline_items(&globex_ctx, &pipeline.pipeline_id).await,
        Err(CrmError::NotFound(_))
    ));
    assert!(matches!(
        h.crm.get_analytics(&globex_ctx, &pipeline.pipeline_id).await,
        Err(CrmError::NotFound(_))
    ));
    assert!(matches!(
        h.crm
            .move_item(&globex_ctx, &pipeline.pipeline_id, &item, "new", "qualified")
            .await,
        Err(CrmError::NotFound(_))
    ));
    assert!(matches!(
        h.crm.deactivate_lead(&globex_ctx, &lead.lead_id).await,
        Err(CrmError::NotFound(_))
    ));

    // Globex's own board and lists stay empty.
    let globex_pipeline = h.default_lead_pipeline(&globex_ctx).await;
    let board = h
        .crm
        .get_pipeline_items(&globex_ctx, &globex_pipeline.pipeline_id)
        .await
        .unwrap();
    assert!(board.stages.iter().all(|bucket| bucket.items.is_empty()));
    assert!(h.crm.list_leads(&globex_ctx).await.unwrap().is_empty());
    assert!(h
        .crm
        .list_pipelines(&globex_ctx)
        .await
        .unwrap()
        .iter()
        .all(|p| p.tenant_id == globex.tenant.tenant_id));
}

#[tokio::test]
async fn other_sub_account_is_forbidden_within_tenant() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let admin = h.context_for(&acme.admin).await;
    let lagos = h.sub_account(&admin, "Lagos").await;
    let accra = h.sub_account(&admin, "Accra").await;

    let lagos_agent = h.user(&admin, Role::Agent, Some(lagos)).await;
    let accra_agent = h.user(&admin, Role::Agent, Some(accra)).await;
    let lagos_ctx = h.context_for(&lagos_agent).await;
    let accra_ctx = h.context_for(&accra_agent).await;

    let lead = h
        .crm
        .create_lead(&lagos_ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();
    assert_eq!(lead.sub_account_id, Some(lagos));

    assert!(matches!(
        h.crm.get_lead(&accra_ctx, &lead.lead_id).await,
        Err(CrmError::Forbidden(_))
    ));
    assert!(h.crm.list_leads(&accra_ctx).await.unwrap().is_empty());
    assert_eq!(h.crm.list_leads(&admin).await.unwrap().len(), 1);
}

// =============================================================================
// Role monotonicity
// =============================================================================

#[tokio::test]
async fn higher_roles_can_do_what_lower_roles_can() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let admin = h.context_for(&acme.admin).await;
    let sub = h.sub_account(&admin, "Lagos").await;

    let mut contexts = Vec::new();
    for role in [Role::Student, Role::Agent, Role::SubAccountAdmin] {
        let user = h.user(&admin, role, Some(sub)).await;
        contexts.push(h.context_for(&user).await);
    }
    contexts.push(admin.clone());

    let mut previous: Option<Vec<bool>> = None;
    for (i, ctx) in contexts.iter().enumerate() {
        let candidate = LeadCandidate::new("Role", format!("Rank{i}"), format!("rank{i}@corp.io"));
        let pipeline = h.default_lead_pipeline(&admin).await;
        let allowed = vec![
            h.crm.list_pipelines(ctx).await.is_ok(),
            h.crm.create_lead(ctx, candidate).await.is_ok(),
            h.crm.list_activities(ctx).await.is_ok(),
            h.crm
                .get_pipeline_items(ctx, &pipeline.pipeline_id)
                .await
                .is_ok(),
            h.crm
                .create_pipeline(
                    ctx,
                    CreatePipelineRequest {
                        name: format!("Custom {i}"),
                        pipeline_type: PipelineType::Lead,
                        stages: vec![StageInput {
                            id: "open".to_string(),
                            name: "Open".to_string(),
                            color: None,
                            description: None,
                        }],
                        sub_account_id: None,
                    },
                )
                .await
                .is_ok(),
        ];

        if let Some(lower) = &previous {
            for (was, now) in lower.iter().zip(&allowed) {
                assert!(!was || *now, "permission lost at {}", ctx.user_role);
            }
        }
        previous = Some(allowed);
    }
}

// =============================================================================
// Duplicate detection
// =============================================================================

#[tokio::test]
async fn duplicate_lead_conflicts_within_tenant_only() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let globex = h.register("Globex").await;
    let acme_ctx = h.context_for(&acme.admin).await;
    let globex_ctx = h.context_for(&globex.admin).await;

    let candidate = LeadCandidate::new("Ada", "Lovelace", "ada@example.org");
    let first = h.crm.create_lead(&acme_ctx, candidate.clone()).await.unwrap();

    let err = h
        .crm
        .create_lead(&acme_ctx, candidate.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let CrmError::DuplicateLead { lead_ids } = err else {
        panic!("expected a duplicate-lead conflict");
    };
    assert_eq!(lead_ids, vec![first.lead_id]);

    h.crm.create_lead(&globex_ctx, candidate).await.unwrap();
}

#[tokio::test]
async fn detect_duplicates_reports_every_match() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;

    let mut by_phone = LeadCandidate::new("Grace", "Hopper", "grace@navy.mil");
    by_phone.phone = Some("+1 555 0100".to_string());
    let phone_lead = h.crm.create_lead(&ctx, by_phone).await.unwrap();
    let name_lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada.lovelace@uni.ac.uk"))
        .await
        .unwrap();

    let mut candidate = LeadCandidate::new("ada", "LOVELACE", "lovelace@gmail.com");
    candidate.phone = Some("+1 555 0100".to_string());
    let found: Vec<LeadId> = h
        .crm
        .detect_duplicates(&ctx, &candidate)
        .await
        .unwrap()
        .into_iter()
        .map(|lead| lead.lead_id)
        .collect();

    assert_eq!(found.len(), 2);
    assert!(found.contains(&phone_lead.lead_id));
    assert!(found.contains(&name_lead.lead_id));

    let fresh = LeadCandidate::new("Alan", "Turing", "alan@bletchley.uk");
    assert!(h.crm.detect_duplicates(&ctx, &fresh).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_leads_persist_once() {
    let h = Arc::new(Harness::new());
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;

    let attempt = |h: Arc<Harness>, ctx: admitflow_engine::TenantContext| {
        tokio::spawn(async move {
            h.crm
                .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
                .await
        })
    };
    let (a, b) = tokio::join!(
        attempt(Arc::clone(&h), ctx.clone()),
        attempt(Arc::clone(&h), ctx.clone())
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = outcomes.iter().filter(|r| {
        matches!(r, Err(CrmError::DuplicateLead { lead_ids }) if lead_ids.len() == 1)
    });
    assert_eq!(rejected.count(), 1);
    assert_eq!(h.crm.list_leads(&ctx).await.unwrap().len(), 1);
}

// =============================================================================
// Stage moves
// =============================================================================

#[tokio::test]
async fn move_round_trip_records_two_entries() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;

    let lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();
    let item = ItemId::from(lead.lead_id);
    let history_before = lead.engagement_history.len();
    let moves_before = count_moves(&h, &ctx).await;

    let moved = h
        .crm
        .move_item(&ctx, &pipeline.pipeline_id, &item, "new", "proposal")
        .await
        .unwrap();
    assert_eq!(moved.status, "proposal");
    let back = h
        .crm
        .move_item(&ctx, &pipeline.pipeline_id, &item, "proposal", "new")
        .await
        .unwrap();
    assert_eq!(back.status, "new");

    let lead = h.crm.get_lead(&ctx, &lead.lead_id).await.unwrap();
    assert_eq!(lead.status, "new");
    assert_eq!(lead.engagement_history.len(), history_before + 2);
    assert_eq!(count_moves(&h, &ctx).await, moves_before + 2);
}

#[tokio::test]
async fn same_stage_move_is_a_no_op() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;
    let lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();

    let item = h
        .crm
        .move_item(&ctx, &pipeline.pipeline_id, &ItemId::from(lead.lead_id), "new", "new")
        .await
        .unwrap();
    assert_eq!(item.status, "new");
    assert_eq!(count_moves(&h, &ctx).await, 0);
}

#[tokio::test]
async fn invalid_stage_and_stale_origin_are_rejected() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;
    let lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();
    let item = ItemId::from(lead.lead_id);

    assert!(matches!(
        h.crm
            .move_item(&ctx, &pipeline.pipeline_id, &item, "new", "graduated")
            .await,
        Err(CrmError::Validation(_))
    ));
    assert!(matches!(
        h.crm
            .move_item(&ctx, &pipeline.pipeline_id, &item, "contacted", "qualified")
            .await,
        Err(CrmError::Conflict(_))
    ));

    let lead = h.crm.get_lead(&ctx, &lead.lead_id).await.unwrap();
    assert_eq!(lead.status, "new");
    assert_eq!(count_moves(&h, &ctx).await, 0);
}

#[tokio::test]
async fn moves_skip_stages_freely() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;
    let lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();
    let item = ItemId::from(lead.lead_id);

    h.crm
        .move_item(&ctx, &pipeline.pipeline_id, &item, "new", "converted")
        .await
        .unwrap();
    h.crm
        .move_item(&ctx, &pipeline.pipeline_id, &item, "converted", "contacted")
        .await
        .unwrap();
}

#[tokio::test]
async fn sub_account_pipeline_rejects_items_of_another_sub_account() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let admin = h.context_for(&acme.admin).await;
    let lagos = h.sub_account(&admin, "Lagos").await;
    let accra = h.sub_account(&admin, "Accra").await;

    let lagos_pipeline = h
        .crm
        .create_default_pipeline(&admin, Some(lagos), PipelineType::Lead)
        .await
        .unwrap();

    let mut candidate = LeadCandidate::new("Kofi", "Mensah", "kofi@example.com.gh");
    candidate.sub_account_id = Some(accra);
    let accra_lead = h.crm.create_lead(&admin, candidate).await.unwrap();
    let item = ItemId::from(accra_lead.lead_id);

    let moved = h
        .crm
        .move_item(&admin, &lagos_pipeline.pipeline_id, &item, "new", "contacted")
        .await;
    assert!(matches!(moved, Err(CrmError::NotFound(_))));

    let results = h
        .crm
        .bulk_move(&admin, &lagos_pipeline.pipeline_id, &[item], "contacted")
        .await;
    assert_eq!(results[0].error.as_ref().unwrap().code, ErrorKind::NotFound);

    let lead = h.crm.get_lead(&admin, &accra_lead.lead_id).await.unwrap();
    assert_eq!(lead.status, "new");
    assert_eq!(count_moves(&h, &admin).await, 0);
}

async fn count_moves(h: &Harness, ctx: &admitflow_engine::TenantContext) -> usize {
    h.crm
        .list_activities(ctx)
        .await
        .unwrap()
        .iter()
        .filter(|a| a.kind == ActivityKind::PipelineItemMoved)
        .count()
}

// =============================================================================
// Default pipeline singleton
// =============================================================================

#[tokio::test]
async fn default_pipeline_is_singleton_and_protected() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;

    let second = h
        .crm
        .create_default_pipeline(&ctx, None, PipelineType::Lead)
        .await;
    assert!(matches!(second, Err(CrmError::Conflict(_))));

    let pipeline = h.default_lead_pipeline(&ctx).await;
    assert!(matches!(
        h.crm.delete_pipeline(&ctx, &pipeline.pipeline_id).await,
        Err(CrmError::Validation(_))
    ));

    // A sub-account gets its own default exactly once.
    let sub = h.sub_account(&ctx, "Lagos").await;
    let sub_default = h
        .crm
        .create_default_pipeline(&ctx, Some(sub), PipelineType::Lead)
        .await
        .unwrap();
    assert!(sub_default.is_default);
    assert!(matches!(
        h.crm
            .create_default_pipeline(&ctx, Some(sub), PipelineType::Lead)
            .await,
        Err(CrmError::Conflict(_))
    ));

    let defaults = h
        .crm
        .list_pipelines(&ctx)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.is_default && p.pipeline_type == PipelineType::Lead)
        .count();
    assert_eq!(defaults, 2);
}

#[tokio::test]
async fn custom_pipeline_can_be_deleted() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;

    let custom = h
        .crm
        .create_pipeline(
            &ctx,
            CreatePipelineRequest {
                name: "Scholarships".to_string(),
                pipeline_type: PipelineType::Application,
                stages: ["screening", "interview", "awarded"]
                    .into_iter()
                    .map(|id| StageInput {
                        id: id.to_string(),
                        name: id.to_string(),
                        color: None,
                        description: None,
                    })
                    .collect(),
                sub_account_id: None,
            },
        )
        .await
        .unwrap();
    assert!(!custom.is_default);

    h.crm.delete_pipeline(&ctx, &custom.pipeline_id).await.unwrap();
    assert!(matches!(
        h.crm.get_pipeline(&ctx, &custom.pipeline_id).await,
        Err(CrmError::NotFound(_))
    ));
}

// =============================================================================
// Bulk
// =============================================================================

#[tokio::test]
async fn bulk_move_isolates_the_missing_item() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;

    let mut ids = Vec::new();
    for i in 0..4 {
        let lead = h
            .crm
            .create_lead(
                &ctx,
                LeadCandidate::new("Student", format!("Number{i}"), format!("s{i}@school.org")),
            )
            .await
            .unwrap();
        ids.push(ItemId::from(lead.lead_id));
    }
    let missing = ItemId::generate();
    ids.insert(2, missing);

    let results = h
        .crm
        .bulk_move(&ctx, &pipeline.pipeline_id, &ids, "contacted")
        .await;

    assert_eq!(results.len(), ids.len());
    let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, missing);
    assert_eq!(failed[0].error.as_ref().unwrap().code, ErrorKind::NotFound);

    let board = h
        .crm
        .get_pipeline_items(&ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    let contacted = board
        .stages
        .iter()
        .find(|bucket| bucket.stage.id == "contacted")
        .unwrap();
    assert_eq!(contacted.items.len(), 4);
}

#[tokio::test]
async fn bulk_move_reports_invalid_stage_per_item() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;
    let lead = h
        .crm
        .create_lead(&ctx, LeadCandidate::new("Ada", "Lovelace", "ada@example.org"))
        .await
        .unwrap();

    let results = h
        .crm
        .bulk_move(&ctx, &pipeline.pipeline_id, &[ItemId::from(lead.lead_id)], "nowhere")
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].error.as_ref().unwrap().code,
        ErrorKind::Validation
    );
}

#[tokio::test]
async fn bulk_assign_checks_assignee_and_records_each_item() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;
    let agent = h.user(&ctx, Role::Agent, None).await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let lead = h
            .crm
            .create_lead(
                &ctx,
                LeadCandidate::new("Student", format!("Number{i}"), format!("s{i}@school.org")),
            )
            .await
            .unwrap();
        ids.push(ItemId::from(lead.lead_id));
    }

    let results = h
        .crm
        .bulk_assign(&ctx, &pipeline.pipeline_id, &ids, &agent.user_id)
        .await;
    assert!(results.iter().all(|r| r.success));

    let board = h
        .crm
        .get_pipeline_items(&ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    assert!(board
        .stages
        .iter()
        .flat_map(|bucket| &bucket.items)
        .all(|item| item.assigned_to == Some(agent.user_id)));

    let assigned = h
        .crm
        .list_activities(&ctx)
        .await
        .unwrap()
        .iter()
        .filter(|a| a.kind == ActivityKind::PipelineItemAssigned)
        .count();
    assert_eq!(assigned, 3);

    let stranger = admitflow_core::UserId::generate();
    let rejected = h
        .crm
        .bulk_assign(&ctx, &pipeline.pipeline_id, &ids, &stranger)
        .await;
    assert_eq!(rejected.len(), 3);
    assert!(rejected.iter().all(|r| !r.success));
}

#[tokio::test]
async fn bulk_requests_are_capped() {
    let h = Harness::with_config(admitflow_engine::EngineConfig {
        max_bulk_items: 2,
        ..Default::default()
    });
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let lead = h
            .crm
            .create_lead(
                &ctx,
                LeadCandidate::new("Student", format!("Number{i}"), format!("s{i}@school.org")),
            )
            .await
            .unwrap();
        ids.push(ItemId::from(lead.lead_id));
    }

    let results = h
        .crm
        .bulk_move(&ctx, &pipeline.pipeline_id, &ids, "qualified")
        .await;
    assert_eq!(results.len(), 3);
    assert!(results[0].success && results[1].success);
    assert_eq!(
        results[2].error.as_ref().unwrap().code,
        ErrorKind::Validation
    );
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn analytics_follow_the_board() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let ctx = h.context_for(&acme.admin).await;
    let pipeline = h.default_lead_pipeline(&ctx).await;

    let empty = h
        .crm
        .get_analytics(&ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    assert_eq!(empty.total_items, 0);
    assert!(empty.conversion_rate.abs() < f64::EPSILON);

    let mut ids = Vec::new();
    for i in 0..4 {
        let lead = h
            .crm
            .create_lead(
                &ctx,
                LeadCandidate::new("Student", format!("Number{i}"), format!("s{i}@school.org")),
            )
            .await
            .unwrap();
        ids.push(ItemId::from(lead.lead_id));
    }
    h.crm
        .move_item(&ctx, &pipeline.pipeline_id, &ids[0], "new", "converted")
        .await
        .unwrap();

    let analytics = h
        .crm
        .get_analytics(&ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    assert_eq!(analytics.total_items, 4);
    assert_eq!(analytics.stages[0].count, 3);
    assert!((analytics.stages[0].percentage - 75.0).abs() < 1e-9);
    assert!((analytics.conversion_rate - 0.25).abs() < 1e-9);
}
