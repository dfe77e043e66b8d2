//! End-to-end walk through a tenant with two branches.

mod common;

use admitflow_core::{ItemId, Role};
use admitflow_engine::{Crm, CrmError, LeadCandidate};
use admitflow_store::ActivityKind;

use common::Harness;

#[tokio::test]
async fn branch_agents_admin_and_a_qualified_lead() {
    let h = Harness::new();
    let acme = h.register("Acme").await;
    let admin = h.context_for(&acme.admin).await;

    // Tenant admin creates two branches, each with an agent.
    let s1 = h.sub_account(&admin, "Lagos").await;
    let s2 = h.sub_account(&admin, "Accra").await;
    let agent_u = h.user(&admin, Role::Agent, Some(s1)).await;
    let agent_v = h.user(&admin, Role::Agent, Some(s2)).await;
    let u_ctx = h.context_for(&agent_u).await;
    let v_ctx = h.context_for(&agent_v).await;

    // U captures a lead with a professional email, a phone and a budget.
    let mut candidate = LeadCandidate::new("Chidi", "Okafor", "chidi@okafor-holdings.ng");
    candidate.phone = Some("+234 801 234 5678".to_string());
    candidate.budget = Some(18_000.0);
    let lead = h.crm.create_lead(&u_ctx, candidate).await.unwrap();

    assert_eq!(lead.score, 90);
    assert_eq!(lead.status, "new");
    assert_eq!(lead.sub_account_id, Some(s1));

    let pipeline = h.default_lead_pipeline(&admin).await;
    let item = ItemId::from(lead.lead_id);

    // V works in another branch and may not touch the lead.
    let denied = h
        .crm
        .move_item(&v_ctx, &pipeline.pipeline_id, &item, "new", "qualified")
        .await;
    assert!(matches!(denied, Err(CrmError::Forbidden(_))));

    // The tenant admin may.
    let moved = h
        .crm
        .move_item(&admin, &pipeline.pipeline_id, &item, "new", "qualified")
        .await
        .unwrap();
    assert_eq!(moved.status, "qualified");

    let lead = h.crm.get_lead(&admin, &lead.lead_id).await.unwrap();
    assert_eq!(lead.status, "qualified");

    let moves: Vec<_> = h
        .crm
        .list_activities(&admin)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.kind == ActivityKind::PipelineItemMoved)
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].lead_id, Some(lead.lead_id));
    assert_eq!(moves[0].user_id, acme.admin.user_id);
    assert_eq!(moves[0].sub_account_id, Some(s1));

    // U sees the move on the branch board; V's board stays empty.
    let board = h
        .crm
        .get_pipeline_items(&u_ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    let qualified = board
        .stages
        .iter()
        .find(|bucket| bucket.stage.id == "qualified")
        .unwrap();
    assert_eq!(qualified.items.len(), 1);
    assert_eq!(qualified.items[0].id, item);

    let v_board = h
        .crm
        .get_pipeline_items(&v_ctx, &pipeline.pipeline_id)
        .await
        .unwrap();
    assert!(v_board.stages.iter().all(|bucket| bucket.items.is_empty()));
}
