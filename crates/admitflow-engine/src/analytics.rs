//! Pipeline analytics.

use admitflow_core::PipelineId;
use admitflow_store::Store;

use crate::context::TenantContext;
use crate::error::Result;
use crate::pipeline;
use crate::types::{PipelineAnalytics, PipelineItems, StageMetrics};

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = count as f64 / total as f64;
    ratio
}

/// Aggregate a board into per-stage counts and the overall conversion rate.
///
/// Items whose status names no stage are not counted. Items in the final
/// stage count as converted.
#[must_use]
pub fn compute(board: &PipelineItems) -> PipelineAnalytics {
    let total_items: usize = board.stages.iter().map(|bucket| bucket.items.len()).sum();

    let stages = board
        .stages
        .iter()
        .map(|bucket| StageMetrics {
            stage_id: bucket.stage.id.clone(),
            stage_name: bucket.stage.name.clone(),
            count: bucket.items.len(),
            percentage: ratio(bucket.items.len(), total_items) * 100.0,
        })
        .collect();

    let converted = board.pipeline.last_stage().map_or(0, |last| {
        board
            .stages
            .iter()
            .find(|bucket| bucket.stage.id == last.id)
            .map_or(0, |bucket| bucket.items.len())
    });

    PipelineAnalytics {
        pipeline_id: board.pipeline.pipeline_id,
        total_items,
        stages,
        conversion_rate: ratio(converted, total_items),
    }
}

/// Analytics for a pipeline visible to the context.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden` for the pipeline.
pub fn get_analytics<S: Store>(
    store: &S,
    ctx: &TenantContext,
    pipeline_id: &PipelineId,
) -> Result<PipelineAnalytics> {
    let board = pipeline::get_items(store, ctx, pipeline_id)?;
    let analytics = compute(&board);

    tracing::debug!(
        pipeline_id = %pipeline_id,
        total_items = analytics.total_items,
        conversion_rate = analytics.conversion_rate,
        "Computed pipeline analytics"
    );

    Ok(analytics)
}
