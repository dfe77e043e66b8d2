//! Request and response types for CRM operations.
//!
//! These types define the API contracts for lead intake, pipelines and
//! sub-account management, plus the engine configuration.

use std::collections::BTreeMap;

use admitflow_core::{ItemId, LeadId, PipelineId, ProgramId, Role, SubAccountId, UserId};
use admitflow_store::{Pipeline, PipelineRecord, PipelineType, Stage, Tenant, User};
use serde::{Deserialize, Serialize};

use crate::error::{CrmError, ErrorKind};

/// What to do when a principal references a sub-account that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSubAccountPolicy {
    /// Drop the sub-account and continue with tenant-wide scope.
    #[default]
    PromoteToTenant,
    /// Refuse the request with `NotFound`.
    Deny,
}

impl std::str::FromStr for MissingSubAccountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promote_to_tenant" => Ok(Self::PromoteToTenant),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown missing sub-account policy: {other}")),
        }
    }
}

/// Inputs to the rule-based lead score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Free-mail domains that earn no professional-email bonus.
    pub generic_email_domains: Vec<String>,
    /// Source keywords that earn the high-quality-source bonus.
    pub quality_source_keywords: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            generic_email_domains: [
                "gmail.com",
                "googlemail.com",
                "yahoo.com",
                "hotmail.com",
                "outlook.com",
                "live.com",
                "msn.com",
                "aol.com",
                "icloud.com",
                "me.com",
                "mail.com",
                "protonmail.com",
                "gmx.com",
                "yandex.com",
                "qq.com",
                "163.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            quality_source_keywords: ["referral", "partner", "alumni", "event", "fair", "webinar"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Configuration for the CRM engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy for principals whose sub-account row is gone.
    pub missing_sub_account: MissingSubAccountPolicy,
    /// Budget for the optional AI scorer during enrichment (milliseconds).
    pub scorer_timeout_ms: u64,
    /// Maximum ids processed by one bulk request.
    pub max_bulk_items: usize,
    /// Lead scoring rules.
    pub scoring: ScoringRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_sub_account: MissingSubAccountPolicy::default(),
            scorer_timeout_ms: 2000,
            max_bulk_items: 500,
            scoring: ScoringRules::default(),
        }
    }
}

/// Request to register a new tenant together with its first administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTenantRequest {
    /// Agency name.
    pub name: String,
    /// Custom domain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Administrator email.
    pub admin_email: String,
    /// Administrator display name.
    pub admin_display_name: String,
}

/// A freshly registered tenant and its first administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRegistration {
    /// The new tenant.
    pub tenant: Tenant,
    /// Its `tenant_admin` user.
    pub admin: User,
}

/// Request to add a user to the caller's tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Role; may not rank above the caller's.
    pub role: Role,
    /// Sub-account to place the user in.
    #[serde(default)]
    pub sub_account_id: Option<SubAccountId>,
}

/// Request to create a sub-account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubAccountRequest {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form settings.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl CreateSubAccountRequest {
    /// Create a request with just a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            settings: BTreeMap::new(),
        }
    }
}

/// A lead as submitted for intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadCandidate {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-text source; `manual` when omitted.
    #[serde(default)]
    pub source: Option<String>,
    /// Program of interest.
    #[serde(default)]
    pub program_interest: Option<String>,
    /// Destination country.
    #[serde(default)]
    pub target_country: Option<String>,
    /// Declared budget.
    #[serde(default)]
    pub budget: Option<f64>,
    /// Agent to assign.
    #[serde(default)]
    pub assigned_agent_id: Option<UserId>,
    /// Target sub-account; tenant administrators only.
    #[serde(default)]
    pub sub_account_id: Option<SubAccountId>,
    /// Tenant-defined fields.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

impl LeadCandidate {
    /// Create a candidate with the identity fields set.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Request to open an application for a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    /// The applying lead.
    pub lead_id: LeadId,
    /// The program applied to.
    pub program_id: ProgramId,
    /// Agent to assign; defaults to the lead's agent.
    #[serde(default)]
    pub assigned_agent_id: Option<UserId>,
}

/// A stage as supplied when creating a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInput {
    /// Stage id, unique within the pipeline.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display color; a neutral grey when omitted.
    #[serde(default)]
    pub color: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to create a custom pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipelineRequest {
    /// Display name.
    pub name: String,
    /// Lead or application pipeline.
    pub pipeline_type: PipelineType,
    /// Stages in progression order.
    pub stages: Vec<StageInput>,
    /// Owning sub-account; tenant administrators only.
    #[serde(default)]
    pub sub_account_id: Option<SubAccountId>,
}

/// Runtime projection of a lead or application onto a pipeline board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineItem {
    /// Shared id of the underlying record.
    pub id: ItemId,
    /// Lead or application.
    #[serde(rename = "type")]
    pub item_type: PipelineType,
    /// Current stage id.
    pub status: String,
    /// Lead score; absent for applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    /// Assigned agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    /// Display details of the underlying record.
    pub metadata: serde_json::Value,
}

impl From<&PipelineRecord> for PipelineItem {
    fn from(record: &PipelineRecord) -> Self {
        let (score, metadata) = match record {
            PipelineRecord::Lead(lead) => (
                Some(lead.score),
                serde_json::json!({
                    "name": lead.full_name(),
                    "email": lead.email,
                    "source": lead.source,
                    "source_category": lead.source_category,
                    "program_interest": lead.program_interest,
                }),
            ),
            PipelineRecord::Application(app) => (
                None,
                serde_json::json!({
                    "lead_id": app.lead_id,
                    "program_id": app.program_id,
                }),
            ),
        };

        Self {
            id: record.item_id(),
            item_type: record.pipeline_type(),
            status: record.status().to_string(),
            score,
            assigned_to: record.assigned_to().copied(),
            metadata,
        }
    }
}

/// One stage column of a pipeline board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBucket {
    /// The stage.
    pub stage: Stage,
    /// Items currently in the stage.
    pub items: Vec<PipelineItem>,
}

/// A pipeline board: every stage in order, including empty ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineItems {
    /// The pipeline.
    pub pipeline: Pipeline,
    /// Stage buckets ordered by `order`.
    pub stages: Vec<StageBucket>,
    /// Items whose status names no stage of this pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unstaged: Vec<PipelineItem>,
}

/// Per-stage analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Stage id.
    pub stage_id: String,
    /// Stage display name.
    pub stage_name: String,
    /// Items in the stage.
    pub count: usize,
    /// `count / total_items * 100`, or 0 for an empty pipeline.
    pub percentage: f64,
}

/// Pipeline analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineAnalytics {
    /// The pipeline.
    pub pipeline_id: PipelineId,
    /// Items across all stages.
    pub total_items: usize,
    /// Metrics per stage, ordered by `order`.
    pub stages: Vec<StageMetrics>,
    /// Last-stage count divided by `total_items`, or 0 for an empty pipeline.
    pub conversion_rate: f64,
}

/// Error detail of one failed bulk item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Machine-readable kind.
    pub code: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// Outcome of one item in a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResult {
    /// The item.
    pub id: ItemId,
    /// Whether the item was processed.
    pub success: bool,
    /// Why it was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

impl BulkItemResult {
    /// A successful item.
    #[must_use]
    pub const fn ok(id: ItemId) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    /// A failed item.
    #[must_use]
    pub fn failed(id: ItemId, err: &CrmError) -> Self {
        Self {
            id,
            success: false,
            error: Some(BulkItemError {
                code: err.kind(),
                message: err.to_string(),
            }),
        }
    }
}
