//! Domain types stored in the database.
//!
//! These types represent the persisted state of tenants, sub-accounts, users,
//! leads, applications, pipelines and the activity audit trail.

use std::collections::BTreeMap;

use admitflow_core::{
    ActivityId, ApplicationId, ItemId, LeadId, PipelineId, ProgramId, Role, SubAccountId,
    TenantId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique identifier for the tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Custom domain, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Branding shown to staff and students.
    #[serde(default)]
    pub branding: Branding,
    /// Tenant-wide settings.
    #[serde(default)]
    pub settings: TenantSettings,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Visual branding for a tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Branding {
    /// Logo URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Primary color as a hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
}

/// Settings that govern what a tenant may create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Whether the tenant may subdivide into sub-accounts.
    pub allow_sub_accounts: bool,
    /// Maximum number of sub-accounts.
    pub max_sub_accounts: u32,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            allow_sub_accounts: true,
            max_sub_accounts: 10,
        }
    }
}

/// A branch office within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAccount {
    /// Unique identifier for the sub-account.
    pub sub_account_id: SubAccountId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form settings.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A staff member or student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub user_id: UserId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Assigned sub-account, if any. Must belong to `tenant_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// Role within the tenant.
    pub role: Role,
    /// Email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Closed set of lead source categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Website forms and landing pages.
    Website,
    /// Referrals from partners, alumni or friends.
    Referral,
    /// Social networks.
    SocialMedia,
    /// Email campaigns.
    Email,
    /// Fairs, seminars and other events.
    Event,
    /// Organic or paid search.
    SearchEngine,
    /// Anything else.
    Other,
}

/// Kind of an entry in a lead's engagement history or an application's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    /// The lead was captured.
    LeadCreated,
    /// Score and source category were computed.
    LeadEnriched,
    /// The application was opened.
    ApplicationCreated,
    /// The item moved between pipeline stages.
    StageChanged,
    /// The item was assigned to an agent.
    Assigned,
    /// The lead was soft-deleted.
    Deactivated,
}

/// One entry of an append-only engagement log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementEvent {
    /// What happened.
    pub kind: EngagementKind,
    /// Human-readable description.
    pub description: String,
    /// The user who caused the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    /// Structured details.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
}

/// A prospective student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier for the lead.
    pub lead_id: LeadId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning sub-account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// Agent responsible for the lead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<UserId>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Free-text source as captured.
    pub source: String,
    /// Categorised source, set during enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_category: Option<SourceCategory>,
    /// Current pipeline stage id.
    pub status: String,
    /// Lead score in `0..=100`.
    pub score: u8,
    /// Program the student is interested in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_interest: Option<String>,
    /// Destination country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_country: Option<String>,
    /// Declared budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// Append-only engagement log.
    #[serde(default)]
    pub engagement_history: Vec<EngagementEvent>,
    /// Tenant-defined fields.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
    /// False once the lead is soft-deleted.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A lead's application to a specific program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    /// Unique identifier for the application.
    pub application_id: ApplicationId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning sub-account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// The applying lead.
    pub lead_id: LeadId,
    /// The program applied to.
    pub program_id: ProgramId,
    /// Agent responsible for the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<UserId>,
    /// Current pipeline stage id.
    pub status: String,
    /// Application milestones.
    #[serde(default)]
    pub timeline: Vec<EngagementEvent>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Whether a pipeline tracks leads or applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PipelineType {
    /// Lead pipeline.
    Lead = 1,
    /// Application pipeline.
    Application = 2,
}

impl PipelineType {
    /// Convert the type to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// The wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Application => "application",
        }
    }
}

/// A named position within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage id, unique within its pipeline.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display and default-progression position.
    pub order: u32,
    /// Display color as a hex string.
    pub color: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An ordered set of stages for leads or applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Unique identifier for the pipeline.
    pub pipeline_id: PipelineId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning sub-account; `None` for a tenant-wide pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// Display name.
    pub name: String,
    /// Lead or application pipeline.
    pub pipeline_type: PipelineType,
    /// Stages in storage order.
    pub stages: Vec<Stage>,
    /// Whether this is the protected default for its scope and type.
    pub is_default: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Stages sorted by `order`.
    #[must_use]
    pub fn ordered_stages(&self) -> Vec<&Stage> {
        let mut stages: Vec<&Stage> = self.stages.iter().collect();
        stages.sort_by_key(|stage| stage.order);
        stages
    }

    /// Look up a stage by id.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == stage_id)
    }

    /// Returns true if `stage_id` is declared on this pipeline.
    #[must_use]
    pub fn has_stage(&self, stage_id: &str) -> bool {
        self.stage(stage_id).is_some()
    }

    /// The initial stage (lowest `order`).
    #[must_use]
    pub fn first_stage(&self) -> Option<&Stage> {
        self.stages.iter().min_by_key(|stage| stage.order)
    }

    /// The final stage (highest `order`).
    #[must_use]
    pub fn last_stage(&self) -> Option<&Stage> {
        self.stages.iter().max_by_key(|stage| stage.order)
    }
}

/// Kind of an audit activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A tenant registered with its first administrator.
    TenantRegistered,
    /// A user was added to a tenant.
    UserCreated,
    /// A sub-account was created.
    SubAccountCreated,
    /// A lead was captured.
    LeadCreated,
    /// A lead was soft-deleted.
    LeadDeactivated,
    /// An application was opened.
    ApplicationCreated,
    /// A pipeline was created.
    PipelineCreated,
    /// A pipeline was deleted.
    PipelineDeleted,
    /// An item changed stage.
    PipelineItemMoved,
    /// An item was assigned to an agent.
    PipelineItemAssigned,
}

impl ActivityKind {
    /// The wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantRegistered => "tenant_registered",
            Self::UserCreated => "user_created",
            Self::SubAccountCreated => "sub_account_created",
            Self::LeadCreated => "lead_created",
            Self::LeadDeactivated => "lead_deactivated",
            Self::ApplicationCreated => "application_created",
            Self::PipelineCreated => "pipeline_created",
            Self::PipelineDeleted => "pipeline_deleted",
            Self::PipelineItemMoved => "pipeline_item_moved",
            Self::PipelineItemAssigned => "pipeline_item_assigned",
        }
    }
}

/// An append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Unique identifier for the activity.
    pub activity_id: ActivityId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Owning sub-account, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// The acting user.
    pub user_id: UserId,
    /// Subject lead, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,
    /// Subject application, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<ApplicationId>,
    /// What happened.
    pub kind: ActivityKind,
    /// Human-readable description.
    pub description: String,
    /// Structured details.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
}

/// Tenant and optional sub-account filter threaded into every scoped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// The tenant all results must belong to.
    pub tenant_id: TenantId,
    /// When set, results must also belong to this sub-account.
    pub sub_account_id: Option<SubAccountId>,
}

impl Scope {
    /// A tenant-wide scope.
    #[must_use]
    pub const fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            sub_account_id: None,
        }
    }

    /// A scope narrowed to one sub-account.
    #[must_use]
    pub const fn sub_account(tenant_id: TenantId, sub_account_id: SubAccountId) -> Self {
        Self {
            tenant_id,
            sub_account_id: Some(sub_account_id),
        }
    }

    /// Returns true if a record owned by `(tenant_id, sub_account_id)` is visible.
    #[must_use]
    pub fn contains(&self, tenant_id: &TenantId, sub_account_id: Option<&SubAccountId>) -> bool {
        if self.tenant_id != *tenant_id {
            return false;
        }
        match &self.sub_account_id {
            None => true,
            Some(scoped) => sub_account_id == Some(scoped),
        }
    }
}

/// A lead or application viewed as an item on a pipeline board.
#[derive(Debug, Clone)]
pub enum PipelineRecord {
    /// A lead on a lead pipeline.
    Lead(Lead),
    /// An application on an application pipeline.
    Application(Application),
}

impl PipelineRecord {
    /// The item id shared with the underlying record.
    #[must_use]
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::Lead(lead) => lead.lead_id.into(),
            Self::Application(app) => app.application_id.into(),
        }
    }

    /// The pipeline type this record belongs on.
    #[must_use]
    pub const fn pipeline_type(&self) -> PipelineType {
        match self {
            Self::Lead(_) => PipelineType::Lead,
            Self::Application(_) => PipelineType::Application,
        }
    }

    /// Owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Lead(lead) => &lead.tenant_id,
            Self::Application(app) => &app.tenant_id,
        }
    }

    /// Owning sub-account.
    #[must_use]
    pub const fn sub_account_id(&self) -> Option<&SubAccountId> {
        match self {
            Self::Lead(lead) => lead.sub_account_id.as_ref(),
            Self::Application(app) => app.sub_account_id.as_ref(),
        }
    }

    /// Current stage id.
    #[must_use]
    pub fn status(&self) -> &str {
        match self {
            Self::Lead(lead) => &lead.status,
            Self::Application(app) => &app.status,
        }
    }

    /// Assigned agent.
    #[must_use]
    pub const fn assigned_to(&self) -> Option<&UserId> {
        match self {
            Self::Lead(lead) => lead.assigned_agent_id.as_ref(),
            Self::Application(app) => app.assigned_agent_id.as_ref(),
        }
    }

    /// Whether the record still appears on boards.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        match self {
            Self::Lead(lead) => lead.is_active,
            Self::Application(_) => true,
        }
    }

    /// The record's history log.
    #[must_use]
    pub fn history(&self) -> &[EngagementEvent] {
        match self {
            Self::Lead(lead) => &lead.engagement_history,
            Self::Application(app) => &app.timeline,
        }
    }

    /// Apply a mutation and append its history entry.
    pub fn apply(&mut self, mutation: &ItemMutation, event: EngagementEvent) {
        let now = event.occurred_at;
        match self {
            Self::Lead(lead) => {
                match mutation {
                    ItemMutation::Move { to_stage } => lead.status.clone_from(to_stage),
                    ItemMutation::Assign { agent_id } => lead.assigned_agent_id = *agent_id,
                    ItemMutation::Enrich {
                        score,
                        source_category,
                    } => {
                        lead.score = *score;
                        lead.source_category = Some(*source_category);
                    }
                    ItemMutation::Deactivate => lead.is_active = false,
                }
                lead.engagement_history.push(event);
                lead.updated_at = now;
            }
            Self::Application(app) => {
                match mutation {
                    ItemMutation::Move { to_stage } => app.status.clone_from(to_stage),
                    ItemMutation::Assign { agent_id } => app.assigned_agent_id = *agent_id,
                    // Lead-only mutations leave applications untouched.
                    ItemMutation::Enrich { .. } | ItemMutation::Deactivate => {}
                }
                app.timeline.push(event);
                app.updated_at = now;
            }
        }
    }
}

/// A single-item change applied under the store's write guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemMutation {
    /// Move the item to another stage.
    Move {
        /// Target stage id.
        to_stage: String,
    },
    /// Change the assigned agent.
    Assign {
        /// New agent, or `None` to unassign.
        agent_id: Option<UserId>,
    },
    /// Record the enrichment result on a lead.
    Enrich {
        /// Final score in `0..=100`.
        score: u8,
        /// Categorised source.
        source_category: SourceCategory,
    },
    /// Soft-delete a lead.
    Deactivate,
}

/// An item change committed atomically with its history entry and audit record.
#[derive(Debug, Clone)]
pub struct ItemChange {
    /// Which kind of record the item is.
    pub pipeline_type: PipelineType,
    /// The item to change.
    pub item_id: ItemId,
    /// The stage the caller observed; the commit fails if it no longer matches.
    pub expected_status: String,
    /// The change to apply.
    pub mutation: ItemMutation,
    /// History entry appended to the item.
    pub event: EngagementEvent,
    /// Audit record written in the same batch, if the change is audited.
    pub activity: Option<Activity>,
}
