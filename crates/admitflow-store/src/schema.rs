//! Database schema definitions and column families.
//!
//! Every tenant-owned record has a primary column family keyed by its own id
//! and a `*_by_tenant` index keyed by `tenant_id || record_id`, so that scoped
//! queries are prefix scans that can never cross a tenant boundary.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Tenant records, keyed by `tenant_id`.
    pub const TENANTS: &str = "tenants";

    /// Sub-account records, keyed by `sub_account_id`.
    pub const SUB_ACCOUNTS: &str = "sub_accounts";

    /// Index: sub-accounts by tenant, keyed by `tenant_id || sub_account_id`.
    pub const SUB_ACCOUNTS_BY_TENANT: &str = "sub_accounts_by_tenant";

    /// User records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Lead records, keyed by `lead_id`.
    pub const LEADS: &str = "leads";

    /// Index: leads by tenant, keyed by `tenant_id || lead_id`.
    pub const LEADS_BY_TENANT: &str = "leads_by_tenant";

    /// Application records, keyed by `application_id`.
    pub const APPLICATIONS: &str = "applications";

    /// Index: applications by tenant, keyed by `tenant_id || application_id`.
    pub const APPLICATIONS_BY_TENANT: &str = "applications_by_tenant";

    /// Pipeline records, keyed by `pipeline_id`.
    pub const PIPELINES: &str = "pipelines";

    /// Index: pipelines by tenant, keyed by `tenant_id || pipeline_id`.
    pub const PIPELINES_BY_TENANT: &str = "pipelines_by_tenant";

    /// Unique index: default pipeline per `tenant_id || sub_account_id || type`.
    pub const PIPELINE_DEFAULTS: &str = "pipeline_defaults";

    /// Activity records, keyed by `activity_id`.
    pub const ACTIVITIES: &str = "activities";

    /// Index: activities by tenant, keyed by `tenant_id || activity_id`.
    pub const ACTIVITIES_BY_TENANT: &str = "activities_by_tenant";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::TENANTS,
        cf::SUB_ACCOUNTS,
        cf::SUB_ACCOUNTS_BY_TENANT,
        cf::USERS,
        cf::LEADS,
        cf::LEADS_BY_TENANT,
        cf::APPLICATIONS,
        cf::APPLICATIONS_BY_TENANT,
        cf::PIPELINES,
        cf::PIPELINES_BY_TENANT,
        cf::PIPELINE_DEFAULTS,
        cf::ACTIVITIES,
        cf::ACTIVITIES_BY_TENANT,
    ]
}
