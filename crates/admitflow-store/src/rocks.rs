//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use admitflow_core::{ApplicationId, LeadId, PipelineId, SubAccountId, TenantId, UserId};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{
    Activity, Application, ItemChange, Lead, Pipeline, PipelineRecord, PipelineType, Scope,
    SubAccount, Tenant, User,
};
use crate::{Store, WriteOp};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-modify-write sequences (index maintenance, guarded inserts).
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read and decode a record from a primary column family.
    fn get_record<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect every record of a tenant by scanning its `*_by_tenant` index.
    fn scan_tenant<T: serde::de::DeserializeOwned>(
        &self,
        index_cf: &str,
        primary_cf: &str,
        tenant_id: &TenantId,
    ) -> Result<Vec<T>> {
        let cf_index = self.cf(index_cf)?;
        let prefix = keys::tenant_prefix(tenant_id);

        let mut records = Vec::new();
        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            let Some(child_id) = keys::extract_child_id(&key) else {
                tracing::warn!(index = index_cf, "Skipping malformed index key");
                continue;
            };
            if let Some(record) = self.get_record(primary_cf, &child_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Write a record and its tenant index entry into a batch.
    fn stage_indexed<T: serde::Serialize>(
        &self,
        batch: &mut WriteBatch,
        primary_cf: &str,
        index_cf: &str,
        tenant_id: &TenantId,
        id: &impl AsRef<[u8]>,
        record: &T,
    ) -> Result<()> {
        let cf_primary = self.cf(primary_cf)?;
        let cf_index = self.cf(index_cf)?;

        batch.put_cf(&cf_primary, keys::id_key(id), Self::serialize(record)?);
        // Index entries are idempotent; a record never changes tenant.
        batch.put_cf(&cf_index, keys::tenant_child_key(tenant_id, id), b"");
        Ok(())
    }

    /// Translate one write operation into batch entries.
    ///
    /// Callers must hold `write_lock`.
    fn stage_op(&self, batch: &mut WriteBatch, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::PutTenant(tenant) => {
                let cf = self.cf(cf::TENANTS)?;
                batch.put_cf(&cf, keys::id_key(&tenant.tenant_id), Self::serialize(&tenant)?);
            }
            WriteOp::PutSubAccount(sub) => self.stage_indexed(
                batch,
                cf::SUB_ACCOUNTS,
                cf::SUB_ACCOUNTS_BY_TENANT,
                &sub.tenant_id,
                &sub.sub_account_id,
                &sub,
            )?,
            WriteOp::PutUser(user) => {
                let cf = self.cf(cf::USERS)?;
                batch.put_cf(&cf, keys::id_key(&user.user_id), Self::serialize(&user)?);
            }
            WriteOp::PutLead(lead) => self.stage_indexed(
                batch,
                cf::LEADS,
                cf::LEADS_BY_TENANT,
                &lead.tenant_id,
                &lead.lead_id,
                &lead,
            )?,
            WriteOp::PutApplication(app) => self.stage_indexed(
                batch,
                cf::APPLICATIONS,
                cf::APPLICATIONS_BY_TENANT,
                &app.tenant_id,
                &app.application_id,
                &app,
            )?,
            WriteOp::PutPipeline(pipeline) => {
                self.stage_indexed(
                    batch,
                    cf::PIPELINES,
                    cf::PIPELINES_BY_TENANT,
                    &pipeline.tenant_id,
                    &pipeline.pipeline_id,
                    &pipeline,
                )?;
                if pipeline.is_default {
                    let cf_defaults = self.cf(cf::PIPELINE_DEFAULTS)?;
                    let key = keys::default_pipeline_key(
                        &pipeline.tenant_id,
                        pipeline.sub_account_id.as_ref(),
                        pipeline.pipeline_type,
                    );
                    batch.put_cf(&cf_defaults, key, pipeline.pipeline_id.as_bytes());
                }
            }
            WriteOp::DeletePipeline(pipeline_id) => {
                let pipeline = self.get_pipeline(&pipeline_id)?.ok_or(StoreError::NotFound)?;
                let cf_pipelines = self.cf(cf::PIPELINES)?;
                let cf_by_tenant = self.cf(cf::PIPELINES_BY_TENANT)?;

                batch.delete_cf(&cf_pipelines, keys::id_key(&pipeline_id));
                batch.delete_cf(
                    &cf_by_tenant,
                    keys::tenant_child_key(&pipeline.tenant_id, &pipeline_id),
                );
                if pipeline.is_default {
                    let cf_defaults = self.cf(cf::PIPELINE_DEFAULTS)?;
                    batch.delete_cf(
                        &cf_defaults,
                        keys::default_pipeline_key(
                            &pipeline.tenant_id,
                            pipeline.sub_account_id.as_ref(),
                            pipeline.pipeline_type,
                        ),
                    );
                }
            }
            WriteOp::AppendActivity(activity) => self.stage_indexed(
                batch,
                cf::ACTIVITIES,
                cf::ACTIVITIES_BY_TENANT,
                &activity.tenant_id,
                &activity.activity_id,
                &activity,
            )?,
        }
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Writes
    // =========================================================================

    fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        for op in ops {
            self.stage_op(&mut batch, op)?;
        }
        self.write(batch)
    }

    fn insert_default_pipeline(&self, pipeline: &Pipeline, activity: &Activity) -> Result<()> {
        let _guard = self.write_lock.lock();

        let cf_defaults = self.cf(cf::PIPELINE_DEFAULTS)?;
        let key = keys::default_pipeline_key(
            &pipeline.tenant_id,
            pipeline.sub_account_id.as_ref(),
            pipeline.pipeline_type,
        );
        let existing = self
            .db
            .get_cf(&cf_defaults, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "default {} pipeline",
                pipeline.pipeline_type.as_str()
            )));
        }

        let mut default = pipeline.clone();
        default.is_default = true;

        let mut batch = WriteBatch::default();
        self.stage_op(&mut batch, WriteOp::PutPipeline(default))?;
        self.stage_op(&mut batch, WriteOp::AppendActivity(activity.clone()))?;
        self.write(batch)
    }

    fn insert_lead_unless_duplicate(
        &self,
        lead: &Lead,
        activity: &Activity,
        is_duplicate: &dyn Fn(&Lead) -> bool,
    ) -> Result<Vec<Lead>> {
        let _guard = self.write_lock.lock();

        let collisions: Vec<Lead> = self
            .list_leads(&Scope::tenant(lead.tenant_id))?
            .into_iter()
            .filter(|existing| existing.is_active && is_duplicate(existing))
            .collect();
        if !collisions.is_empty() {
            return Ok(collisions);
        }

        let mut batch = WriteBatch::default();
        self.stage_op(&mut batch, WriteOp::PutLead(lead.clone()))?;
        self.stage_op(&mut batch, WriteOp::AppendActivity(activity.clone()))?;
        self.write(batch)?;
        Ok(Vec::new())
    }

    fn insert_sub_account(
        &self,
        sub_account: &SubAccount,
        activity: &Activity,
        limit: usize,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();

        if self.list_sub_accounts(&sub_account.tenant_id)?.len() >= limit {
            return Err(StoreError::LimitReached {
                what: "sub-account",
                limit,
            });
        }

        let mut batch = WriteBatch::default();
        self.stage_op(&mut batch, WriteOp::PutSubAccount(sub_account.clone()))?;
        self.stage_op(&mut batch, WriteOp::AppendActivity(activity.clone()))?;
        self.write(batch)
    }

    fn commit_item_change(&self, change: ItemChange) -> Result<PipelineRecord> {
        let _guard = self.write_lock.lock();

        let mut record = self
            .get_item(change.pipeline_type, &change.item_id)?
            .ok_or(StoreError::NotFound)?;

        if record.status() != change.expected_status {
            return Err(StoreError::StatusConflict {
                expected: change.expected_status,
                actual: record.status().to_string(),
            });
        }

        record.apply(&change.mutation, change.event);

        let put = match &record {
            PipelineRecord::Lead(lead) => WriteOp::PutLead(lead.clone()),
            PipelineRecord::Application(app) => WriteOp::PutApplication(app.clone()),
        };

        let mut batch = WriteBatch::default();
        self.stage_op(&mut batch, put)?;
        if let Some(activity) = change.activity {
            self.stage_op(&mut batch, WriteOp::AppendActivity(activity))?;
        }
        self.write(batch)?;

        Ok(record)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn get_tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>> {
        self.get_record(cf::TENANTS, &keys::id_key(tenant_id))
    }

    fn get_sub_account(&self, sub_account_id: &SubAccountId) -> Result<Option<SubAccount>> {
        self.get_record(cf::SUB_ACCOUNTS, &keys::id_key(sub_account_id))
    }

    fn list_sub_accounts(&self, tenant_id: &TenantId) -> Result<Vec<SubAccount>> {
        self.scan_tenant(cf::SUB_ACCOUNTS_BY_TENANT, cf::SUB_ACCOUNTS, tenant_id)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get_record(cf::USERS, &keys::id_key(user_id))
    }

    fn get_lead(&self, lead_id: &LeadId) -> Result<Option<Lead>> {
        self.get_record(cf::LEADS, &keys::id_key(lead_id))
    }

    fn list_leads(&self, scope: &Scope) -> Result<Vec<Lead>> {
        let leads: Vec<Lead> =
            self.scan_tenant(cf::LEADS_BY_TENANT, cf::LEADS, &scope.tenant_id)?;
        Ok(leads
            .into_iter()
            .filter(|lead| scope.contains(&lead.tenant_id, lead.sub_account_id.as_ref()))
            .collect())
    }

    fn get_application(&self, application_id: &ApplicationId) -> Result<Option<Application>> {
        self.get_record(cf::APPLICATIONS, &keys::id_key(application_id))
    }

    fn list_applications(&self, scope: &Scope) -> Result<Vec<Application>> {
        let apps: Vec<Application> =
            self.scan_tenant(cf::APPLICATIONS_BY_TENANT, cf::APPLICATIONS, &scope.tenant_id)?;
        Ok(apps
            .into_iter()
            .filter(|app| scope.contains(&app.tenant_id, app.sub_account_id.as_ref()))
            .collect())
    }

    fn get_pipeline(&self, pipeline_id: &PipelineId) -> Result<Option<Pipeline>> {
        self.get_record(cf::PIPELINES, &keys::id_key(pipeline_id))
    }

    fn list_pipelines(&self, tenant_id: &TenantId) -> Result<Vec<Pipeline>> {
        self.scan_tenant(cf::PIPELINES_BY_TENANT, cf::PIPELINES, tenant_id)
    }

    fn find_default_pipeline(
        &self,
        tenant_id: &TenantId,
        sub_account_id: Option<&SubAccountId>,
        pipeline_type: PipelineType,
    ) -> Result<Option<Pipeline>> {
        let cf_defaults = self.cf(cf::PIPELINE_DEFAULTS)?;
        let key = keys::default_pipeline_key(tenant_id, sub_account_id, pipeline_type);

        let Some(raw) = self
            .db
            .get_cf(&cf_defaults, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; keys::ID_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("malformed default pipeline entry".into()))?;
        self.get_pipeline(&PipelineId::from_bytes(bytes))
    }

    fn list_activities(&self, scope: &Scope) -> Result<Vec<Activity>> {
        let activities: Vec<Activity> =
            self.scan_tenant(cf::ACTIVITIES_BY_TENANT, cf::ACTIVITIES, &scope.tenant_id)?;
        let mut visible: Vec<Activity> = activities
            .into_iter()
            .filter(|a| scope.contains(&a.tenant_id, a.sub_account_id.as_ref()))
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visible)
    }
}
