#![allow(dead_code)]

use std::sync::Arc;

use admitflow_core::{Principal, Role, SubAccountId};
use admitflow_engine::{
    Crm, CrmService, CreateSubAccountRequest, CreateUserRequest, EngineConfig,
    RegisterTenantRequest, TenantContext, TenantRegistration,
};
use admitflow_store::{PipelineType, RocksStore, User};
use tempfile::TempDir;

pub struct Harness {
    pub crm: CrmService<RocksStore>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        Self {
            crm: CrmService::new(store, config),
            _dir: dir,
        }
    }

    pub async fn register(&self, name: &str) -> TenantRegistration {
        self.crm
            .register_tenant(RegisterTenantRequest {
                name: name.to_string(),
                domain: None,
                admin_email: format!("owner@{}.edu", name.to_lowercase()),
                admin_display_name: "Owner".to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn context_for(&self, user: &User) -> TenantContext {
        let mut principal = Principal::new(user.user_id, user.tenant_id, user.role);
        if let Some(sub) = user.sub_account_id {
            principal = principal.in_sub_account(sub);
        }
        self.crm.resolve_context(Some(&principal)).await.unwrap()
    }

    pub async fn sub_account(&self, admin: &TenantContext, name: &str) -> SubAccountId {
        self.crm
            .create_sub_account(admin, CreateSubAccountRequest::new(name))
            .await
            .unwrap()
            .sub_account_id
    }

    pub async fn user(
        &self,
        admin: &TenantContext,
        role: Role,
        sub_account_id: Option<SubAccountId>,
    ) -> User {
        let n = admitflow_core::UserId::generate();
        self.crm
            .create_user(
                admin,
                CreateUserRequest {
                    email: format!("{n}@staff.example.org"),
                    display_name: format!("User {n}"),
                    role,
                    sub_account_id,
                },
            )
            .await
            .unwrap()
    }

    pub async fn default_lead_pipeline(&self, ctx: &TenantContext) -> admitflow_store::Pipeline {
        self.crm
            .list_pipelines(ctx)
            .await
            .unwrap()
            .into_iter()
            .find(|p| {
                p.is_default
                    && p.pipeline_type == PipelineType::Lead
                    && p.sub_account_id.is_none()
            })
            .unwrap()
    }
}
