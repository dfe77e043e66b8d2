//! Key encoding utilities for `RocksDB`.
//!
//! Ids are 16-byte UUIDs. Tenant indexes concatenate the tenant id with the
//! child id so a prefix scan over the tenant id yields exactly its records.

use admitflow_core::{SubAccountId, TenantId};

use crate::types::PipelineType;

/// Length of an encoded id.
pub const ID_LEN: usize = 16;

/// Encode a primary key (just the id bytes).
#[must_use]
pub fn id_key(id: &impl AsRef<[u8]>) -> Vec<u8> {
    id.as_ref().to_vec()
}

/// Encode a tenant index key: `tenant_id || child_id`.
#[must_use]
pub fn tenant_child_key(tenant_id: &TenantId, child_id: &impl AsRef<[u8]>) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(tenant_id.as_bytes());
    key.extend_from_slice(child_id.as_ref());
    key
}

/// Encode a tenant prefix for scanning a tenant index.
#[must_use]
pub fn tenant_prefix(tenant_id: &TenantId) -> Vec<u8> {
    tenant_id.as_bytes().to_vec()
}

/// Extract the child id bytes from a tenant index key.
///
/// Returns `None` if the key is not exactly two ids long.
#[must_use]
pub fn extract_child_id(key: &[u8]) -> Option<[u8; ID_LEN]> {
    if key.len() != ID_LEN * 2 {
        return None;
    }
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[ID_LEN..]);
    Some(bytes)
}

/// Encode the unique default-pipeline key: `tenant_id || sub_account_id || type`.
///
/// A tenant-wide pipeline uses an all-zero sub-account segment.
#[must_use]
pub fn default_pipeline_key(
    tenant_id: &TenantId,
    sub_account_id: Option<&SubAccountId>,
    pipeline_type: PipelineType,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2 + 1);
    key.extend_from_slice(tenant_id.as_bytes());
    match sub_account_id {
        Some(id) => key.extend_from_slice(id.as_bytes()),
        None => key.extend_from_slice(&[0u8; ID_LEN]),
    }
    key.push(pipeline_type.as_u8());
    key
}
