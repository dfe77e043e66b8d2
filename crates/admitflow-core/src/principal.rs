//! The authenticated actor making a request.

use serde::{Deserialize, Serialize};

use crate::ids::{SubAccountId, TenantId, UserId};
use crate::role::Role;

/// The `(user, tenant, sub-account?, role)` tuple produced by principal
/// resolution.
///
/// A principal carries identity only; whether the referenced tenant and
/// sub-account still exist is decided when the tenant context is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The acting user.
    pub user_id: UserId,
    /// The tenant the user belongs to.
    pub tenant_id: TenantId,
    /// The branch office the user is assigned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_id: Option<SubAccountId>,
    /// The user's role.
    pub role: Role,
}

impl Principal {
    /// Create a tenant-wide principal.
    #[must_use]
    pub const fn new(user_id: UserId, tenant_id: TenantId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            sub_account_id: None,
            role,
        }
    }

    /// Assign the principal to a sub-account.
    #[must_use]
    pub const fn in_sub_account(mut self, sub_account_id: SubAccountId) -> Self {
        self.sub_account_id = Some(sub_account_id);
        self
    }
}
