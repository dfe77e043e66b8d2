//! Staff roles and their rank ordering.
//!
//! Roles form a total order `student < agent < sub_account_admin < tenant_admin`.
//! The order is defined by [`Role::rank`] rather than declaration order so that
//! reordering variants can never silently change authorization.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role a principal holds within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Agency-wide administrator.
    TenantAdmin,
    /// Administrator of a single branch office.
    SubAccountAdmin,
    /// Counsellor working leads inside a branch.
    Agent,
    /// Student with access to their own records only.
    Student,
}

impl Role {
    /// All roles, lowest rank first.
    pub const ALL: [Self; 4] = [
        Self::Student,
        Self::Agent,
        Self::SubAccountAdmin,
        Self::TenantAdmin,
    ];

    /// Numeric rank of the role; higher ranks satisfy lower requirements.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Student => 0,
            Self::Agent => 1,
            Self::SubAccountAdmin => 2,
            Self::TenantAdmin => 3,
        }
    }

    /// Returns true if this role meets or exceeds `required`.
    #[must_use]
    pub const fn satisfies(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }

    /// Returns true if the role is confined to a single sub-account.
    ///
    /// Only tenant administrators operate tenant-wide.
    #[must_use]
    pub const fn is_sub_account_confined(self) -> bool {
        !matches!(self, Self::TenantAdmin)
    }

    /// The wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TenantAdmin => "tenant_admin",
            Self::SubAccountAdmin => "sub_account_admin",
            Self::Agent => "agent",
            Self::Student => "student",
        }
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tenant_admin" => Ok(Self::TenantAdmin),
            "sub_account_admin" => Ok(Self::SubAccountAdmin),
            "agent" => Ok(Self::Agent),
            "student" => Ok(Self::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);
