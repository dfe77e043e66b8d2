//! Core identifier types for admitflow.
//!
//! Every entity is addressed by a UUID wrapped in its own newtype so that a
//! lead id can never be passed where a pipeline id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create the identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Create the identifier from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(bytes))
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id!(
    /// Top-level agency (tenant) identifier.
    TenantId
);

uuid_id!(
    /// Branch office (sub-account) identifier.
    SubAccountId
);

uuid_id!(
    /// Staff or student user identifier.
    UserId
);

uuid_id!(
    /// Prospective student (lead) identifier.
    LeadId
);

uuid_id!(
    /// Program application identifier.
    ApplicationId
);

uuid_id!(
    /// Study program identifier referenced by applications.
    ProgramId
);

uuid_id!(
    /// Pipeline identifier.
    PipelineId
);

uuid_id!(
    /// Audit activity identifier.
    ActivityId
);

uuid_id!(
    /// Identifier of an item on a pipeline board.
    ///
    /// Shares the UUID of the lead or application it projects; the owning
    /// pipeline's type decides which one.
    ItemId
);

impl From<LeadId> for ItemId {
    fn from(id: LeadId) -> Self {
        Self(id.0)
    }
}

impl From<ApplicationId> for ItemId {
    fn from(id: ApplicationId) -> Self {
        Self(id.0)
    }
}

impl From<ItemId> for LeadId {
    fn from(id: ItemId) -> Self {
        Self(id.0)
    }
}

impl From<ItemId> for ApplicationId {
    fn from(id: ItemId) -> Self {
        Self(id.0)
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}
