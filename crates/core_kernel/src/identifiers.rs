//! Strongly-typed identifiers for domain entities
//!
//! Session, line item and adjustment identifiers are newtype wrappers around
//! UUIDs so they cannot be mixed up. Product identifiers belong to the external
//! catalog and are kept as opaque strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_v7()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Opname domain identifiers
define_id!(OpnameId, "OPN");
define_id!(LineItemId, "OPNL");
define_id!(AdjustmentId, "ADJ");

/// Identifier of a product in the external catalog
///
/// The catalog owns product identity, so this is an opaque string rather
/// than a UUID. Leading and trailing whitespace is trimmed on construction,
/// including when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl ProductId {
    /// Creates a product identifier
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Self(id)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier carries no characters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
