//! Owner identity and the explicit unowned/owned state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

/// Validated account identifier that namespaces records and blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create an owner identifier, rejecting empty values.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(Error::InvalidInput(
                "Owner identifier cannot be empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ownership state of a synced record.
///
/// Records created before authentication completes are `Unowned` and are
/// claimed by the signing-in account on their first successful push. This is
/// a typed transition, not a comparison against a sentinel string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Created locally before an account was available.
    #[default]
    Unowned,
    /// Claimed by an account.
    OwnedBy(OwnerId),
}

impl Owner {
    #[must_use]
    pub fn owned_by(owner: OwnerId) -> Self {
        Self::OwnedBy(owner)
    }

    #[must_use]
    pub const fn is_unowned(&self) -> bool {
        matches!(self, Self::Unowned)
    }

    /// Nullable column value used by the local store.
    #[must_use]
    pub fn as_db_value(&self) -> Option<&str> {
        match self {
            Self::Unowned => None,
            Self::OwnedBy(id) => Some(id.as_str()),
        }
    }

    /// Rebuild from a nullable column value; blank strings map to unowned.
    #[must_use]
    pub fn from_db(value: Option<String>) -> Self {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Self::OwnedBy(OwnerId(v)),
            _ => Self::Unowned,
        }
    }
}

impl Serialize for Owner {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Unowned => serializer.serialize_none(),
            Self::OwnedBy(id) => serializer.serialize_some(id.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_db(value))
    }
}
