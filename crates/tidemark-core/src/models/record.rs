//! Record identity and the shared shape every reconciled entity exposes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::attachment::AttachmentRef;
use super::owner::Owner;

/// A unique identifier for a synced record, using UUID v7 (time-sortable).
///
/// Assigned at creation and never reassigned; two records with the same
/// identifier represent the same logical entity on both replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The shape the generic reconciler needs from every reconciled entity.
///
/// The record with the strictly greater `last_modified` is authoritative;
/// equal timestamps are an explicit no-op on both replicas.
pub trait SyncedRecord: Clone {
    fn record_id(&self) -> RecordId;

    /// Authoritative tie-breaker, monotonic Unix milliseconds.
    fn last_modified(&self) -> i64;

    fn owner(&self) -> &Owner;

    /// Reassign ownership; used when pushing records created before sign-in.
    fn set_owner(&mut self, owner: Owner);
}

/// Entities that embed an ordered attachment list in their payload.
pub trait HasAttachments {
    fn attachments(&self) -> &[AttachmentRef];

    fn set_attachments(&mut self, attachments: Vec<AttachmentRef>);

    /// Bump `last_modified` so a payload change propagates on the next pass.
    fn touch(&mut self, now_ms: i64);
}
