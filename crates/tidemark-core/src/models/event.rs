//! Append-only history event model

use serde::{Deserialize, Serialize};

use super::owner::Owner;
use super::record::RecordId;

/// An append-only history event.
///
/// Immutable once created: there is no `last_modified`-based merge, only a
/// `synced` flag. Sync pushes unsynced events and marks them synced on
/// success; events created on other devices arrive through the separate
/// pull-only replication path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Unique identifier
    pub id: RecordId,
    /// Event kind, e.g. `"reminder.completed"`
    pub kind: String,
    /// Opaque event payload
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Ownership state
    #[serde(default)]
    pub owner: Owner,
    /// Whether this event has reached the remote store
    #[serde(default)]
    pub synced: bool,
}

impl HistoryEvent {
    /// Create a new unsynced event.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: serde_json::Value, owner: Owner) -> Self {
        Self {
            id: RecordId::new(),
            kind: kind.into(),
            payload,
            created_at: chrono::Utc::now().timestamp_millis(),
            owner,
            synced: false,
        }
    }
}
