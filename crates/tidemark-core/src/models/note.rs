//! Note model

use serde::{Deserialize, Serialize};

use super::attachment::AttachmentRef;
use super::owner::Owner;
use super::record::{HasAttachments, RecordId, SyncedRecord};

/// A note in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: RecordId,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Plain text body
    pub body: String,
    /// Ordered attachment references
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Links to other records or external URLs; opaque to the engine
    #[serde(default)]
    pub links: Vec<String>,
    /// Last update timestamp (Unix ms), authoritative tie-breaker
    pub last_modified: i64,
    /// Ownership state
    #[serde(default)]
    pub owner: Owner,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    /// Deletion timestamp (Unix ms)
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

impl Note {
    /// Create a new note with the given body.
    #[must_use]
    pub fn new(body: impl Into<String>, owner: Owner) -> Self {
        Self {
            id: RecordId::new(),
            title: None,
            body: body.into(),
            attachments: Vec::new(),
            links: Vec::new(),
            last_modified: chrono::Utc::now().timestamp_millis(),
            owner,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Soft-delete this note; deletion participates in LWW like any edit.
    pub fn mark_deleted(&mut self, now_ms: i64) {
        self.is_deleted = true;
        self.deleted_at = Some(now_ms);
        self.last_modified = now_ms;
    }
}

impl SyncedRecord for Note {
    fn record_id(&self) -> RecordId {
        self.id
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }
}

impl HasAttachments for Note {
    fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    fn set_attachments(&mut self, attachments: Vec<AttachmentRef>) {
        self.attachments = attachments;
    }

    fn touch(&mut self, now_ms: i64) {
        self.last_modified = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_new() {
        let note = Note::new("Grocery list", Owner::Unowned);
        assert_eq!(note.body, "Grocery list");
        assert!(!note.is_deleted);
        assert!(note.attachments.is_empty());
    }

    #[test]
    fn note_wire_shape_uses_nullable_owner() {
        let note = Note::new("hello", Owner::Unowned);
        let encoded = serde_json::to_value(&note).unwrap();
        assert!(encoded.get("owner").unwrap().is_null());

        let decoded: Note = serde_json::from_value(encoded).unwrap();
        assert!(decoded.owner.is_unowned());
    }
}
