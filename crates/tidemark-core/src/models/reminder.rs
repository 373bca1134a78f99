//! Reminder model

use serde::{Deserialize, Serialize};

use super::attachment::AttachmentRef;
use super::owner::Owner;
use super::record::{HasAttachments, RecordId, SyncedRecord};

/// A reminder in the system.
///
/// `repeat_rule` is an opaque payload to the sync engine: it moves verbatim
/// and is never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier
    pub id: RecordId,
    /// Short title
    pub title: String,
    /// Optional free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Due timestamp (Unix ms)
    #[serde(default)]
    pub due_at: Option<i64>,
    /// Opaque recurrence payload
    #[serde(default)]
    pub repeat_rule: Option<serde_json::Value>,
    /// Ordered attachment references
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
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

impl Reminder {
    /// Create a new reminder with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>, owner: Owner) -> Self {
        Self {
            id: RecordId::new(),
            title: title.into(),
            notes: None,
            due_at: None,
            repeat_rule: None,
            attachments: Vec::new(),
            last_modified: chrono::Utc::now().timestamp_millis(),
            owner,
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Soft-delete this reminder; deletion participates in LWW like any edit.
    pub fn mark_deleted(&mut self, now_ms: i64) {
        self.is_deleted = true;
        self.deleted_at = Some(now_ms);
        self.last_modified = now_ms;
    }
}

impl SyncedRecord for Reminder {
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

impl HasAttachments for Reminder {
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
    fn test_reminder_new() {
        let reminder = Reminder::new("Pay rent", Owner::Unowned);
        assert_eq!(reminder.title, "Pay rent");
        assert!(!reminder.is_deleted);
        assert!(reminder.owner.is_unowned());
        assert!(reminder.last_modified > 0);
    }

    #[test]
    fn mark_deleted_bumps_last_modified() {
        let mut reminder = Reminder::new("Old task", Owner::Unowned);
        reminder.mark_deleted(reminder.last_modified + 500);

        assert!(reminder.is_deleted);
        assert_eq!(reminder.deleted_at, Some(reminder.last_modified));
    }

    #[test]
    fn repeat_rule_roundtrips_as_opaque_json() {
        let mut reminder = Reminder::new("Water plants", Owner::Unowned);
        reminder.repeat_rule = Some(serde_json::json!({
            "frequency": "weekly",
            "interval": 2,
            "weekdays": ["mon", "thu"],
        }));

        let encoded = serde_json::to_string(&reminder).unwrap();
        let decoded: Reminder = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.repeat_rule, reminder.repeat_rule);
    }
}
