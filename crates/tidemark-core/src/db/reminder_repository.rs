//! Reminder repository implementation

use libsql::Connection;

use crate::error::Result;
use crate::models::{AttachmentRef, Owner, OwnerId, RecordId, Reminder};

use super::LocalCollection;

const SELECT_COLUMNS: &str = "id, title, notes, due_at, repeat_rule, attachments, \
     last_modified, owner_id, is_deleted, deleted_at";

/// libSQL implementation of the reminders collection.
pub struct ReminderRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ReminderRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a reminder from a database row.
    ///
    /// This is the single text ⇄ structured conversion point for the
    /// reminder's nested JSON payloads.
    fn parse_reminder(row: &libsql::Row) -> Result<Reminder> {
        let id: String = row.get(0)?;
        let id = id.parse::<RecordId>().map_err(|_| {
            crate::Error::LocalStore(format!("invalid reminder id in local store: {id}"))
        })?;

        let repeat_rule: Option<String> = row.get(4)?;
        let repeat_rule = repeat_rule
            .map(|text| serde_json::from_str(&text))
            .transpose()?;

        let attachments: String = row.get(5)?;
        let attachments: Vec<AttachmentRef> = serde_json::from_str(&attachments)?;

        Ok(Reminder {
            id,
            title: row.get(1)?,
            notes: row.get(2)?,
            due_at: row.get(3)?,
            repeat_rule,
            attachments,
            last_modified: row.get(6)?,
            owner: Owner::from_db(row.get(7)?),
            is_deleted: row.get::<i32>(8)? != 0,
            deleted_at: row.get(9)?,
        })
    }

    /// Collect rows, skipping any record whose stored JSON fails to parse.
    /// One malformed record must not abort the whole collection pass.
    async fn collect_rows(mut rows: libsql::Rows) -> Result<Vec<Reminder>> {
        let mut reminders = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::parse_reminder(&row) {
                Ok(reminder) => reminders.push(reminder),
                Err(error) => {
                    tracing::warn!("Skipping malformed reminder row: {error}");
                }
            }
        }
        Ok(reminders)
    }
}

impl LocalCollection<Reminder> for ReminderRepository<'_> {
    async fn get(&self, id: RecordId) -> Result<Option<Reminder>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM reminders WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_reminder(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &Reminder) -> Result<()> {
        let repeat_rule = record
            .repeat_rule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let attachments = serde_json::to_string(&record.attachments)?;

        self.conn
            .execute(
                "INSERT INTO reminders (
                    id, title, notes, due_at, repeat_rule, attachments,
                    last_modified, owner_id, is_deleted, deleted_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    notes = excluded.notes,
                    due_at = excluded.due_at,
                    repeat_rule = excluded.repeat_rule,
                    attachments = excluded.attachments,
                    last_modified = excluded.last_modified,
                    owner_id = excluded.owner_id,
                    is_deleted = excluded.is_deleted,
                    deleted_at = excluded.deleted_at",
                libsql::params![
                    record.id.as_str(),
                    record.title.clone(),
                    record.notes.clone(),
                    record.due_at,
                    repeat_rule,
                    attachments,
                    record.last_modified,
                    record.owner.as_db_value().map(ToOwned::to_owned),
                    i32::from(record.is_deleted),
                    record.deleted_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn modified_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Reminder>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM reminders
                     WHERE (owner_id = ?1 AND last_modified > ?2) OR owner_id IS NULL
                     ORDER BY last_modified ASC"
                ),
                libsql::params![owner.as_str(), since],
            )
            .await?;

        Self::collect_rows(rows).await
    }

    async fn claim_unowned(&self, ids: &[RecordId], owner: &OwnerId) -> Result<()> {
        for id in ids {
            self.conn
                .execute(
                    "UPDATE reminders SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
                    libsql::params![owner.as_str(), id.as_str()],
                )
                .await?;
        }
        Ok(())
    }

    async fn with_attachments(&self, owner: &OwnerId) -> Result<Vec<Reminder>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM reminders
                     WHERE is_deleted = 0
                       AND (owner_id = ?1 OR owner_id IS NULL)
                       AND attachments != '[]'
                     ORDER BY last_modified ASC"
                ),
                libsql::params![owner.as_str()],
            )
            .await?;

        Self::collect_rows(rows).await
    }
}
