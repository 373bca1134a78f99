//! Note repository implementation

use libsql::Connection;

use crate::error::Result;
use crate::models::{AttachmentRef, Note, Owner, OwnerId, RecordId};

use super::LocalCollection;

const SELECT_COLUMNS: &str =
    "id, title, body, attachments, links, last_modified, owner_id, is_deleted, deleted_at";

/// libSQL implementation of the notes collection.
pub struct NoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_note(row: &libsql::Row) -> Result<Note> {
        let id: String = row.get(0)?;
        let id = id.parse::<RecordId>().map_err(|_| {
            crate::Error::LocalStore(format!("invalid note id in local store: {id}"))
        })?;

        let attachments: String = row.get(3)?;
        let attachments: Vec<AttachmentRef> = serde_json::from_str(&attachments)?;

        let links: String = row.get(4)?;
        let links: Vec<String> = serde_json::from_str(&links)?;

        Ok(Note {
            id,
            title: row.get(1)?,
            body: row.get(2)?,
            attachments,
            links,
            last_modified: row.get(5)?,
            owner: Owner::from_db(row.get(6)?),
            is_deleted: row.get::<i32>(7)? != 0,
            deleted_at: row.get(8)?,
        })
    }

    /// Collect rows, skipping any record whose stored JSON fails to parse.
    async fn collect_rows(mut rows: libsql::Rows) -> Result<Vec<Note>> {
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::parse_note(&row) {
                Ok(note) => notes.push(note),
                Err(error) => {
                    tracing::warn!("Skipping malformed note row: {error}");
                }
            }
        }
        Ok(notes)
    }
}

impl LocalCollection<Note> for NoteRepository<'_> {
    async fn get(&self, id: RecordId) -> Result<Option<Note>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM notes WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_note(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &Note) -> Result<()> {
        let attachments = serde_json::to_string(&record.attachments)?;
        let links = serde_json::to_string(&record.links)?;

        self.conn
            .execute(
                "INSERT INTO notes (
                    id, title, body, attachments, links,
                    last_modified, owner_id, is_deleted, deleted_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    attachments = excluded.attachments,
                    links = excluded.links,
                    last_modified = excluded.last_modified,
                    owner_id = excluded.owner_id,
                    is_deleted = excluded.is_deleted,
                    deleted_at = excluded.deleted_at",
                libsql::params![
                    record.id.as_str(),
                    record.title.clone(),
                    record.body.clone(),
                    attachments,
                    links,
                    record.last_modified,
                    record.owner.as_db_value().map(ToOwned::to_owned),
                    i32::from(record.is_deleted),
                    record.deleted_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn modified_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Note>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM notes
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
                    "UPDATE notes SET owner_id = ?1 WHERE id = ?2 AND owner_id IS NULL",
                    libsql::params![owner.as_str(), id.as_str()],
                )
                .await?;
        }
        Ok(())
    }

    async fn with_attachments(&self, owner: &OwnerId) -> Result<Vec<Note>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM notes
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
