//! History event repository implementation
//!
//! History events are append-only: rows are inserted once, flagged as
//! synced after a successful push, and never updated or deleted.

use libsql::Connection;

use crate::error::Result;
use crate::models::{HistoryEvent, Owner, OwnerId, RecordId};

const SELECT_COLUMNS: &str = "id, kind, payload, created_at, owner_id, synced";

/// libSQL implementation of the append-only history event log.
pub struct EventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> EventRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_event(row: &libsql::Row) -> Result<HistoryEvent> {
        let id: String = row.get(0)?;
        let id = id.parse::<RecordId>().map_err(|_| {
            crate::Error::LocalStore(format!("invalid event id in local store: {id}"))
        })?;

        let payload: String = row.get(2)?;
        let payload = serde_json::from_str(&payload)?;

        Ok(HistoryEvent {
            id,
            kind: row.get(1)?,
            payload,
            created_at: row.get(3)?,
            owner: Owner::from_db(row.get(4)?),
            synced: row.get::<i32>(5)? != 0,
        })
    }

    /// Record a new event. Fails if the identifier already exists.
    pub async fn append(&self, event: &HistoryEvent) -> Result<()> {
        let payload = serde_json::to_string(&event.payload)?;

        self.conn
            .execute(
                "INSERT INTO history_events (id, kind, payload, created_at, owner_id, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    event.id.as_str(),
                    event.kind.clone(),
                    payload,
                    event.created_at,
                    event.owner.as_db_value().map(ToOwned::to_owned),
                    i32::from(event.synced),
                ],
            )
            .await?;
        Ok(())
    }

    /// Insert an event pulled from a replica feed, ignoring duplicates.
    ///
    /// Returns `true` when the row was actually inserted.
    pub async fn insert_if_absent(&self, event: &HistoryEvent) -> Result<bool> {
        let payload = serde_json::to_string(&event.payload)?;

        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO history_events
                    (id, kind, payload, created_at, owner_id, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                libsql::params![
                    event.id.as_str(),
                    event.kind.clone(),
                    payload,
                    event.created_at,
                    event.owner.as_db_value().map(ToOwned::to_owned),
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// Events not yet pushed, oldest first. Unowned events are included so
    /// that history recorded before authentication still replicates.
    pub async fn unsynced(&self, owner: &OwnerId) -> Result<Vec<HistoryEvent>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM history_events
                     WHERE synced = 0 AND (owner_id = ?1 OR owner_id IS NULL)
                     ORDER BY created_at ASC"
                ),
                [owner.as_str()],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::parse_event(&row) {
                Ok(event) => events.push(event),
                Err(error) => {
                    tracing::warn!("Skipping malformed history event row: {error}");
                }
            }
        }
        Ok(events)
    }

    /// Flag pushed events as synced, tagging unowned rows with the owner
    /// they were pushed under.
    pub async fn mark_synced(&self, ids: &[RecordId], owner: &OwnerId) -> Result<()> {
        for id in ids {
            self.conn
                .execute(
                    "UPDATE history_events
                     SET synced = 1, owner_id = COALESCE(owner_id, ?1)
                     WHERE id = ?2",
                    libsql::params![owner.as_str(), id.as_str()],
                )
                .await?;
        }
        Ok(())
    }

    /// Count of events waiting to be pushed.
    pub async fn pending_count(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM history_events WHERE synced = 0",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }
}
