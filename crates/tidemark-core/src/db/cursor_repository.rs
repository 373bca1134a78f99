//! Sync cursor repository: the per-stream high-water-mark store

use crate::error::Result;
use libsql::Connection;

/// Cursor key advanced only when a full `sync_all` pass finishes clean.
pub const LAST_FULL_SYNC_KEY: &str = "last_full_sync";

/// Cursor key for a reconciled collection, e.g. `reminders_sync`.
#[must_use]
pub fn collection_cursor_key(collection: &str) -> String {
    format!("{collection}_sync")
}

/// Key-value store for per-collection sync high-water marks.
pub struct CursorRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CursorRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read a cursor; `None` when the stream has never synced.
    pub async fn get(&self, key: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_cursors WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    /// Advance a cursor, never letting the stored value decrease.
    pub async fn advance(&self, key: &str, value: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_cursors (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)",
                libsql::params![key, value],
            )
            .await?;
        Ok(())
    }

    /// List all cursors, sorted by key.
    pub async fn all(&self) -> Result<Vec<(String, i64)>> {
        let mut rows = self
            .conn
            .query("SELECT key, value FROM sync_cursors ORDER BY key", ())
            .await?;

        let mut cursors = Vec::new();
        while let Some(row) = rows.next().await? {
            cursors.push((row.get::<String>(0)?, row.get::<i64>(1)?));
        }
        Ok(cursors)
    }
}
