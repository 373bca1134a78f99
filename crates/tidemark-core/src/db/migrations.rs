//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: reconciled collections and sync cursors
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Reminders collection; nested payloads stored as serialized JSON text
        "CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            notes TEXT,
            due_at INTEGER,
            repeat_rule TEXT,
            attachments TEXT NOT NULL DEFAULT '[]',
            last_modified INTEGER NOT NULL,
            owner_id TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_reminders_modified ON reminders(last_modified DESC)",
        "CREATE INDEX IF NOT EXISTS idx_reminders_owner ON reminders(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_reminders_deleted ON reminders(is_deleted)",
        // Notes collection
        "CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            title TEXT,
            body TEXT NOT NULL,
            attachments TEXT NOT NULL DEFAULT '[]',
            links TEXT NOT NULL DEFAULT '[]',
            last_modified INTEGER NOT NULL,
            owner_id TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(last_modified DESC)",
        "CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(is_deleted)",
        // Per-collection sync high-water marks
        "CREATE TABLE IF NOT EXISTS sync_cursors (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: append-only history events
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS history_events (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT 'null',
            created_at INTEGER NOT NULL,
            owner_id TEXT,
            synced INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_history_events_synced ON history_events(synced)",
        "CREATE INDEX IF NOT EXISTS idx_history_events_created ON history_events(created_at DESC)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
