//! Local store layer for Tidemark
//!
//! The engine requires point lookup by identifier, range query by
//! `last_modified` and owner, and single-row upsert; repositories here
//! provide exactly that over libSQL.

mod connection;
mod cursor_repository;
mod event_repository;
mod migrations;
mod note_repository;
mod reminder_repository;

pub use connection::Database;
pub use cursor_repository::{collection_cursor_key, CursorRepository, LAST_FULL_SYNC_KEY};
pub use event_repository::EventRepository;
pub use note_repository::NoteRepository;
pub use reminder_repository::ReminderRepository;

use crate::error::Result;
use crate::models::{OwnerId, RecordId, SyncedRecord};

/// Storage contract one reconciled collection exposes to the engine.
///
/// `modified_since` must return rows with `last_modified > since` for the
/// given owner, plus locally-created rows that are still unowned (created
/// before authentication completed).
#[allow(async_fn_in_trait)]
pub trait LocalCollection<R: SyncedRecord> {
    /// Point lookup by identifier, including soft-deleted rows.
    async fn get(&self, id: RecordId) -> Result<Option<R>>;

    /// Insert-or-update a single row atomically.
    async fn upsert(&self, record: &R) -> Result<()>;

    /// Delta query driving reconciliation.
    async fn modified_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<R>>;

    /// Re-tag unowned rows with the real owner after a successful push.
    async fn claim_unowned(&self, ids: &[RecordId], owner: &OwnerId) -> Result<()>;

    /// Non-deleted rows carrying a non-empty attachment list; drives the
    /// attachment transfer pass.
    async fn with_attachments(&self, owner: &OwnerId) -> Result<Vec<R>>;
}
