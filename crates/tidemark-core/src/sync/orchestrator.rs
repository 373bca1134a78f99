//! Full sync pass over every collection, plus event replication.

use crate::blob::{BlobStore, BlobTransferService};
use crate::db::{
    collection_cursor_key, CursorRepository, Database, EventRepository, LocalCollection,
    NoteRepository, ReminderRepository, LAST_FULL_SYNC_KEY,
};
use crate::error::Result;
use crate::models::{
    HasAttachments, HistoryEvent, Note, Owner, OwnerId, RecordId, Reminder, SyncedRecord,
};
use crate::remote::RemoteSync;
use crate::util::unix_timestamp_ms;

use super::gate::SyncPermit;
use super::reconciler::{reconcile, ReconcileStats, RemoteCollection};

/// Result of one full sync pass.
///
/// A pass never aborts on the first failure: each stage runs regardless
/// of the others, and its failure is recorded here with a stage label.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Reconciliation counts for reminders, when that stage ran clean.
    pub reminders: Option<ReconcileStats>,
    /// Reconciliation counts for notes, when that stage ran clean.
    pub notes: Option<ReconcileStats>,
    /// History events pushed to the remote store.
    pub events_pushed: usize,
    /// Records whose attachment lists changed during the transfer pass.
    pub attachments_updated: usize,
    /// Stage-labeled failures, empty for a fully clean pass.
    pub errors: Vec<String>,
}

impl SyncOutcome {
    /// Whether every stage finished without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_failure(&mut self, stage: &str, error: &crate::Error) {
        tracing::warn!("Sync stage {stage} failed: {error}");
        self.errors.push(format!("{stage}: {error}"));
    }
}

/// Orchestrates a full sync pass across profile, collections, events, and
/// attachments.
pub struct SyncEngine<'a, A: RemoteSync, S: BlobStore> {
    db: &'a Database,
    remote: &'a A,
    transfer: &'a BlobTransferService<S>,
}

impl<'a, A: RemoteSync, S: BlobStore> SyncEngine<'a, A, S> {
    pub const fn new(
        db: &'a Database,
        remote: &'a A,
        transfer: &'a BlobTransferService<S>,
    ) -> Self {
        Self {
            db,
            remote,
            transfer,
        }
    }

    /// Run one full sync pass.
    ///
    /// Requires the caller to hold the single-flight permit. The
    /// `last_full_sync` cursor advances only when every stage ran clean.
    pub async fn sync_all(&self, owner: &OwnerId, _permit: &SyncPermit<'_>) -> SyncOutcome {
        let started = unix_timestamp_ms();
        let mut outcome = SyncOutcome::default();

        let conn = self.db.connection();
        let cursors = CursorRepository::new(conn);
        let reminders = ReminderRepository::new(conn);
        let notes = NoteRepository::new(conn);

        if let Err(error) = self.remote.ensure_profile(owner).await {
            outcome.record_failure("profile", &error);
        }

        match reconcile(
            "reminders",
            &reminders,
            &RemoteReminders(self.remote),
            &cursors,
            owner,
        )
        .await
        {
            Ok(stats) => outcome.reminders = Some(stats),
            Err(error) => outcome.record_failure("reminders", &error),
        }

        match reconcile("notes", &notes, &RemoteNotes(self.remote), &cursors, owner).await {
            Ok(stats) => outcome.notes = Some(stats),
            Err(error) => outcome.record_failure("notes", &error),
        }

        match self.push_events(owner).await {
            Ok(pushed) => outcome.events_pushed = pushed,
            Err(error) => outcome.record_failure("events", &error),
        }

        match self.attachment_pass(&reminders, owner).await {
            Ok(updated) => outcome.attachments_updated += updated,
            Err(error) => outcome.record_failure("reminder attachments", &error),
        }
        match self.attachment_pass(&notes, owner).await {
            Ok(updated) => outcome.attachments_updated += updated,
            Err(error) => outcome.record_failure("note attachments", &error),
        }

        if outcome.is_clean() {
            if let Err(error) = cursors.advance(LAST_FULL_SYNC_KEY, started).await {
                outcome.record_failure("cursor", &error);
            }
        }

        outcome
    }

    /// Pull history events recorded by other devices.
    ///
    /// Replication is pull-only and idempotent: events the local log
    /// already holds are skipped. Returns the number of new events.
    pub async fn replicate_events(&self, owner: &OwnerId) -> Result<usize> {
        let started = unix_timestamp_ms();
        let conn = self.db.connection();
        let cursors = CursorRepository::new(conn);
        let events = EventRepository::new(conn);

        let cursor_key = collection_cursor_key("events_replica");
        let since = cursors.get(&cursor_key).await?.unwrap_or(0);

        let incoming = self.remote.events_since(owner, since).await?;
        let mut inserted = 0;
        for event in &incoming {
            if events.insert_if_absent(event).await? {
                inserted += 1;
            }
        }

        cursors.advance(&cursor_key, started).await?;
        tracing::debug!("Replicated {inserted} new history events");
        Ok(inserted)
    }

    /// Push unsynced history events, claiming unowned ones for the owner.
    async fn push_events(&self, owner: &OwnerId) -> Result<usize> {
        let events = EventRepository::new(self.db.connection());
        let pending = events.unsynced(owner).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let outgoing: Vec<HistoryEvent> = pending
            .iter()
            .cloned()
            .map(|mut event| {
                if event.owner.is_unowned() {
                    event.owner = Owner::owned_by(owner.clone());
                }
                event
            })
            .collect();
        self.remote.push_events(&outgoing).await?;

        let ids: Vec<RecordId> = pending.iter().map(|event| event.id).collect();
        events.mark_synced(&ids, owner).await?;
        Ok(ids.len())
    }

    /// Transfer attachment content for every record that carries any.
    ///
    /// An upload changes what the record points at remotely, so it bumps
    /// `last_modified` and propagates on the next reconcile. A download
    /// only hydrates the local cache and persists without a bump.
    async fn attachment_pass<R, L>(&self, local: &L, owner: &OwnerId) -> Result<usize>
    where
        R: SyncedRecord + HasAttachments,
        L: LocalCollection<R>,
    {
        let records = local.with_attachments(owner).await?;
        let mut updated = 0;

        for mut record in records {
            let (after_upload, uploaded) = self
                .transfer
                .upload_attachments(owner, record.attachments())
                .await?;
            let (after_download, downloaded) =
                self.transfer.download_attachments(&after_upload).await?;

            if uploaded || downloaded {
                record.set_attachments(after_download);
                if uploaded {
                    record.touch(unix_timestamp_ms());
                }
                local.upsert(&record).await?;
                updated += 1;
            }
        }

        Ok(updated)
    }
}

struct RemoteReminders<'a, A: RemoteSync>(&'a A);

impl<A: RemoteSync> RemoteCollection<Reminder> for RemoteReminders<'_, A> {
    async fn fetch_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Reminder>> {
        self.0.reminders_since(owner, since).await
    }

    async fn upsert(&self, records: &[Reminder]) -> Result<()> {
        self.0.upsert_reminders(records).await
    }
}

struct RemoteNotes<'a, A: RemoteSync>(&'a A);

impl<A: RemoteSync> RemoteCollection<Note> for RemoteNotes<'_, A> {
    async fn fetch_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Note>> {
        self.0.notes_since(owner, since).await
    }

    async fn upsert(&self, records: &[Note]) -> Result<()> {
        self.0.upsert_notes(records).await
    }
}
