//! Generic last-writer-wins reconciliation for one collection.

use std::collections::HashMap;

use crate::db::{collection_cursor_key, CursorRepository, LocalCollection};
use crate::error::Result;
use crate::models::{Owner, OwnerId, RecordId, SyncedRecord};
use crate::util::unix_timestamp_ms;

/// Remote half of one reconciled collection.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection<R: SyncedRecord> {
    /// Records modified strictly after `since` for the owner.
    async fn fetch_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<R>>;

    /// Push a batch; the server applies the same LWW rule per record.
    async fn upsert(&self, records: &[R]) -> Result<()>;
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records sent to the remote store.
    pub pushed: usize,
    /// Records applied from the remote store.
    pub pulled: usize,
}

/// Reconcile one collection between the local and remote stores.
///
/// Both sides report records modified after the collection cursor; where
/// both changed the same record, the strictly greater `last_modified`
/// wins and equal timestamps are a no-op. The cursor advances to the
/// wall-clock time captured at the start of the pass, and only after the
/// whole pass succeeded — any failure leaves it untouched so the next
/// pass re-covers the same window.
pub async fn reconcile<R, L, C>(
    collection: &str,
    local: &L,
    remote: &C,
    cursors: &CursorRepository<'_>,
    owner: &OwnerId,
) -> Result<ReconcileStats>
where
    R: SyncedRecord,
    L: LocalCollection<R>,
    C: RemoteCollection<R>,
{
    let sync_start = unix_timestamp_ms();
    let cursor_key = collection_cursor_key(collection);
    let since = cursors.get(&cursor_key).await?.unwrap_or(0);

    let local_delta = local.modified_since(owner, since).await?;
    let mut remote_by_id: HashMap<RecordId, R> = remote
        .fetch_since(owner, since)
        .await?
        .into_iter()
        .map(|record| (record.record_id(), record))
        .collect();

    let mut to_push: Vec<R> = Vec::new();
    let mut to_claim: Vec<RecordId> = Vec::new();
    let mut to_pull: Vec<R> = Vec::new();

    let mut queue_push = |record: R| {
        let mut outgoing = record;
        if outgoing.owner().is_unowned() {
            outgoing.set_owner(Owner::owned_by(owner.clone()));
            to_claim.push(outgoing.record_id());
        }
        to_push.push(outgoing);
    };

    for local_record in local_delta {
        match remote_by_id.remove(&local_record.record_id()) {
            Some(remote_record) => {
                if remote_record.last_modified() > local_record.last_modified() {
                    to_pull.push(remote_record);
                } else if local_record.last_modified() > remote_record.last_modified() {
                    queue_push(local_record);
                }
                // Equal timestamps: the replicas already agree.
            }
            None => queue_push(local_record),
        }
    }
    to_pull.extend(remote_by_id.into_values());

    if !to_push.is_empty() {
        remote.upsert(&to_push).await?;
        if !to_claim.is_empty() {
            local.claim_unowned(&to_claim, owner).await?;
        }
    }

    for record in &to_pull {
        local.upsert(record).await?;
    }

    cursors.advance(&cursor_key, sync_start).await?;

    let stats = ReconcileStats {
        pushed: to_push.len(),
        pulled: to_pull.len(),
    };
    tracing::debug!(
        "Reconciled {collection}: pushed {}, pulled {}",
        stats.pushed,
        stats.pulled
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{Database, ReminderRepository};
    use crate::error::Error;
    use crate::models::Reminder;

    #[derive(Default)]
    struct FakeRemoteReminders {
        records: Mutex<Vec<Reminder>>,
        fail_upserts: AtomicBool,
    }

    impl FakeRemoteReminders {
        fn seed(&self, record: Reminder) {
            self.records.lock().unwrap().push(record);
        }

        fn stored(&self) -> Vec<Reminder> {
            self.records.lock().unwrap().clone()
        }
    }

    impl RemoteCollection<Reminder> for &FakeRemoteReminders {
        async fn fetch_since(&self, owner: &OwnerId, since: i64) -> Result<Vec<Reminder>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|record| {
                    record.owner.as_db_value() == Some(owner.as_str())
                        && record.last_modified > since
                })
                .cloned()
                .collect())
        }

        async fn upsert(&self, records: &[Reminder]) -> Result<()> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(Error::RemoteUnavailable("injected outage".to_string()));
            }
            let mut stored = self.records.lock().unwrap();
            for record in records {
                match stored.iter_mut().find(|existing| existing.id == record.id) {
                    Some(existing) => {
                        if record.last_modified > existing.last_modified {
                            *existing = record.clone();
                        }
                    }
                    None => stored.push(record.clone()),
                }
            }
            Ok(())
        }
    }

    fn owner() -> OwnerId {
        OwnerId::new("user-1").unwrap()
    }

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pushes_local_only_and_pulls_remote_only() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let mine = Reminder::new("Local task", Owner::owned_by(owner()));
        local.upsert(&mine).await.unwrap();
        let theirs = Reminder::new("Remote task", Owner::owned_by(owner()));
        remote.seed(theirs.clone());

        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        assert_eq!(stats, ReconcileStats { pushed: 1, pulled: 1 });
        assert_eq!(local.get(theirs.id).await.unwrap(), Some(theirs));
        assert!(remote.stored().iter().any(|record| record.id == mine.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_side_wins_per_record() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        // Same record edited on both replicas; remote edit is newer.
        let mut stale = Reminder::new("Buy milk", Owner::owned_by(owner()));
        stale.last_modified = 1000;
        local.upsert(&stale).await.unwrap();

        let mut fresh = stale.clone();
        fresh.title = "Buy oat milk".to_string();
        fresh.last_modified = 2000;
        remote.seed(fresh.clone());

        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        assert_eq!(stats, ReconcileStats { pushed: 0, pulled: 1 });
        assert_eq!(local.get(stale.id).await.unwrap(), Some(fresh));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_edit_overwrites_stale_remote_copy() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        // Same record edited on both replicas; local edit is newer.
        let mut stale = Reminder::new("Call dentist", Owner::owned_by(owner()));
        stale.last_modified = 1000;
        remote.seed(stale.clone());

        let mut fresh = stale.clone();
        fresh.title = "Call dentist at 9am".to_string();
        fresh.last_modified = 2000;
        local.upsert(&fresh).await.unwrap();

        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        assert_eq!(stats, ReconcileStats { pushed: 1, pulled: 0 });
        let pushed = remote.stored();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0], fresh);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn equal_timestamps_are_a_no_op() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let mut ours = Reminder::new("Same clock", Owner::owned_by(owner()));
        ours.last_modified = 5000;
        local.upsert(&ours).await.unwrap();

        let mut theirs = ours.clone();
        theirs.title = "Same clock, other body".to_string();
        remote.seed(theirs);

        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        assert_eq!(stats, ReconcileStats::default());
        // Neither replica overwrote the other.
        assert_eq!(local.get(ours.id).await.unwrap().unwrap().title, "Same clock");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn soft_deletes_propagate_like_edits() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let mut shared = Reminder::new("Doomed", Owner::owned_by(owner()));
        shared.last_modified = 1000;
        local.upsert(&shared).await.unwrap();

        let mut tombstone = shared.clone();
        tombstone.mark_deleted(2000);
        remote.seed(tombstone);

        reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        let merged = local.get(shared.id).await.unwrap().unwrap();
        assert!(merged.is_deleted);
        assert_eq!(merged.deleted_at, Some(2000));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unowned_records_are_claimed_on_push() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let pre_login = Reminder::new("Made before sign-in", Owner::Unowned);
        local.upsert(&pre_login).await.unwrap();

        reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        // Pushed copy carries the owner; local row was claimed.
        let pushed = remote.stored();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].owner, Owner::owned_by(owner()));
        let claimed = local.get(pre_login.id).await.unwrap().unwrap();
        assert_eq!(claimed.owner, Owner::owned_by(owner()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cursor_advances_on_success_and_second_pass_no_ops() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let record = Reminder::new("Once", Owner::owned_by(owner()));
        local.upsert(&record).await.unwrap();

        let before = unix_timestamp_ms();
        reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();

        let cursor = cursors.get("reminders_sync").await.unwrap().unwrap();
        assert!(cursor >= before);

        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();
        assert_eq!(stats, ReconcileStats::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cursor_is_retained_when_push_fails() {
        let db = setup().await;
        let local = ReminderRepository::new(db.connection());
        let cursors = CursorRepository::new(db.connection());
        let remote = FakeRemoteReminders::default();

        let record = Reminder::new("Retry me", Owner::owned_by(owner()));
        local.upsert(&record).await.unwrap();
        remote.fail_upserts.store(true, Ordering::SeqCst);

        let result = reconcile("reminders", &local, &&remote, &cursors, &owner()).await;
        assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
        assert_eq!(cursors.get("reminders_sync").await.unwrap(), None);

        // Next pass retries the same window and succeeds.
        remote.fail_upserts.store(false, Ordering::SeqCst);
        let stats = reconcile("reminders", &local, &&remote, &cursors, &owner())
            .await
            .unwrap();
        assert_eq!(stats.pushed, 1);
    }
}
