//! Durable outbox service.
//!
//! All access to the capture database goes through one
//! `Arc<tokio::sync::Mutex<Database>>`, which serializes id assignment and
//! state transitions. SQLite work (including the fsync on every enqueue) runs
//! on the blocking pool so it never stalls the async runtime. The lock is only
//! held for the duration of a local statement, never across a network call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, OutboxRepository, SqliteOutboxRepository};
use crate::error::{Error, Result};
use crate::models::{EventRecord, MarkOutcome, OutboxEntry, OutboxEntryId, RetentionPolicy};
use crate::state::SyncState;
use crate::util::unix_timestamp_ms_now;

/// Thread-safe handle to the durable outbox. Clones share one connection.
#[derive(Clone)]
pub struct Outbox {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl Outbox {
    /// Open the outbox at the given filesystem path, creating parent directories.
    ///
    /// Failures are reported as [`Error::StorageUnavailable`].
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let open_path = db_path.clone();
        let db = run_blocking(move || {
            if let Some(parent) = open_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Database::open(&open_path)
        })
        .await
        .map_err(|error| {
            tracing::error!("Failed to open capture outbox at {}: {error}", db_path.display());
            storage_error(error)
        })?;

        tracing::info!("Opened capture outbox at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory outbox (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = run_blocking(Database::open_in_memory).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run `op` against the repository on the blocking pool while holding the lock.
    async fn with_repo<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SqliteOutboxRepository<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db).lock_owned().await;
        run_blocking(move || op(&SqliteOutboxRepository::new(db.connection()))).await
    }

    /// Persist `record` as a new Pending entry.
    ///
    /// The insert is committed before this returns. Any storage failure is
    /// reported as [`Error::StorageUnavailable`] so the caller can retry.
    pub async fn enqueue(&self, record: EventRecord) -> Result<OutboxEntry> {
        let kind = record.kind();
        let entry = self
            .with_repo(move |repo| repo.insert(&record, unix_timestamp_ms_now()))
            .await
            .map_err(|error| {
                tracing::error!("Failed to enqueue {kind} event: {error}");
                storage_error(error)
            })?;

        tracing::info!(
            "Enqueued {} at {} as outbox entry {}",
            entry.payload.kind(),
            crate::clock::format_elapsed(entry.payload.clock_ms()),
            entry.id
        );
        Ok(entry)
    }

    pub async fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>> {
        self.with_repo(move |repo| repo.get(id)).await
    }

    /// Every entry, Pending and Delivered, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<OutboxEntry>> {
        self.with_repo(|repo| repo.list_all()).await
    }

    pub async fn oldest_pending(&self) -> Result<Option<OutboxEntry>> {
        self.with_repo(|repo| repo.oldest_pending()).await
    }

    pub async fn list_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.with_repo(move |repo| repo.list_pending(limit)).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.with_repo(|repo| repo.pending_count()).await
    }

    /// Transition an entry to Delivered.
    ///
    /// Idempotent: a second call reports [`MarkOutcome::AlreadyDelivered`]
    /// and an unknown id reports [`MarkOutcome::NotFound`].
    pub async fn mark_delivered(&self, id: OutboxEntryId) -> Result<MarkOutcome> {
        let outcome = self
            .with_repo(move |repo| repo.mark_delivered(id, unix_timestamp_ms_now()))
            .await?;

        match outcome {
            MarkOutcome::Delivered => tracing::debug!("Outbox entry {id} delivered"),
            MarkOutcome::AlreadyDelivered => {
                tracing::debug!("Outbox entry {id} was already delivered");
            }
            MarkOutcome::NotFound => tracing::debug!("Outbox entry {id} no longer exists"),
        }
        Ok(outcome)
    }

    /// Record a failed submission attempt against a Pending entry.
    pub async fn record_failure(&self, id: OutboxEntryId, error: &str) -> Result<()> {
        let error = error.to_string();
        let updated = self
            .with_repo(move |repo| repo.record_failure(id, &error))
            .await?;
        if !updated {
            tracing::debug!("Skipped failure bookkeeping for outbox entry {id}: not pending");
        }
        Ok(())
    }

    /// Delete Delivered entries the policy does not keep. Pending entries are untouched.
    pub async fn prune_delivered(&self, policy: RetentionPolicy) -> Result<usize> {
        if policy.keeps_everything() {
            return Ok(0);
        }
        let removed = self
            .with_repo(move |repo| repo.prune_delivered(policy, unix_timestamp_ms_now()))
            .await?;

        if removed > 0 {
            tracing::info!("Pruned {removed} delivered outbox entries");
        }
        Ok(removed)
    }

    /// Badge for the operator given the current connectivity and activity.
    pub async fn sync_state(&self, online: bool, in_flight: bool) -> Result<SyncState> {
        let pending = self.pending_count().await?;
        Ok(SyncState::from_outbox(pending, online, in_flight))
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|error| Error::storage_unavailable(format!("storage task failed: {error}")))?
}

fn storage_error(error: Error) -> Error {
    match error {
        Error::StorageUnavailable(_) => error,
        other => Error::storage_unavailable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EventIntent, EventRecordBuilder};
    use crate::clock::{ManualClock, MatchClock};
    use crate::models::{DeliveryState, EventKind, Fixture, PlayerId, TeamId};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const T0: i64 = 1_750_000_000_000;

    fn build_at(fixture: &Fixture, kind: EventKind, elapsed_ms: i64) -> EventRecord {
        let wall = ManualClock::new(T0);
        let mut clock = MatchClock::with_wall_clock(wall.clone());
        clock.start();
        wall.advance_ms(elapsed_ms);
        EventRecordBuilder::new(fixture)
            .build(EventIntent::new(kind, TeamId::new("1")), &clock)
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_creates_pending_entry_with_same_payload() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let fixture = Fixture::default();
        let record = build_at(&fixture, EventKind::Goal, 65_000);

        let entry = outbox.enqueue(record.clone()).await.unwrap();
        assert_eq!(entry.delivery_state, DeliveryState::Pending);
        assert_eq!(entry.payload, record);

        let listed = outbox.list_all().await.unwrap();
        assert_eq!(listed, vec![entry]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_all_keeps_insertion_order_not_clock_order() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let fixture = Fixture::default();
        for elapsed in [5_000, 3_000, 9_000] {
            outbox
                .enqueue(build_at(&fixture, EventKind::Foul, elapsed))
                .await
                .unwrap();
        }

        let clocks: Vec<u64> = outbox
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|e| e.payload.clock_ms())
            .collect();
        assert_eq!(clocks, vec![5_000, 3_000, 9_000]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_entries_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("grassroots.db");
        let fixture = Fixture::default();

        let first_id = {
            let outbox = Outbox::open_path(&path).await.unwrap();
            let first = outbox
                .enqueue(build_at(&fixture, EventKind::Save, 1_000))
                .await
                .unwrap();
            outbox
                .enqueue(build_at(&fixture, EventKind::Corner, 2_000))
                .await
                .unwrap();
            outbox.mark_delivered(first.id).await.unwrap();
            first.id
        };

        let reopened = Outbox::open_path(&path).await.unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        let entries = reopened.list_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first_id);
        assert!(entries[0].is_delivered());
        assert!(entries[1].is_pending());
        assert_eq!(reopened.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_delivered_is_idempotent() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let entry = outbox
            .enqueue(build_at(&Fixture::default(), EventKind::Penalty, 0))
            .await
            .unwrap();

        assert_eq!(
            outbox.mark_delivered(entry.id).await.unwrap(),
            MarkOutcome::Delivered
        );
        let after_first = outbox.list_all().await.unwrap();
        assert_eq!(
            outbox.mark_delivered(entry.id).await.unwrap(),
            MarkOutcome::AlreadyDelivered
        );
        assert_eq!(outbox.list_all().await.unwrap(), after_first);
        assert_eq!(
            outbox
                .mark_delivered(OutboxEntryId::new(9_999))
                .await
                .unwrap(),
            MarkOutcome::NotFound
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_enqueues_get_distinct_increasing_ids() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let fixture = Fixture::default();

        let mut handles = Vec::new();
        for elapsed in 0..20 {
            let outbox = outbox.clone();
            let record = build_at(&fixture, EventKind::BallLost, elapsed * 1_000);
            handles.push(tokio::spawn(async move {
                outbox.enqueue(record).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);

        let listed: Vec<_> = outbox.list_all().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failure_is_retryable() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        outbox
            .db
            .lock()
            .await
            .connection()
            .execute_batch("DROP TABLE outbox")
            .unwrap();

        let err = outbox
            .enqueue(build_at(&Fixture::default(), EventKind::Goal, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unopenable_outbox_is_retryable() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = Outbox::open_path(blocker.join("grassroots.db"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn storage_work_runs_off_the_runtime_thread() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let runtime_thread = std::thread::current().id();

        let storage_thread = outbox
            .with_repo(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(storage_thread, runtime_thread);

        outbox
            .enqueue(build_at(&Fixture::default(), EventKind::Save, 0))
            .await
            .unwrap();
        assert_eq!(outbox.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_state_reflects_pending_entries() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        assert_eq!(outbox.sync_state(false, false).await.unwrap(), SyncState::Synced);

        let entry = outbox
            .enqueue(build_at(&Fixture::default(), EventKind::KeyPass, 0))
            .await
            .unwrap();
        assert_eq!(outbox.sync_state(false, false).await.unwrap(), SyncState::Offline);
        assert_eq!(outbox.sync_state(true, false).await.unwrap(), SyncState::Unsynced);

        outbox.mark_delivered(entry.id).await.unwrap();
        assert_eq!(outbox.sync_state(true, false).await.unwrap(), SyncState::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prune_never_touches_pending() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let fixture = Fixture::default();
        let delivered = outbox
            .enqueue(build_at(&fixture, EventKind::Goal, 1))
            .await
            .unwrap();
        outbox
            .enqueue(build_at(&fixture, EventKind::Goal, 2))
            .await
            .unwrap();
        outbox.mark_delivered(delivered.id).await.unwrap();

        let removed = outbox
            .prune_delivered(RetentionPolicy::KeepLatest { count: 0 })
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = outbox.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_pending());
        assert_eq!(remaining[0].payload.player_id(), &PlayerId::anonymous());
    }
}
