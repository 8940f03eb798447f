//! Background delivery loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::EventSink;
use crate::error::Result;
use crate::models::{OutboxEntryId, RetentionPolicy};
use crate::services::Outbox;
use crate::util::compact_text;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of one delivery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub delivered: usize,
    /// Head entry whose submission failed, blocking everything behind it
    pub stalled_on: Option<OutboxEntryId>,
    pub last_error: Option<String>,
    /// Delivered entries removed by the retention policy
    pub pruned: usize,
}

impl PassReport {
    pub const fn is_stalled(&self) -> bool {
        self.stalled_on.is_some()
    }
}

/// Submits Pending entries oldest-first and marks them Delivered.
pub struct DeliveryWorker<S> {
    outbox: Outbox,
    sink: Arc<S>,
    poll_interval: Duration,
    batch_size: usize,
    retention: RetentionPolicy,
}

impl<S: EventSink> DeliveryWorker<S> {
    pub const fn new(outbox: Outbox, sink: Arc<S>) -> Self {
        Self {
            outbox,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            retention: RetentionPolicy::KeepAll,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Pending entries fetched per query. Clamped to at least one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Retention applied after every pass.
    #[must_use]
    pub const fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Deliver Pending entries until the outbox is drained or a submission fails.
    ///
    /// Entries are submitted strictly in id order. A failure stops the pass so
    /// nothing is delivered ahead of the stalled entry. Entries enqueued while
    /// the pass runs are picked up by the same pass.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let mut report = PassReport::default();

        'pass: loop {
            let batch = self.outbox.list_pending(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            for entry in batch {
                match self.sink.submit(&entry.payload).await {
                    Ok(()) => {
                        self.outbox.mark_delivered(entry.id).await?;
                        report.delivered += 1;
                    }
                    Err(error) => {
                        let message = compact_text(&error.to_string());
                        tracing::warn!(
                            "Delivery of outbox entry {} failed after {} earlier attempts: {message}",
                            entry.id,
                            entry.attempts
                        );
                        self.outbox.record_failure(entry.id, &message).await?;
                        report.stalled_on = Some(entry.id);
                        report.last_error = Some(message);
                        break 'pass;
                    }
                }
            }
        }

        report.pruned = self.outbox.prune_delivered(self.retention).await?;
        if report.delivered > 0 {
            tracing::info!("Delivered {} pending events", report.delivered);
        }
        Ok(report)
    }
}

impl<S: EventSink + 'static> DeliveryWorker<S> {
    /// Run passes in the background.
    ///
    /// A pass starts on every offline to online transition and on every poll
    /// tick while online. Failures are logged and retried on the next trigger.
    /// Dropping the returned handle stops the worker.
    pub fn spawn(self, mut connectivity: watch::Receiver<bool>) -> DeliveryHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut online = *connectivity.borrow_and_update();

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Connectivity signal closed; stopping delivery worker");
                            break;
                        }
                        let now_online = *connectivity.borrow_and_update();
                        let came_online = now_online && !online;
                        online = now_online;
                        if !came_online {
                            continue;
                        }
                        tracing::info!("Back online; delivering pending events");
                    }
                    _ = interval.tick() => {
                        if !online {
                            continue;
                        }
                    }
                }

                match self.run_pass().await {
                    Ok(report) => {
                        report_tx.send_replace(Some(report));
                    }
                    Err(error) => tracing::error!("Delivery pass failed: {error}"),
                }
            }
            tracing::debug!("Delivery worker stopped");
        });

        DeliveryHandle {
            shutdown: shutdown_tx,
            reports: report_rx,
            task,
        }
    }
}

/// Handle to a spawned [`DeliveryWorker`].
pub struct DeliveryHandle {
    shutdown: watch::Sender<bool>,
    reports: watch::Receiver<Option<PassReport>>,
    task: JoinHandle<()>,
}

impl DeliveryHandle {
    /// Latest pass outcomes. `None` until the first pass completes.
    pub fn reports(&self) -> watch::Receiver<Option<PassReport>> {
        self.reports.clone()
    }

    /// Stop after the current pass, if any, and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::error!("Delivery worker task failed: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EventIntent, EventRecordBuilder};
    use crate::clock::{ManualClock, MatchClock};
    use crate::delivery::{Connectivity, DeliveryError};
    use crate::models::{EventKind, EventRecord, Fixture, TeamId};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Sink that records acknowledged payloads and fails on demand.
    #[derive(Default)]
    struct FakeSink {
        fail_next: AtomicUsize,
        reject_clock_ms: Mutex<Option<u64>>,
        gate: Option<Semaphore>,
        submissions: AtomicUsize,
        accepted: Mutex<Vec<EventRecord>>,
    }

    impl FakeSink {
        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::default()
            }
        }

        fn accepted_clocks(&self) -> Vec<u64> {
            self.accepted
                .lock()
                .unwrap()
                .iter()
                .map(EventRecord::clock_ms)
                .collect()
        }
    }

    impl EventSink for FakeSink {
        async fn submit(&self, record: &EventRecord) -> std::result::Result<(), DeliveryError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.submissions.fetch_add(1, Ordering::SeqCst);

            let scheduled_failure = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let rejected = *self.reject_clock_ms.lock().unwrap() == Some(record.clock_ms());
            if scheduled_failure || rejected {
                return Err(DeliveryError::Unreachable("network down".to_string()));
            }

            self.accepted.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn record_at(elapsed_ms: i64) -> EventRecord {
        let wall = ManualClock::new(0);
        let mut clock = MatchClock::with_wall_clock(wall.clone());
        clock.start();
        wall.advance_ms(elapsed_ms);
        EventRecordBuilder::new(&Fixture::default())
            .build(EventIntent::new(EventKind::Goal, TeamId::new("1")), &clock)
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_passes_leave_entry_pending_until_success() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let sink = Arc::new(FakeSink::default());
        sink.fail_next.store(3, Ordering::SeqCst);
        let entry = outbox.enqueue(record_at(65_000)).await.unwrap();
        let worker = DeliveryWorker::new(outbox.clone(), sink.clone());

        for attempt in 1..=3u32 {
            let report = worker.run_pass().await.unwrap();
            assert_eq!(report.stalled_on, Some(entry.id));
            assert_eq!(report.delivered, 0);

            let stored = outbox.get(entry.id).await.unwrap().unwrap();
            assert!(stored.is_pending());
            assert_eq!(stored.attempts, attempt);
        }

        let report = worker.run_pass().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert!(!report.is_stalled());
        assert!(outbox.get(entry.id).await.unwrap().unwrap().is_delivered());
        assert_eq!(sink.submissions.load(Ordering::SeqCst), 4);
        assert_eq!(sink.accepted_clocks(), vec![65_000]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stalled_head_blocks_later_entries() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let sink = Arc::new(FakeSink::default());
        *sink.reject_clock_ms.lock().unwrap() = Some(1_000);
        for elapsed in [1_000, 2_000, 3_000] {
            outbox.enqueue(record_at(elapsed)).await.unwrap();
        }
        let worker = DeliveryWorker::new(outbox.clone(), sink.clone()).with_batch_size(2);

        for _ in 0..3 {
            let report = worker.run_pass().await.unwrap();
            assert!(report.is_stalled());
            assert!(sink.accepted_clocks().is_empty());
        }
        assert_eq!(outbox.pending_count().await.unwrap(), 3);

        *sink.reject_clock_ms.lock().unwrap() = None;
        let report = worker.run_pass().await.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(sink.accepted_clocks(), vec![1_000, 2_000, 3_000]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn capture_proceeds_while_submission_in_flight() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let sink = Arc::new(FakeSink::gated());
        outbox.enqueue(record_at(1_000)).await.unwrap();

        let worker = DeliveryWorker::new(outbox.clone(), sink.clone());
        let pass = tokio::spawn(async move { worker.run_pass().await });

        // The pass is parked inside submit; the outbox must stay usable
        tokio::time::timeout(Duration::from_secs(1), async {
            outbox.enqueue(record_at(2_000)).await.unwrap();
            assert_eq!(outbox.list_all().await.unwrap().len(), 2);
        })
        .await
        .unwrap();

        sink.gate.as_ref().unwrap().add_permits(10);
        let report = pass.await.unwrap().unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(sink.accepted_clocks(), vec![1_000, 2_000]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retention_runs_after_pass() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let sink = Arc::new(FakeSink::default());
        for elapsed in [1_000, 2_000, 3_000] {
            outbox.enqueue(record_at(elapsed)).await.unwrap();
        }

        let report = DeliveryWorker::new(outbox.clone(), sink)
            .with_retention(RetentionPolicy::KeepLatest { count: 1 })
            .run_pass()
            .await
            .unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(report.pruned, 2);

        let remaining = outbox.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload.clock_ms(), 3_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawned_worker_delivers_when_connectivity_returns() {
        let outbox = Outbox::open_in_memory().await.unwrap();
        let sink = Arc::new(FakeSink::default());
        let connectivity = Connectivity::new(false);

        let handle = DeliveryWorker::new(outbox.clone(), sink.clone())
            .with_poll_interval(Duration::from_millis(10))
            .spawn(connectivity.subscribe());
        let mut reports = handle.reports();

        outbox.enqueue(record_at(5_000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(outbox.pending_count().await.unwrap(), 1);
        assert_eq!(sink.submissions.load(Ordering::SeqCst), 0);

        connectivity.set_online(true);
        tokio::time::timeout(
            Duration::from_secs(2),
            reports.wait_for(|report| report.as_ref().is_some_and(|r| r.delivered == 1)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(outbox.pending_count().await.unwrap(), 0);

        handle.shutdown().await;
    }
}
