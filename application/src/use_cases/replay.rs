//! Replay scheduling
//!
//! [`ReplayScheduler`] drains the intent queue through the materializer.
//! At most one pass runs at a time; asking for another while one is in
//! flight does nothing. A pass that leaves retryable failures behind is
//! followed by another after a fixed backoff, until a pass reports none.
//! Intents parked by the queue never hold the loop open.

use super::intent_queue::{ReplayReport, VoteIntentQueue};
use super::materializer::IntentMaterializer;
use crate::config::ReplayConfig;
use crate::ports::event_logger::{EventLogger, LogEvent, NoEventLogger};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Clears the running flag when a pass loop ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives replay of pending intents
pub struct ReplayScheduler {
    queue: Arc<VoteIntentQueue>,
    materializer: IntentMaterializer,
    config: ReplayConfig,
    running: AtomicBool,
    logger: Arc<dyn EventLogger>,
}

impl ReplayScheduler {
    pub fn new(
        queue: Arc<VoteIntentQueue>,
        materializer: IntentMaterializer,
        config: ReplayConfig,
    ) -> Self {
        Self {
            queue,
            materializer,
            config,
            running: AtomicBool::new(false),
            logger: Arc::new(NoEventLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn queue(&self) -> &Arc<VoteIntentQueue> {
        &self.queue
    }

    /// Whether a scheduled loop is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one pass of up to `batch_limit` intents.
    pub async fn replay_pending_intents(&self) -> ReplayReport {
        let report = self
            .queue
            .replay(self.config.batch_limit, |record| async move {
                self.materializer.project_intent_record(&record).await.map(|_| ())
            })
            .await;

        let remaining = self.queue.len();
        info!(
            replayed = report.replayed,
            failed = report.failed,
            rejected = report.rejected,
            remaining,
            "Replay pass finished"
        );
        self.logger.log(LogEvent::new(
            "replay_pass",
            json!({
                "replayed": report.replayed,
                "failed": report.failed,
                "rejected": report.rejected,
                "remaining": remaining,
            }),
        ));
        report
    }

    /// Start the background pass loop unless one is already running.
    ///
    /// Returns `None` when a loop was already in flight.
    pub fn schedule(self: &Arc<Self>) -> Option<JoinHandle<ReplayReport>> {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("Replay already running; not scheduling another");
            return None;
        }

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _running = RunningGuard(&scheduler.running);
            scheduler.pass_loop(None).await
        }))
    }

    /// Run passes in the foreground until the queue drains cleanly or
    /// `max_passes` passes have run. Returns the summed report.
    pub async fn run_until_drained(&self, max_passes: usize) -> ReplayReport {
        self.pass_loop(Some(max_passes)).await
    }

    async fn pass_loop(&self, max_passes: Option<usize>) -> ReplayReport {
        let mut total = ReplayReport::default();
        let mut passes = 0usize;

        loop {
            let report = self.replay_pending_intents().await;
            passes += 1;
            total += report;

            if max_passes.is_some_and(|max| passes >= max) {
                break;
            }
            if report.failed > 0 {
                debug!(backoff_ms = self.config.backoff.as_millis() as u64, "Replay had failures; backing off");
                tokio::time::sleep(self.config.backoff).await;
                continue;
            }
            // A clean pass that hit the batch limit leaves more to do
            if report.replayed == 0 || self.queue.is_empty() {
                break;
            }
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregateConfig, QueueConfig, SyncConfig};
    use crate::ports::intent_store::MemoryIntentStore;
    use crate::ports::mesh::MeshError;
    use crate::sync::guarded::GuardedMesh;
    use crate::test_support::{AckMode, TestMesh};
    use crate::use_cases::aggregate_client::AggregateClient;
    use quorum_domain::{Agreement, VoteIntentRecord};
    use std::time::Duration;

    fn intent(id: &str, voter: &str, seq: u64) -> VoteIntentRecord {
        VoteIntentRecord {
            intent_id: id.to_string(),
            voter_id: voter.to_string(),
            topic_id: "t1".to_string(),
            synthesis_id: "s1".to_string(),
            epoch: 1,
            point_id: "p1".to_string(),
            agreement: Agreement::Agree,
            weight: 1.0,
            proof_ref: None,
            seq,
            emitted_at: seq,
        }
    }

    fn scheduler(mesh: &Arc<TestMesh>, config: ReplayConfig) -> Arc<ReplayScheduler> {
        scheduler_with_store(mesh, Arc::new(MemoryIntentStore::new()), config)
    }

    fn scheduler_with_store(
        mesh: &Arc<TestMesh>,
        store: Arc<MemoryIntentStore>,
        config: ReplayConfig,
    ) -> Arc<ReplayScheduler> {
        let queue = VoteIntentQueue::open(store, QueueConfig::default()).unwrap();
        let client = AggregateClient::new(
            GuardedMesh::new(mesh.clone(), SyncConfig::default()),
            AggregateConfig::default(),
        );
        Arc::new(ReplayScheduler::new(
            Arc::new(queue),
            IntentMaterializer::new(client),
            config,
        ))
    }

    #[tokio::test]
    async fn test_run_until_drained_batches() {
        let mesh = TestMesh::connected();
        let scheduler = scheduler(&mesh, ReplayConfig::default().with_batch_limit(2));
        for i in 0..5u64 {
            scheduler
                .queue()
                .enqueue(intent(&format!("i{i}"), &format!("v{i}"), i + 1))
                .unwrap();
        }

        let report = scheduler.run_until_drained(10).await;
        assert_eq!(report, ReplayReport { replayed: 5, failed: 0, rejected: 0 });
        assert!(scheduler.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_single_flight_and_retries_with_backoff() {
        let mesh = TestMesh::connected();
        mesh.set_ack_mode(AckMode::Fail(MeshError::Unavailable("offline".into())));
        let scheduler = scheduler(&mesh, ReplayConfig::default());
        scheduler.queue().enqueue(intent("i1", "v1", 1)).unwrap();

        let handle = scheduler.schedule().unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.schedule().is_none());

        // Let a couple of failing passes run, then heal the mesh
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(!scheduler.queue().is_empty());
        mesh.set_ack_mode(AckMode::Ack);

        let report = handle.await.unwrap();
        assert_eq!(report.replayed, 1);
        assert!(report.failed >= 2);
        assert!(scheduler.queue().is_empty());
        assert!(!scheduler.is_running());

        // Idle again, so a new loop may start
        let again = scheduler.schedule().unwrap();
        assert_eq!(again.await.unwrap(), ReplayReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_drained_stops_at_max_passes() {
        let mesh = TestMesh::connected();
        mesh.set_ack_mode(AckMode::Fail(MeshError::Unavailable("offline".into())));
        let scheduler = scheduler(&mesh, ReplayConfig::default());
        scheduler.queue().enqueue(intent("i1", "v1", 1)).unwrap();

        let report = scheduler.run_until_drained(3).await;
        assert_eq!(report, ReplayReport { replayed: 0, failed: 3, rejected: 0 });
        assert_eq!(scheduler.queue().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_loop_ends_with_invalid_stored_intent() {
        let mesh = TestMesh::connected();
        let mut corrupt = intent("bad", "v1", 1);
        corrupt.weight = -1.0;
        let store = Arc::new(MemoryIntentStore::with_records(vec![corrupt, intent("i2", "v2", 2)]));
        let scheduler = scheduler_with_store(&mesh, store, ReplayConfig::default());

        let handle = scheduler.schedule().unwrap();
        let report = tokio::time::timeout(Duration::from_secs(60), handle)
            .await
            .expect("replay loop should finish")
            .unwrap();

        assert_eq!(report, ReplayReport { replayed: 1, failed: 0, rejected: 0 });
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.queue().len(), 1);
        assert_eq!(scheduler.queue().parked(), ["bad"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_projection_does_not_back_off() {
        let mesh = TestMesh::connected();
        mesh.set_ack_mode(AckMode::Fail(MeshError::Malformed {
            path: "voters".into(),
            message: "schema mismatch".into(),
        }));
        let scheduler = scheduler(&mesh, ReplayConfig::default());
        scheduler.queue().enqueue(intent("i1", "v1", 1)).unwrap();

        let started = tokio::time::Instant::now();
        let report = scheduler.schedule().unwrap().await.unwrap();

        assert_eq!(report, ReplayReport { replayed: 0, failed: 0, rejected: 1 });
        assert!(started.elapsed() < ReplayConfig::default().backoff);
        assert_eq!(scheduler.queue().parked(), ["i1"]);
        assert!(scheduler.queue().contains("i1"));
        assert!(!scheduler.is_running());
    }
}
