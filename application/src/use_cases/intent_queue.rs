//! Vote intent queue
//!
//! A durable, deduplicated, size-capped local log of vote submissions. The
//! queue is the only owner of pending intents; an intent leaves it only once
//! it has been projected onto the shared aggregate.
//!
//! Every mutation is persisted through the [`IntentStore`] before it is
//! observable. If the store refuses a write the in-memory queue is rolled
//! back, so memory and disk never disagree.
//!
//! An intent that fails validation on load, or whose projection fails with
//! a non-retryable error, is parked: it stays queued and on disk but replay
//! skips it until the queue is reopened.

use crate::config::QueueConfig;
use crate::ports::event_logger::{EventLogger, LogEvent, NoEventLogger};
use crate::ports::intent_store::{IntentStore, StoreError};
use quorum_domain::{ValidationError, VoteIntentRecord, replay_order};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::future::Future;
use std::ops::AddAssign;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from queue operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Invalid vote intent: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueueError {
    /// Store failures may clear up; invalid intents never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Store(_))
    }
}

/// Result of [`VoteIntentQueue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Same `intent_id` already pending; nothing changed
    Duplicate,
}

/// Failure of one projection during replay
pub trait ReplayFailure: std::fmt::Display {
    /// Whether a later pass may succeed
    fn is_retryable(&self) -> bool;
}

/// Summary of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub replayed: usize,
    /// Retryable failures
    pub failed: usize,
    /// Non-retryable failures, parked in this pass
    pub rejected: usize,
}

impl AddAssign for ReplayReport {
    fn add_assign(&mut self, other: Self) {
        self.replayed += other.replayed;
        self.failed += other.failed;
        self.rejected += other.rejected;
    }
}

/// Durable queue of pending vote intents
pub struct VoteIntentQueue {
    store: Arc<dyn IntentStore>,
    config: QueueConfig,
    entries: Mutex<Vec<VoteIntentRecord>>,
    /// Intent ids replay skips
    parked: Mutex<BTreeSet<String>>,
    logger: Arc<dyn EventLogger>,
}

impl VoteIntentQueue {
    /// Load the queue from `store`.
    ///
    /// Duplicate ids in the stored list keep their first occurrence, and the
    /// list is trimmed to the configured cap. Records that fail validation
    /// are kept but parked.
    pub fn open(store: Arc<dyn IntentStore>, config: QueueConfig) -> Result<Self, QueueError> {
        let mut entries: Vec<VoteIntentRecord> = Vec::new();
        for record in store.load()? {
            if !entries.iter().any(|e| e.intent_id == record.intent_id) {
                entries.push(record);
            }
        }
        let evicted = evict_oldest(&mut entries, config.max_entries);
        if evicted > 0 {
            warn!(evicted, max_entries = config.max_entries, "Stored queue over cap; evicted oldest");
        }

        let mut parked = BTreeSet::new();
        for record in &entries {
            if let Err(e) = record.validate() {
                warn!(intent_id = %record.intent_id, error = %e, "Stored intent is invalid; parking it");
                parked.insert(record.intent_id.clone());
            }
        }
        info!(pending = entries.len(), parked = parked.len(), "Vote intent queue opened");

        Ok(Self {
            store,
            config,
            entries: Mutex::new(entries),
            parked: Mutex::new(parked),
            logger: Arc::new(NoEventLogger),
        })
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VoteIntentRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_parked(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `mutate` and persist, restoring the previous contents if the
    /// store fails.
    fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut Vec<VoteIntentRecord>) -> T,
    ) -> Result<T, QueueError> {
        let mut entries = self.lock();
        let before = entries.clone();
        let result = mutate(&mut entries);
        if let Err(e) = self.store.save(&entries) {
            *entries = before;
            warn!(error = %e, "Failed to persist intent queue; change rolled back");
            return Err(e.into());
        }
        Ok(result)
    }

    /// Add an intent. Idempotent by `intent_id`.
    pub fn enqueue(&self, record: VoteIntentRecord) -> Result<EnqueueOutcome, QueueError> {
        record.validate()?;
        if self.contains(&record.intent_id) {
            debug!(intent_id = %record.intent_id, "Intent already queued");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let intent_id = record.intent_id.clone();
        let point = record.point_key().to_string();
        let max_entries = self.config.max_entries;
        let evicted = self.mutate(|entries| {
            if entries.iter().any(|e| e.intent_id == record.intent_id) {
                return None;
            }
            entries.push(record);
            Some(evict_oldest(entries, max_entries))
        })?;

        let Some(evicted) = evicted else {
            return Ok(EnqueueOutcome::Duplicate);
        };
        if evicted > 0 {
            warn!(evicted, max_entries, "Intent queue full; evicted oldest");
        }
        debug!(intent_id = %intent_id, point = %point, "Intent queued");
        self.logger.log(LogEvent::new(
            "intent_enqueued",
            json!({ "intent_id": intent_id, "point": point, "evicted": evicted }),
        ));
        Ok(EnqueueOutcome::Queued)
    }

    /// Remove a projected intent. Returns whether it was present.
    pub fn mark_projected(&self, intent_id: &str) -> Result<bool, QueueError> {
        if !self.contains(intent_id) {
            return Ok(false);
        }
        let removed = self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.intent_id != intent_id);
            entries.len() != before
        })?;
        self.lock_parked().remove(intent_id);
        Ok(removed)
    }

    /// Drop every pending intent. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let removed = self.mutate(|entries| std::mem::take(entries).len())?;
        self.lock_parked().clear();
        Ok(removed)
    }

    /// Ids of queued intents replay skips, sorted
    pub fn parked(&self) -> Vec<String> {
        self.lock_parked().iter().cloned().collect()
    }

    fn park(&self, intent_id: &str) {
        self.lock_parked().insert(intent_id.to_string());
    }

    pub fn contains(&self, intent_id: &str) -> bool {
        self.lock().iter().any(|e| e.intent_id == intent_id)
    }

    /// Pending intents in replay order
    pub fn pending(&self) -> Vec<VoteIntentRecord> {
        let mut pending = self.lock().clone();
        pending.sort_by(replay_order);
        pending
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Project up to `limit` unparked pending intents in replay order.
    ///
    /// Each intent whose projection succeeds is removed. One that fails
    /// retryably stays queued for the next pass; one that fails otherwise is
    /// parked.
    pub async fn replay<F, Fut, E>(&self, limit: usize, mut project: F) -> ReplayReport
    where
        F: FnMut(VoteIntentRecord) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: ReplayFailure,
    {
        let mut report = ReplayReport::default();
        let parked = self.lock_parked().clone();
        let batch = self
            .pending()
            .into_iter()
            .filter(|record| !parked.contains(&record.intent_id))
            .take(limit);

        for record in batch {
            let intent_id = record.intent_id.clone();
            let point = record.point_key().to_string();

            if let Err(e) = project(record).await {
                if e.is_retryable() {
                    report.failed += 1;
                    warn!(intent_id = %intent_id, point = %point, error = %e, "Intent projection failed; will retry");
                    self.logger.log(LogEvent::new(
                        "intent_failed",
                        json!({ "intent_id": intent_id, "point": point, "error": e.to_string() }),
                    ));
                } else {
                    report.rejected += 1;
                    self.park(&intent_id);
                    warn!(intent_id = %intent_id, point = %point, error = %e, "Intent projection cannot succeed; parking it");
                    self.logger.log(LogEvent::new(
                        "intent_rejected",
                        json!({ "intent_id": intent_id, "point": point, "error": e.to_string() }),
                    ));
                }
                continue;
            }

            match self.mark_projected(&intent_id) {
                Ok(_) => {
                    report.replayed += 1;
                    self.logger.log(LogEvent::new(
                        "intent_projected",
                        json!({ "intent_id": intent_id, "point": point }),
                    ));
                }
                Err(e) => {
                    // Projected but still queued; replaying it again is harmless
                    report.failed += 1;
                    warn!(intent_id = %intent_id, error = %e, "Could not dequeue projected intent");
                }
            }
        }

        report
    }
}

/// Evict from the front (oldest inserted) down to `max`.
fn evict_oldest(entries: &mut Vec<VoteIntentRecord>, max: usize) -> usize {
    let excess = entries.len().saturating_sub(max);
    entries.drain(..excess);
    excess
}
