//! Durable intent store port
//!
//! The vote intent queue persists its whole contents after every mutation.
//! A store only has to load and save the full list atomically; ordering,
//! dedup and eviction are the queue's job.

use quorum_domain::VoteIntentRecord;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors from an intent store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Intent store I/O error: {0}")]
    Io(String),

    #[error("Intent store is corrupt: {0}")]
    Corrupt(String),
}

/// Durable storage for pending vote intents
///
/// Implementations must make `save` all-or-nothing: after a crash, `load`
/// returns either the previous list or the new one.
pub trait IntentStore: Send + Sync {
    /// Load every persisted intent in insertion order.
    fn load(&self) -> Result<Vec<VoteIntentRecord>, StoreError>;

    /// Replace the persisted list.
    fn save(&self, records: &[VoteIntentRecord]) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryIntentStore {
    records: Mutex<Vec<VoteIntentRecord>>,
}

impl MemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<VoteIntentRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Snapshot of the persisted list
    pub fn records(&self) -> Vec<VoteIntentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IntentStore for MemoryIntentStore {
    fn load(&self) -> Result<Vec<VoteIntentRecord>, StoreError> {
        Ok(self.records())
    }

    fn save(&self, records: &[VoteIntentRecord]) -> Result<(), StoreError> {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        Ok(())
    }
}
