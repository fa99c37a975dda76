//! Intent queue and replay configuration from TOML (`[queue]`, `[replay]`)
//!
//! ```toml
//! [queue]
//! max_entries = 500
//! path = "~/.local/share/mesh-quorum/intents.json"
//! journal = "~/.local/share/mesh-quorum/replay.jsonl"
//!
//! [replay]
//! batch_limit = 50
//! backoff_ms = 1000
//! ```

use quorum_application::{QueueConfig, ReplayConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[queue]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQueueConfig {
    pub max_entries: usize,
    /// Where the queue is persisted; in-memory when unset
    pub path: Option<String>,
    /// Optional JSONL journal of queue and replay events
    pub journal: Option<String>,
}

impl Default for FileQueueConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            path: None,
            journal: None,
        }
    }
}

impl FileQueueConfig {
    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig::default().with_max_entries(self.max_entries)
    }
}

/// Raw `[replay]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReplayConfig {
    pub batch_limit: usize,
    pub backoff_ms: u64,
}

impl Default for FileReplayConfig {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            backoff_ms: 1_000,
        }
    }
}

impl FileReplayConfig {
    pub fn to_replay_config(&self) -> ReplayConfig {
        ReplayConfig::default()
            .with_batch_limit(self.batch_limit)
            .with_backoff(Duration::from_millis(self.backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runtime_defaults() {
        assert_eq!(FileQueueConfig::default().to_queue_config(), QueueConfig::default());
        assert_eq!(
            FileReplayConfig::default().to_replay_config(),
            ReplayConfig::default()
        );
    }
}
