//! Intent queue and replay parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Size cap of the local intent queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Oldest entries are evicted beyond this many.
    pub max_entries: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_entries: 500 }
    }
}

impl QueueConfig {
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }
}

/// Replay pass control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Intents projected per pass.
    pub batch_limit: usize,
    /// Delay before retrying a pass that had failures.
    pub backoff: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            backoff: Duration::from_secs(1),
        }
    }
}

impl ReplayConfig {
    // ==================== Builder Methods ====================

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(QueueConfig::default().max_entries, 500);
        let replay = ReplayConfig::default();
        assert_eq!(replay.batch_limit, 50);
        assert_eq!(replay.backoff, Duration::from_secs(1));
    }
}
