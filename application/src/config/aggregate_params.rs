//! Aggregate client parameters.
//!
//! [`AggregateConfig`] holds every bound the aggregate client puts on mesh
//! round-trips. None of them may be unbounded.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read/write bounds for [`AggregateClient`](crate::use_cases::aggregate_client::AggregateClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// How long a write waits for an acknowledgement before it counts as
    /// written anyway.
    pub ack_timeout: Duration,
    /// Live fan-in stops after this long without a new row.
    pub fanin_idle: Duration,
    /// Live fan-in never runs longer than this.
    pub fanin_ceiling: Duration,
    /// Bound on a single one-shot read.
    pub read_timeout: Duration,
    /// Resolved snapshots kept in memory.
    pub snapshot_cache_capacity: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(1),
            fanin_idle: Duration::from_millis(200),
            fanin_ceiling: Duration::from_millis(1_500),
            read_timeout: Duration::from_millis(2_500),
            snapshot_cache_capacity: 256,
        }
    }
}

impl AggregateConfig {
    // ==================== Builder Methods ====================

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_fanin_idle(mut self, idle: Duration) -> Self {
        self.fanin_idle = idle;
        self
    }

    pub fn with_fanin_ceiling(mut self, ceiling: Duration) -> Self {
        self.fanin_ceiling = ceiling;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_snapshot_cache_capacity(mut self, capacity: usize) -> Self {
        self.snapshot_cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = AggregateConfig::default();
        assert_eq!(config.ack_timeout, Duration::from_secs(1));
        assert_eq!(config.fanin_idle, Duration::from_millis(200));
        assert_eq!(config.fanin_ceiling, Duration::from_millis(1_500));
        assert_eq!(config.snapshot_cache_capacity, 256);
    }

    #[test]
    fn test_builder() {
        let config = AggregateConfig::default()
            .with_ack_timeout(Duration::from_millis(50))
            .with_snapshot_cache_capacity(2);
        assert_eq!(config.ack_timeout, Duration::from_millis(50));
        assert_eq!(config.snapshot_cache_capacity, 2);
    }
}
