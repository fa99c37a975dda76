//! Aggregate client configuration from TOML (`[aggregates]` section)
//!
//! ```toml
//! [aggregates]
//! ack_timeout_ms = 1000
//! fanin_idle_ms = 200
//! fanin_ceiling_ms = 1500
//! read_timeout_ms = 2500
//! snapshot_cache_capacity = 256
//! ```

use quorum_application::AggregateConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[aggregates]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAggregatesConfig {
    pub ack_timeout_ms: u64,
    pub fanin_idle_ms: u64,
    pub fanin_ceiling_ms: u64,
    pub read_timeout_ms: u64,
    pub snapshot_cache_capacity: usize,
}

impl Default for FileAggregatesConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1_000,
            fanin_idle_ms: 200,
            fanin_ceiling_ms: 1_500,
            read_timeout_ms: 2_500,
            snapshot_cache_capacity: 256,
        }
    }
}

impl FileAggregatesConfig {
    pub fn to_aggregate_config(&self) -> AggregateConfig {
        AggregateConfig::default()
            .with_ack_timeout(Duration::from_millis(self.ack_timeout_ms))
            .with_fanin_idle(Duration::from_millis(self.fanin_idle_ms))
            .with_fanin_ceiling(Duration::from_millis(self.fanin_ceiling_ms))
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_snapshot_cache_capacity(self.snapshot_cache_capacity)
    }
}
