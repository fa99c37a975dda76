//! Mesh barrier configuration from TOML (`[mesh]` section)
//!
//! ```toml
//! [mesh]
//! barrier_timeout_ms = 2500   # wait for first remote contact before writing
//! warn_interval_ms = 15000    # at most one barrier warning per interval
//! ```

use quorum_application::SyncConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[mesh]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMeshConfig {
    pub barrier_timeout_ms: u64,
    pub warn_interval_ms: u64,
}

impl Default for FileMeshConfig {
    fn default() -> Self {
        Self {
            barrier_timeout_ms: 2_500,
            warn_interval_ms: 15_000,
        }
    }
}

impl FileMeshConfig {
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig::default()
            .with_remote_barrier_timeout(Duration::from_millis(self.barrier_timeout_ms))
            .with_warn_interval(Duration::from_millis(self.warn_interval_ms))
    }
}
