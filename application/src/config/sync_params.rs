//! Guarded sync parameters.
//!
//! [`SyncConfig`] bounds the wait that every guarded write performs before
//! it is handed to the mesh.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write barrier control parameters.
///
/// Used by [`GuardedMesh`](crate::sync::GuardedMesh).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long a write waits for the first remote contact before
    /// proceeding anyway.
    pub remote_barrier_timeout: Duration,
    /// Minimum gap between two "barrier timed out" warnings.
    pub warn_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_barrier_timeout: Duration::from_millis(2_500),
            warn_interval: Duration::from_secs(15),
        }
    }
}

impl SyncConfig {
    // ==================== Builder Methods ====================

    pub fn with_remote_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.remote_barrier_timeout = timeout;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }
}
