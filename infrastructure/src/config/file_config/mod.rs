//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every field is optional in the file; durations are in milliseconds.

mod aggregates;
mod gather;
mod mesh;
mod queue;

pub use aggregates::FileAggregatesConfig;
pub use gather::FileGatherConfig;
pub use mesh::FileMeshConfig;
pub use queue::{FileQueueConfig, FileReplayConfig};

use quorum_domain::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Write barrier settings
    pub mesh: FileMeshConfig,
    /// Aggregate read/write bounds
    pub aggregates: FileAggregatesConfig,
    /// Intent queue settings
    pub queue: FileQueueConfig,
    /// Replay pass settings
    pub replay: FileReplayConfig,
    /// Candidate gathering settings
    pub gather: FileGatherConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Every mesh round-trip must stay bounded, so zero timeouts are errors,
    /// as are zero counts that would stall the queue or the gatherer.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let durations = [
            ("mesh.barrier_timeout_ms", self.mesh.barrier_timeout_ms),
            ("aggregates.ack_timeout_ms", self.aggregates.ack_timeout_ms),
            ("aggregates.fanin_idle_ms", self.aggregates.fanin_idle_ms),
            ("aggregates.fanin_ceiling_ms", self.aggregates.fanin_ceiling_ms),
            ("aggregates.read_timeout_ms", self.aggregates.read_timeout_ms),
            ("replay.backoff_ms", self.replay.backoff_ms),
            ("gather.candidate_timeout_ms", self.gather.candidate_timeout_ms),
        ];
        issues.extend(
            durations
                .iter()
                .filter(|(_, ms)| *ms == 0)
                .map(|(field, _)| ConfigIssue::zero_duration(field)),
        );

        let counts = [
            ("queue.max_entries", self.queue.max_entries),
            ("replay.batch_limit", self.replay.batch_limit),
            ("gather.quorum_size", self.gather.quorum_size),
        ];
        issues.extend(
            counts
                .iter()
                .filter(|(_, n)| *n == 0)
                .map(|(field, _)| ConfigIssue::zero_value(field)),
        );

        issues.extend(self.gather.parse_selection_rule().1);
        issues
    }
}
