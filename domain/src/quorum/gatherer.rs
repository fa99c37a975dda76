//! Candidate gathering
//!
//! A gatherer collects candidate syntheses for one topic epoch until a quorum
//! of them has arrived or the collection window closes. It is a pure state
//! machine: every accepted candidate produces a new [`GathererState`] and
//! leaves the old one untouched.
//!
//! ```text
//!               candidates.len() >= quorum_size
//! Collecting ─────────────────────────────────────▶ QuorumReached
//!     │
//!     │  now - started_at >= candidate_timeout_ms (and quorum unmet)
//!     └───────────────────────────────────────────▶ TimedOut
//! ```
//!
//! Quorum always wins over the deadline.

use super::candidate::GatheredCandidate;
use super::rule::SelectionRule;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a gatherer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherStatus {
    /// Still accepting candidates
    Collecting,
    /// Enough candidates arrived; terminal
    QuorumReached,
    /// Deadline passed before quorum; terminal
    TimedOut,
}

impl GatherStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatherStatus::Collecting)
    }

    pub fn is_quorum_reached(&self) -> bool {
        matches!(self, GatherStatus::QuorumReached)
    }
}

impl std::fmt::Display for GatherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatherStatus::Collecting => write!(f, "collecting"),
            GatherStatus::QuorumReached => write!(f, "quorum_reached"),
            GatherStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Why a candidate was refused. The gatherer itself is never affected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatherRejection {
    #[error("Topic mismatch: expected '{expected}', got '{actual}'")]
    TopicMismatch { expected: String, actual: String },

    #[error("Epoch mismatch: expected {expected}, got {actual}")]
    EpochMismatch { expected: u64, actual: u64 },

    #[error("Duplicate candidate_id '{0}'")]
    DuplicateCandidate(String),

    #[error("Quorum already reached ({quorum_size} candidates)")]
    QuorumAlreadyReached { quorum_size: usize },

    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
}

impl GatherRejection {
    /// Reason string reported back to the submitter
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Gatherer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GathererConfig {
    pub quorum_size: usize,
    pub candidate_timeout_ms: u64,
    #[serde(default)]
    pub selection_rule: SelectionRule,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            quorum_size: 3,
            candidate_timeout_ms: 30_000,
            selection_rule: SelectionRule::Hashed,
        }
    }
}

impl GathererConfig {
    pub fn with_quorum_size(mut self, quorum_size: usize) -> Self {
        self.quorum_size = quorum_size;
        self
    }

    pub fn with_candidate_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.candidate_timeout_ms = timeout_ms;
        self
    }

    pub fn with_selection_rule(mut self, rule: SelectionRule) -> Self {
        self.selection_rule = rule;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quorum_size == 0 {
            return Err(DomainError::InvalidConfig(
                "quorum_size must be at least 1".to_string(),
            ));
        }
        if self.candidate_timeout_ms == 0 {
            return Err(DomainError::InvalidConfig(
                "candidate_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Immutable gatherer state for one topic epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GathererState {
    pub topic_id: String,
    pub epoch: u64,
    pub config: GathererConfig,
    pub candidates: Vec<GatheredCandidate>,
    pub started_at: u64,
}

/// A successfully added candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub state: GathererState,
    pub status: GatherStatus,
}

/// Read-only progress view of a gatherer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub topic_id: String,
    pub epoch: u64,
    pub status: GatherStatus,
    pub received: usize,
    pub required: usize,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    /// Candidate ids, sorted ascending
    pub candidate_ids: Vec<String>,
}

impl GathererState {
    /// Start collecting for `topic_id`/`epoch` at `started_at` (millis).
    pub fn create(
        topic_id: impl Into<String>,
        epoch: u64,
        config: GathererConfig,
        started_at: u64,
    ) -> Result<Self, DomainError> {
        let topic_id = topic_id.into();
        if topic_id.trim().is_empty() {
            return Err(DomainError::InvalidConfig(
                "topic_id must not be empty".to_string(),
            ));
        }
        config.validate()?;
        Ok(Self {
            topic_id,
            epoch,
            config,
            candidates: Vec::new(),
            started_at,
        })
    }

    pub fn has_quorum(&self) -> bool {
        self.candidates.len() >= self.config.quorum_size
    }

    /// Offer a candidate submitted for `topic_id`/`epoch`.
    ///
    /// Fails closed: anything that is not clearly acceptable is rejected with
    /// a distinct reason, and `self` is never modified.
    pub fn add_candidate(
        &self,
        topic_id: &str,
        epoch: u64,
        candidate: GatheredCandidate,
        now: u64,
    ) -> Result<Accepted, GatherRejection> {
        if topic_id != self.topic_id {
            return Err(GatherRejection::TopicMismatch {
                expected: self.topic_id.clone(),
                actual: topic_id.to_string(),
            });
        }
        if epoch != self.epoch {
            return Err(GatherRejection::EpochMismatch {
                expected: self.epoch,
                actual: epoch,
            });
        }
        if self.has_quorum() {
            return Err(GatherRejection::QuorumAlreadyReached {
                quorum_size: self.config.quorum_size,
            });
        }
        candidate
            .validate()
            .map_err(GatherRejection::InvalidCandidate)?;
        if self
            .candidates
            .iter()
            .any(|c| c.candidate_id == candidate.candidate_id)
        {
            return Err(GatherRejection::DuplicateCandidate(candidate.candidate_id));
        }

        let mut candidates = self.candidates.clone();
        candidates.push(candidate);
        let state = GathererState {
            candidates,
            ..self.clone()
        };
        let status = state.check_status(now);
        Ok(Accepted { state, status })
    }

    /// Current status at `now` (millis). Quorum wins over the deadline.
    pub fn check_status(&self, now: u64) -> GatherStatus {
        if self.has_quorum() {
            GatherStatus::QuorumReached
        } else if self.elapsed_ms(now) >= self.config.candidate_timeout_ms {
            GatherStatus::TimedOut
        } else {
            GatherStatus::Collecting
        }
    }

    fn elapsed_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.started_at)
    }

    pub fn to_quorum_status(&self, now: u64) -> QuorumStatus {
        let status = self.check_status(now);
        let elapsed_ms = self.elapsed_ms(now);
        let remaining_ms = if status.is_terminal() {
            0
        } else {
            self.config.candidate_timeout_ms.saturating_sub(elapsed_ms)
        };
        let mut candidate_ids: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.candidate_id.clone())
            .collect();
        candidate_ids.sort();

        QuorumStatus {
            topic_id: self.topic_id.clone(),
            epoch: self.epoch,
            status,
            received: self.candidates.len(),
            required: self.config.quorum_size,
            elapsed_ms,
            remaining_ms,
            candidate_ids,
        }
    }
}
