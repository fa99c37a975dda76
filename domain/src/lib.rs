//! Domain layer for mesh-quorum
//!
//! This crate contains the pure rules every peer runs identically. It has no
//! dependencies on the replication substrate, storage, or an async runtime.
//!
//! # Core Concepts
//!
//! ## Visibility
//!
//! Every write path is classified `public`, `sensitive` or `local` before a
//! value leaves the peer ([`visibility`]).
//!
//! ## Aggregates
//!
//! Per-voter stances merge into a point tally by last-write-wins per voter,
//! and are periodically materialized into a snapshot ([`aggregate`],
//! [`intent`]).
//!
//! ## Quorum
//!
//! Independently produced AI syntheses are gathered until quorum and one is
//! deterministically selected as canonical ([`quorum`]).

pub mod aggregate;
pub mod config;
pub mod core;
pub mod intent;
pub mod mesh;
pub mod quorum;
pub mod util;
pub mod visibility;

// Re-export commonly used types
pub use aggregate::{
    Agreement, LwwStamp, PointAggregate, PointAggregateSnapshot, PointKey, SourceWindow, Tally,
    VoterPointNode, VoterRows, compute_snapshot, merge_aggregate, tally_rows,
};
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::error::{DomainError, ValidationError};
pub use intent::{VoteIntentRecord, replay_order};
pub use mesh::MeshPath;
pub use quorum::{
    GatherRejection, GatherStatus, GatheredCandidate, GathererConfig, GathererState,
    ProviderInfo, ProviderKind, QuorumStatus, SelectionError, SelectionResult, SelectionRule,
    fnv1a32_str, select_candidate, select_from_gatherer,
};
pub use visibility::{Classification, TopologyViolation, VisibilityTable, validate_write};
