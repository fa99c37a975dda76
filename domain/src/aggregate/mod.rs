//! Aggregate Merge Engine (pure part)
//!
//! Every voter owns exactly one live node per point. A point's tally is
//! computed from those nodes and periodically materialized into a snapshot
//! stored beside them:
//!
//! ```text
//! .../epochs/{epoch}/
//!     ├── voters/{voter_id}/{point_id}   VoterPointNode (one per voter, overwritten)
//!     └── points/{point_id}              PointAggregateSnapshot (superseded, never deleted)
//! ```
//!
//! Readers merge the snapshot with whatever live rows they can fan in, by
//! element-wise maximum, so either side may be stale without the result
//! moving backwards.

pub mod entities;
pub mod merge;
pub mod paths;
pub mod validation;

pub use entities::{
    Agreement, LwwStamp, PointAggregate, PointAggregateSnapshot, PointKey, SourceWindow, Tally,
    VoterPointNode,
};
pub use merge::{VoterRows, compute_snapshot, merge_aggregate, newer_snapshot, tally_rows};
pub use validation::{
    MAX_WEIGHT, to_publishable, validate_point_key, validate_snapshot, validate_voter_node,
};
