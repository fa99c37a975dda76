//! Canonical mesh locations of aggregate data

use super::entities::PointKey;
use crate::mesh::MeshPath;

/// Root of all aggregate data
pub const AGGREGATES_ROOT: &str = "vh/aggregates";

/// `vh/aggregates/topics/{topic}/syntheses/{synthesis}/epochs/{epoch}/`
pub fn epoch_path(key: &PointKey) -> MeshPath {
    MeshPath::parse(AGGREGATES_ROOT)
        .child("topics")
        .child(&key.topic_id)
        .child("syntheses")
        .child(&key.synthesis_id)
        .child("epochs")
        .child(key.epoch.to_string())
}

/// Snapshot location: `.../epochs/{epoch}/points/{point}/`
pub fn snapshot_path(key: &PointKey) -> MeshPath {
    epoch_path(key).child("points").child(&key.point_id)
}

/// Directory of every voter in the epoch: `.../epochs/{epoch}/voters/`
pub fn voters_path(key: &PointKey) -> MeshPath {
    epoch_path(key).child("voters")
}

/// One voter's node for the point: `.../voters/{voter}/{point}/`
pub fn voter_node_path(key: &PointKey, voter_id: &str) -> MeshPath {
    voters_path(key).child(voter_id).child(&key.point_id)
}
