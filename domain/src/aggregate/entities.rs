//! Aggregate entities
//!
//! Per-voter stances, the materialized per-point snapshot, and the merged
//! view returned to readers.

use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A voter's stance on a point.
///
/// Serialized as the integers `-1`, `0` and `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Agreement {
    Disagree,
    Neutral,
    Agree,
}

impl Agreement {
    pub fn as_i64(self) -> i64 {
        match self {
            Agreement::Disagree => -1,
            Agreement::Neutral => 0,
            Agreement::Agree => 1,
        }
    }

    /// Neutral stances are recorded but do not make a voter a participant.
    pub fn is_participating(self) -> bool {
        !matches!(self, Agreement::Neutral)
    }
}

impl TryFrom<i64> for Agreement {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Agreement::Disagree),
            0 => Ok(Agreement::Neutral),
            1 => Ok(Agreement::Agree),
            other => Err(ValidationError::field(
                "agreement",
                format!("must be -1, 0 or 1 (got {other})"),
            )),
        }
    }
}

impl From<Agreement> for i64 {
    fn from(value: Agreement) -> Self {
        value.as_i64()
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agreement::Disagree => write!(f, "disagree"),
            Agreement::Neutral => write!(f, "neutral"),
            Agreement::Agree => write!(f, "agree"),
        }
    }
}

/// Addresses one discussion point inside a synthesis epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey {
    pub topic_id: String,
    pub synthesis_id: String,
    pub epoch: u64,
    pub point_id: String,
}

impl PointKey {
    pub fn new(
        topic_id: impl Into<String>,
        synthesis_id: impl Into<String>,
        epoch: u64,
        point_id: impl Into<String>,
    ) -> Self {
        Self {
            topic_id: topic_id.into(),
            synthesis_id: synthesis_id.into(),
            epoch,
            point_id: point_id.into(),
        }
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.topic_id, self.synthesis_id, self.epoch, self.point_id
        )
    }
}

/// Ordering stamp used for last-write-wins.
///
/// Compared field by field: `seq`, then `emitted_at`, then `intent_id`
/// lexicographically. The derive order below is that comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LwwStamp<'a> {
    pub seq: u64,
    pub emitted_at: u64,
    pub intent_id: &'a str,
}

/// One voter's live stance on one point.
///
/// Stored at `.../voters/{voter_id}/{point_id}` and overwritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterPointNode {
    pub point_id: String,
    pub agreement: Agreement,
    pub weight: f64,
    /// Wall-clock millis of the write
    pub updated_at: u64,
    /// LWW stamp of the intent that produced this node
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub emitted_at: u64,
    #[serde(default)]
    pub intent_id: String,
}

impl VoterPointNode {
    pub fn stamp(&self) -> LwwStamp<'_> {
        LwwStamp {
            seq: self.seq,
            emitted_at: self.emitted_at,
            intent_id: &self.intent_id,
        }
    }
}

/// Sequence range of the rows that contributed to a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWindow {
    pub from_seq: u64,
    pub to_seq: u64,
}

/// Materialized roll-up of a point, stored at `.../points/{point_id}`.
///
/// Never deleted; a newer snapshot supersedes it. `version` and
/// `source_window.to_seq` never decrease for the same point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAggregateSnapshot {
    pub topic_id: String,
    pub synthesis_id: String,
    pub epoch: u64,
    pub point_id: String,
    pub agree: u64,
    pub disagree: u64,
    pub weight: f64,
    pub participants: u64,
    pub version: u64,
    pub computed_at: u64,
    pub source_window: SourceWindow,
}

impl PointAggregateSnapshot {
    pub fn key(&self) -> PointKey {
        PointKey::new(
            self.topic_id.clone(),
            self.synthesis_id.clone(),
            self.epoch,
            self.point_id.clone(),
        )
    }

    /// A snapshot with zero tallies for `key`
    pub fn empty(key: &PointKey, computed_at: u64) -> Self {
        Self {
            topic_id: key.topic_id.clone(),
            synthesis_id: key.synthesis_id.clone(),
            epoch: key.epoch,
            point_id: key.point_id.clone(),
            agree: 0,
            disagree: 0,
            weight: 0.0,
            participants: 0,
            version: 0,
            computed_at,
            source_window: SourceWindow::default(),
        }
    }
}

/// Tally computed from live voter rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub agree: u64,
    pub disagree: u64,
    pub weight: f64,
    pub participants: u64,
}

/// The answer to "what is the current tally of this point".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAggregate {
    pub point_id: String,
    pub agree: u64,
    pub disagree: u64,
    pub weight: f64,
    pub participants: u64,
    /// Version of the snapshot that fed this view, if one was read
    pub snapshot_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Agreement::Disagree).unwrap(), "-1");
        let parsed: Agreement = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Agreement::Agree);
        assert!(serde_json::from_str::<Agreement>("2").is_err());
    }

    #[test]
    fn test_agreement_participation() {
        assert!(Agreement::Agree.is_participating());
        assert!(Agreement::Disagree.is_participating());
        assert!(!Agreement::Neutral.is_participating());
    }

    #[test]
    fn test_lww_stamp_ordering() {
        let a = LwwStamp { seq: 10, emitted_at: 5, intent_id: "z" };
        let b = LwwStamp { seq: 11, emitted_at: 0, intent_id: "a" };
        let c = LwwStamp { seq: 11, emitted_at: 0, intent_id: "b" };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_node_without_stamp_fields_deserializes() {
        let node: VoterPointNode = serde_json::from_value(serde_json::json!({
            "point_id": "p1",
            "agreement": -1,
            "weight": 0.5,
            "updated_at": 100
        }))
        .unwrap();
        assert_eq!(node.seq, 0);
        assert!(node.intent_id.is_empty());
    }

    #[test]
    fn test_point_key_display() {
        let key = PointKey::new("t", "s", 3, "p");
        assert_eq!(key.to_string(), "t/s/3/p");
    }
}
