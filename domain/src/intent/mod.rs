//! Vote intents
//!
//! A [`VoteIntentRecord`] is the durable, local form of a cast vote. It is
//! created once, never mutated, and removed only after it has been projected
//! onto the shared aggregate. Two orderings matter:
//!
//! - **Replay order** ([`replay_order`]): a total order over pending intents
//!   that does not depend on arrival order, so one peer always replays the
//!   same queue the same way.
//! - **LWW order** ([`VoteIntentRecord::beats`]): whether an intent overrides
//!   the voter's existing node, using `(seq, emitted_at, intent_id)`.

use crate::aggregate::validation::{validate_id, validate_point_key, validate_weight};
use crate::aggregate::{Agreement, LwwStamp, PointKey, VoterPointNode};
use crate::core::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Durable record of one vote submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteIntentRecord {
    /// Idempotency key
    pub intent_id: String,
    pub voter_id: String,
    pub topic_id: String,
    pub synthesis_id: String,
    pub epoch: u64,
    pub point_id: String,
    pub agreement: Agreement,
    pub weight: f64,
    /// Opaque proof reference; persisted locally, never published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_ref: Option<String>,
    pub seq: u64,
    pub emitted_at: u64,
}

impl VoteIntentRecord {
    pub fn point_key(&self) -> PointKey {
        PointKey::new(
            self.topic_id.clone(),
            self.synthesis_id.clone(),
            self.epoch,
            self.point_id.clone(),
        )
    }

    pub fn stamp(&self) -> LwwStamp<'_> {
        LwwStamp {
            seq: self.seq,
            emitted_at: self.emitted_at,
            intent_id: &self.intent_id,
        }
    }

    /// Whether this intent should replace `existing` under last-write-wins.
    ///
    /// An equal stamp means the same intent was already applied, so it does
    /// not win again.
    pub fn beats(&self, existing: Option<&VoterPointNode>) -> bool {
        match existing {
            None => true,
            Some(node) => self.stamp() > node.stamp(),
        }
    }

    /// The voter node this intent projects to.
    ///
    /// `proof_ref` is deliberately absent from the node.
    pub fn to_node(&self, updated_at: u64) -> VoterPointNode {
        VoterPointNode {
            point_id: self.point_id.clone(),
            agreement: self.agreement,
            weight: self.weight,
            updated_at,
            seq: self.seq,
            emitted_at: self.emitted_at,
            intent_id: self.intent_id.clone(),
        }
    }

    /// Whether a node read back after an unacknowledged write shows this
    /// intent (or a later one for the same stance) landed.
    pub fn is_reflected_by(&self, node: &VoterPointNode) -> bool {
        node.point_id == self.point_id && node.agreement == self.agreement && node.seq >= self.seq
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id("intent_id", &self.intent_id)?;
        validate_id("voter_id", &self.voter_id)?;
        validate_point_key(&self.point_key())?;
        validate_weight(self.weight)
    }
}

/// Total replay order:
/// `(seq, emitted_at, topic_id, synthesis_id, epoch, point_id, voter_id, intent_id)`.
pub fn replay_order(a: &VoteIntentRecord, b: &VoteIntentRecord) -> Ordering {
    fn key(r: &VoteIntentRecord) -> (u64, u64, &str, &str, u64, &str, &str, &str) {
        (
            r.seq,
            r.emitted_at,
            &r.topic_id,
            &r.synthesis_id,
            r.epoch,
            &r.point_id,
            &r.voter_id,
            &r.intent_id,
        )
    }
    key(a).cmp(&key(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{PointAggregateSnapshot, SourceWindow, VoterRows, compute_snapshot};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn intent(id: &str, voter: &str, agreement: Agreement, weight: f64, seq: u64) -> VoteIntentRecord {
        VoteIntentRecord {
            intent_id: id.to_string(),
            voter_id: voter.to_string(),
            topic_id: "topic".to_string(),
            synthesis_id: "synth".to_string(),
            epoch: 1,
            point_id: "p1".to_string(),
            agreement,
            weight,
            proof_ref: Some("proof-123".to_string()),
            seq,
            emitted_at: seq * 10,
        }
    }

    #[test]
    fn test_beats_uses_seq_then_emitted_then_id() {
        let older = intent("b", "v", Agreement::Agree, 1.0, 10);
        let newer = intent("a", "v", Agreement::Disagree, 1.0, 11);

        let node = older.to_node(0);
        assert!(newer.beats(Some(&node)));
        assert!(!older.beats(Some(&newer.to_node(0))));
        assert!(older.beats(None));

        // Same seq and emitted_at: intent id breaks the tie
        let mut tie = intent("c", "v", Agreement::Neutral, 1.0, 10);
        tie.emitted_at = older.emitted_at;
        assert!(tie.beats(Some(&node)));
    }

    #[test]
    fn test_replaying_same_intent_does_not_win() {
        let record = intent("i1", "v", Agreement::Agree, 1.0, 5);
        assert!(!record.beats(Some(&record.to_node(99))));
    }

    #[test]
    fn test_node_omits_proof_ref() {
        let record = intent("i1", "v", Agreement::Agree, 0.7, 5);
        let value = serde_json::to_value(record.to_node(1)).unwrap();
        assert!(value.get("proof_ref").is_none());
        assert_eq!(value["agreement"], 1);
    }

    #[test]
    fn test_replay_order_is_total_and_arrival_independent() {
        let mut records = vec![
            intent("i3", "v2", Agreement::Agree, 1.0, 2),
            intent("i1", "v1", Agreement::Agree, 1.0, 1),
            intent("i2", "v1", Agreement::Agree, 1.0, 2),
        ];
        records.sort_by(replay_order);
        let ids: Vec<_> = records.iter().map(|r| r.intent_id.as_str()).collect();
        assert_eq!(ids, ["i1", "i2", "i3"]);
    }

    #[test]
    fn test_is_reflected_by() {
        let record = intent("i1", "v", Agreement::Agree, 1.0, 5);
        assert!(record.is_reflected_by(&record.to_node(1)));

        let mut stale = record.to_node(1);
        stale.seq = 4;
        assert!(!record.is_reflected_by(&stale));

        let mut flipped = record.to_node(1);
        flipped.agreement = Agreement::Disagree;
        assert!(!record.is_reflected_by(&flipped));
    }

    #[test]
    fn test_validate() {
        assert!(intent("i1", "v", Agreement::Agree, 1.0, 1).validate().is_ok());
        assert!(intent("", "v", Agreement::Agree, 1.0, 1).validate().is_err());
        assert!(intent("i1", "v", Agreement::Agree, -0.1, 1).validate().is_err());
    }

    /// Project intents one at a time the way a peer would: LWW per voter,
    /// then recompute the snapshot from the rows plus the previous snapshot.
    fn project_all(records: &[VoteIntentRecord]) -> PointAggregateSnapshot {
        let key = records[0].point_key();
        let mut rows = VoterRows::new();
        let mut snapshot: Option<PointAggregateSnapshot> = None;
        for record in records {
            if record.beats(rows.get(&record.voter_id)) {
                rows.insert(record.voter_id.clone(), record.to_node(0));
            }
            snapshot = Some(compute_snapshot(&key, &rows, snapshot.as_ref(), 0));
        }
        snapshot.unwrap()
    }

    #[test]
    fn test_two_voter_scenario() {
        let records = [
            intent("a-1", "A", Agreement::Agree, 0.7, 10),
            intent("a-2", "A", Agreement::Disagree, 1.3, 30),
            intent("b-1", "B", Agreement::Agree, 1.1, 20),
        ];
        let snapshot = project_all(&records);
        assert_eq!(snapshot.agree, 1);
        assert_eq!(snapshot.disagree, 1);
        assert_eq!(snapshot.participants, 2);
        assert!((snapshot.weight - 2.4).abs() < 1e-9);
        assert_eq!(snapshot.source_window, SourceWindow { from_seq: 20, to_seq: 30 });
    }

    proptest! {
        #[test]
        fn prop_snapshot_independent_of_projection_order(
            votes in prop::collection::vec((0u8..4, -1i64..=1, 0u32..500, 1u64..100), 1..12),
            seed in any::<u64>(),
        ) {
            let records: Vec<_> = votes
                .iter()
                .enumerate()
                .map(|(i, (voter, agreement, weight, seq))| {
                    intent(
                        &format!("i-{i}"),
                        &format!("v{voter}"),
                        Agreement::try_from(*agreement).unwrap(),
                        f64::from(*weight) / 100.0,
                        *seq,
                    )
                })
                .collect();
            let mut shuffled = records.clone();
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

            // Tallies and window converge; version counts recomputes
            let (a, b) = (project_all(&records), project_all(&shuffled));
            prop_assert_eq!((a.agree, a.disagree, a.participants), (b.agree, b.disagree, b.participants));
            prop_assert_eq!(a.weight, b.weight);
            prop_assert_eq!(a.source_window, b.source_window);
        }
    }
}
