//! Tally, merge and materialization rules
//!
//! These are the functions every peer runs over the same inputs. Rows are
//! always visited in voter-id order so floating-point sums agree bit for bit.

use super::entities::{
    Agreement, PointAggregate, PointAggregateSnapshot, PointKey, SourceWindow, Tally, VoterPointNode,
};
use std::collections::BTreeMap;

/// Live voter rows for a point, keyed by voter id
pub type VoterRows = BTreeMap<String, VoterPointNode>;

/// Tally the rows that belong to `point_id`.
///
/// Neutral rows are skipped; only agree/disagree voters are participants and
/// only their weight is summed.
pub fn tally_rows(point_id: &str, rows: &VoterRows) -> Tally {
    rows.values()
        .filter(|row| row.point_id == point_id && row.agreement.is_participating())
        .fold(Tally::default(), |mut tally, row| {
            match row.agreement {
                Agreement::Agree => tally.agree += 1,
                _ => tally.disagree += 1,
            }
            tally.weight += row.weight;
            tally.participants += 1;
            tally
        })
}

/// Merge a (possibly stale or absent) snapshot with a (possibly partial)
/// live tally by element-wise maximum.
///
/// Both inputs can only under-count, so the maximum is the best estimate
/// and the merge is monotonic in either argument.
pub fn merge_aggregate(
    point_id: &str,
    snapshot: Option<&PointAggregateSnapshot>,
    live: &Tally,
) -> PointAggregate {
    let mut merged = PointAggregate {
        point_id: point_id.to_string(),
        agree: live.agree,
        disagree: live.disagree,
        weight: live.weight,
        participants: live.participants,
        snapshot_version: None,
    };

    if let Some(snapshot) = snapshot {
        merged.agree = merged.agree.max(snapshot.agree);
        merged.disagree = merged.disagree.max(snapshot.disagree);
        merged.weight = merged.weight.max(snapshot.weight);
        merged.participants = merged.participants.max(snapshot.participants);
        merged.snapshot_version = Some(snapshot.version);
    }

    merged
}

/// Recompute the snapshot for `key` from the full current row set.
///
/// With no contributing rows the tallies reset to zero but `version` and
/// `source_window` are carried forward from `previous` unchanged. Otherwise
/// the window spans the contributing seqs and `to_seq` never moves
/// backwards. `version` moves past the previous version on every such
/// recompute and never falls below `to_seq`, so a superseding snapshot
/// always ranks above the one it replaces.
pub fn compute_snapshot(
    key: &PointKey,
    rows: &VoterRows,
    previous: Option<&PointAggregateSnapshot>,
    computed_at: u64,
) -> PointAggregateSnapshot {
    let prev_window = previous.map(|p| p.source_window).unwrap_or_default();
    let prev_version = previous.map(|p| p.version).unwrap_or(0);

    let mut snapshot = PointAggregateSnapshot::empty(key, computed_at);

    let seqs = rows
        .values()
        .filter(|row| row.point_id == key.point_id)
        .map(|row| row.seq);
    let (min_seq, max_seq) = seqs.fold((None, None), |(lo, hi): (Option<u64>, Option<u64>), s| {
        (
            Some(lo.map_or(s, |lo| lo.min(s))),
            Some(hi.map_or(s, |hi| hi.max(s))),
        )
    });

    match (min_seq, max_seq) {
        (Some(from_seq), Some(max_seq)) => {
            let tally = tally_rows(&key.point_id, rows);
            let to_seq = max_seq.max(prev_window.to_seq);
            snapshot.agree = tally.agree;
            snapshot.disagree = tally.disagree;
            snapshot.weight = tally.weight;
            snapshot.participants = tally.participants;
            snapshot.source_window = SourceWindow { from_seq, to_seq };
            snapshot.version = prev_version.saturating_add(1).max(to_seq);
        }
        _ => {
            snapshot.source_window = prev_window;
            snapshot.version = prev_version;
        }
    }

    snapshot
}

/// Pick the more recent of two snapshots of the same point. On a tie `a`
/// is kept.
pub fn newer_snapshot<'a>(
    a: &'a PointAggregateSnapshot,
    b: &'a PointAggregateSnapshot,
) -> &'a PointAggregateSnapshot {
    let rank = |s: &PointAggregateSnapshot| (s.version, s.source_window.to_seq, s.computed_at);
    if rank(b) > rank(a) { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(point: &str, agreement: Agreement, weight: f64, seq: u64) -> VoterPointNode {
        VoterPointNode {
            point_id: point.to_string(),
            agreement,
            weight,
            updated_at: seq,
            seq,
            emitted_at: seq,
            intent_id: format!("i-{seq}"),
        }
    }

    fn key() -> PointKey {
        PointKey::new("topic", "synth", 1, "p1")
    }

    #[test]
    fn test_tally_skips_neutral_and_other_points() {
        let mut rows = VoterRows::new();
        rows.insert("a".into(), row("p1", Agreement::Agree, 0.5, 1));
        rows.insert("b".into(), row("p1", Agreement::Disagree, 1.5, 2));
        rows.insert("c".into(), row("p1", Agreement::Neutral, 9.0, 3));
        rows.insert("d".into(), row("p2", Agreement::Agree, 9.0, 4));

        let tally = tally_rows("p1", &rows);
        assert_eq!(tally.agree, 1);
        assert_eq!(tally.disagree, 1);
        assert_eq!(tally.participants, 2);
        assert!((tally.weight - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_takes_elementwise_max() {
        let mut snapshot = PointAggregateSnapshot::empty(&key(), 0);
        snapshot.agree = 3;
        snapshot.participants = 3;
        snapshot.weight = 1.0;
        snapshot.version = 7;

        let live = Tally {
            agree: 1,
            disagree: 2,
            weight: 4.0,
            participants: 3,
        };

        let merged = merge_aggregate("p1", Some(&snapshot), &live);
        assert_eq!(merged.agree, 3);
        assert_eq!(merged.disagree, 2);
        assert_eq!(merged.participants, 3);
        assert_eq!(merged.weight, 4.0);
        assert_eq!(merged.snapshot_version, Some(7));

        let live_only = merge_aggregate("p1", None, &live);
        assert_eq!(live_only.agree, 1);
        assert_eq!(live_only.snapshot_version, None);
    }

    #[test]
    fn test_compute_snapshot_window_and_version() {
        let mut rows = VoterRows::new();
        rows.insert("a".into(), row("p1", Agreement::Disagree, 1.3, 30));
        rows.insert("b".into(), row("p1", Agreement::Agree, 1.1, 20));

        let snapshot = compute_snapshot(&key(), &rows, None, 99);
        assert_eq!(snapshot.agree, 1);
        assert_eq!(snapshot.disagree, 1);
        assert_eq!(snapshot.participants, 2);
        assert!((snapshot.weight - 2.4).abs() < 1e-9);
        assert_eq!(snapshot.source_window, SourceWindow { from_seq: 20, to_seq: 30 });
        assert_eq!(snapshot.version, 30);
        assert_eq!(snapshot.computed_at, 99);
    }

    #[test]
    fn test_empty_recompute_carries_forward_version_and_window() {
        let mut previous = PointAggregateSnapshot::empty(&key(), 0);
        previous.agree = 2;
        previous.participants = 2;
        previous.weight = 3.0;
        previous.version = 42;
        previous.source_window = SourceWindow { from_seq: 10, to_seq: 42 };

        let snapshot = compute_snapshot(&key(), &VoterRows::new(), Some(&previous), 5);
        assert_eq!(snapshot.agree, 0);
        assert_eq!(snapshot.participants, 0);
        assert_eq!(snapshot.weight, 0.0);
        assert_eq!(snapshot.version, 42);
        assert_eq!(snapshot.source_window, previous.source_window);
    }

    #[test]
    fn test_to_seq_never_decreases() {
        let mut previous = PointAggregateSnapshot::empty(&key(), 0);
        previous.version = 50;
        previous.source_window = SourceWindow { from_seq: 40, to_seq: 50 };

        let mut rows = VoterRows::new();
        rows.insert("a".into(), row("p1", Agreement::Agree, 1.0, 12));

        let snapshot = compute_snapshot(&key(), &rows, Some(&previous), 1);
        assert_eq!(snapshot.source_window, SourceWindow { from_seq: 12, to_seq: 50 });
        assert_eq!(snapshot.version, 51);
    }

    #[test]
    fn test_lower_seq_voter_joining_outranks_previous() {
        let mut rows = VoterRows::new();
        rows.insert("a".into(), row("p1", Agreement::Disagree, 1.3, 30));
        let first = compute_snapshot(&key(), &rows, None, 7);

        // Same millisecond, and the new row does not move to_seq
        rows.insert("b".into(), row("p1", Agreement::Agree, 1.1, 20));
        let second = compute_snapshot(&key(), &rows, Some(&first), 7);

        assert_eq!(second.source_window.to_seq, first.source_window.to_seq);
        assert!(second.version > first.version);
        assert_eq!(newer_snapshot(&first, &second).agree, 1);
        assert_eq!(newer_snapshot(&second, &first).agree, 1);
    }

    #[test]
    fn test_neutral_rows_still_contribute_to_window() {
        let mut rows = VoterRows::new();
        rows.insert("a".into(), row("p1", Agreement::Neutral, 1.0, 8));

        let snapshot = compute_snapshot(&key(), &rows, None, 1);
        assert_eq!(snapshot.participants, 0);
        assert_eq!(snapshot.source_window, SourceWindow { from_seq: 8, to_seq: 8 });
        assert_eq!(snapshot.version, 8);
    }

    #[test]
    fn test_newer_snapshot() {
        let mut a = PointAggregateSnapshot::empty(&key(), 10);
        let mut b = PointAggregateSnapshot::empty(&key(), 5);
        a.version = 1;
        b.version = 2;
        assert_eq!(newer_snapshot(&a, &b).version, 2);
        b.version = 1;
        assert_eq!(newer_snapshot(&a, &b).computed_at, 10);
    }
}
