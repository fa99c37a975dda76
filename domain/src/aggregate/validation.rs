//! Shape checks for aggregate values
//!
//! Failures here are fatal: a malformed node or snapshot is a caller bug and
//! is never retried.

use super::entities::{PointAggregateSnapshot, PointKey, VoterPointNode};
use crate::core::error::ValidationError;
use crate::visibility::{find_key, is_identifying_key};
use serde::Serialize;

/// Keys that must never appear in a published aggregate value
const PROOF_KEYS: &[&str] = &["proof_ref", "constituency_proof"];

fn is_forbidden_aggregate_key(key: &str) -> bool {
    is_identifying_key(key) || PROOF_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

/// Ids become path segments, so they must be non-empty and slash-free.
pub fn validate_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::field(field, "must not be empty"));
    }
    if value.contains('/') {
        return Err(ValidationError::field(field, "must not contain '/'"));
    }
    Ok(())
}

/// Largest weight a single vote may carry. Keeps point totals finite.
pub const MAX_WEIGHT: f64 = 1e6;

/// A single voter's weight: finite, in `0..=MAX_WEIGHT`.
pub fn validate_weight(weight: f64) -> Result<(), ValidationError> {
    if !(0.0..=MAX_WEIGHT).contains(&weight) {
        return Err(ValidationError::field(
            "weight",
            format!("must be between 0 and {MAX_WEIGHT} (got {weight})"),
        ));
    }
    Ok(())
}

/// A summed weight: finite and >= 0.
fn validate_total_weight(weight: f64) -> Result<(), ValidationError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ValidationError::field(
            "weight",
            format!("must be finite and >= 0 (got {weight})"),
        ));
    }
    Ok(())
}

pub fn validate_point_key(key: &PointKey) -> Result<(), ValidationError> {
    validate_id("topic_id", &key.topic_id)?;
    validate_id("synthesis_id", &key.synthesis_id)?;
    validate_id("point_id", &key.point_id)
}

pub fn validate_voter_node(
    key: &PointKey,
    voter_id: &str,
    node: &VoterPointNode,
) -> Result<(), ValidationError> {
    validate_point_key(key)?;
    validate_id("voter_id", voter_id)?;
    if node.point_id != key.point_id {
        return Err(ValidationError::field(
            "point_id",
            format!("'{}' does not match target point '{}'", node.point_id, key.point_id),
        ));
    }
    validate_weight(node.weight)
}

pub fn validate_snapshot(snapshot: &PointAggregateSnapshot) -> Result<(), ValidationError> {
    validate_point_key(&snapshot.key())?;
    validate_total_weight(snapshot.weight)?;
    if snapshot.participants != snapshot.agree + snapshot.disagree {
        return Err(ValidationError::field(
            "participants",
            format!(
                "must equal agree + disagree ({} != {} + {})",
                snapshot.participants, snapshot.agree, snapshot.disagree
            ),
        ));
    }
    if snapshot.source_window.from_seq > snapshot.source_window.to_seq {
        return Err(ValidationError::field(
            "source_window",
            format!(
                "from_seq {} exceeds to_seq {}",
                snapshot.source_window.from_seq, snapshot.source_window.to_seq
            ),
        ));
    }
    Ok(())
}

/// Encode `value` for publication, rejecting identifying and proof keys.
pub fn to_publishable<T: Serialize>(value: &T) -> Result<serde_json::Value, ValidationError> {
    let encoded =
        serde_json::to_value(value).map_err(|e| ValidationError::Encoding(e.to_string()))?;
    if let Some(key) = find_key(&encoded, is_forbidden_aggregate_key) {
        return Err(ValidationError::ForbiddenKey { key });
    }
    Ok(encoded)
}
