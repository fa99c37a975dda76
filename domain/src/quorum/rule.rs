//! Selection rules for choosing a canonical candidate
//!
//! This module defines how a gathered candidate set is narrowed to one winner.

use serde::{Deserialize, Serialize};

/// Rule for picking the canonical candidate out of a gathered set
///
/// - `Hashed`: FNV-1a over the sorted candidate ids picks the index (default)
/// - `FirstById`: the lexicographically smallest candidate id wins
///
/// Both rules depend only on the set of candidate ids, never on arrival order.
///
/// # Example
///
/// ```
/// use quorum_domain::quorum::SelectionRule;
///
/// let rule: SelectionRule = "hashed".parse().unwrap();
/// assert_eq!(rule, SelectionRule::Hashed);
/// assert_eq!(rule.select_index(&["a", "b"]), rule.select_index(&["a", "b"]));
/// assert_eq!(SelectionRule::FirstById.select_index(&["a", "b"]), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// `sorted[fnv1a32(join(sorted_ids, "|")) % count]`
    #[default]
    Hashed,

    /// `sorted[0]`
    FirstById,
}

/// Separator between ids when hashing a candidate set
pub const ID_SEPARATOR: &str = "|";

impl SelectionRule {
    /// Pick an index into `sorted_ids`, which must already be sorted
    /// ascending and non-empty.
    pub fn select_index<S: AsRef<str>>(&self, sorted_ids: &[S]) -> usize {
        if sorted_ids.is_empty() {
            return 0;
        }
        match self {
            SelectionRule::Hashed => {
                let joined = sorted_ids
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join(ID_SEPARATOR);
                super::hash::fnv1a32_str(&joined) as usize % sorted_ids.len()
            }
            SelectionRule::FirstById => 0,
        }
    }

    /// Get a human-readable description of this rule
    pub fn description(&self) -> &'static str {
        match self {
            SelectionRule::Hashed => "hashed (FNV-1a over sorted candidate ids)",
            SelectionRule::FirstById => "first by id (lowest candidate id)",
        }
    }
}

impl std::fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::str::FromStr for SelectionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hashed" | "hash" | "deterministic" => Ok(SelectionRule::Hashed),
            "first_by_id" | "first" | "lowest_id" => Ok(SelectionRule::FirstById),
            _ => Err(format!(
                "Unknown selection rule: {}. Valid: hashed, first_by_id",
                s
            )),
        }
    }
}
