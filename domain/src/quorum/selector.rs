//! Quorum selection
//!
//! Picks one canonical candidate out of a gathered set and measures how much
//! the set disagrees. Every peer holding the same candidate set computes the
//! same winner, whatever order the candidates arrived in.

use super::candidate::GatheredCandidate;
use super::gatherer::GathererState;
use super::rule::SelectionRule;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Selection cannot proceed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Cannot select from an empty candidate set")]
    NoCandidates,
}

/// How much a candidate set disagrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceMetrics {
    /// Fraction of candidate pairs whose divergence-hint sets differ
    pub disagreement_score: f64,
    /// Normalized Shannon entropy of the provider distribution, in `[0, 1]`
    pub source_dispersion: f64,
    pub candidate_count: usize,
}

/// Candidates contributed by one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCount {
    pub provider_id: String,
    pub count: usize,
}

/// Outcome of a selection. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: GatheredCandidate,
    /// Index of `selected` within `sorted_candidate_ids`
    pub selection_index: usize,
    pub sorted_candidate_ids: Vec<String>,
    pub divergence: DivergenceMetrics,
    /// Sorted by provider id
    pub provider_mix: Vec<ProviderCount>,
}

/// Select with the default [`SelectionRule::Hashed`] rule.
///
/// # Example
///
/// ```
/// use quorum_domain::quorum::{select_candidate, GatheredCandidate, ProviderInfo, ProviderKind};
///
/// let provider = ProviderInfo::new("p", "m", ProviderKind::Local);
/// let a = GatheredCandidate::new("c-0", "x", provider.clone(), 0);
/// let b = GatheredCandidate::new("c-1", "y", provider, 0);
///
/// let forward = select_candidate(&[a.clone(), b.clone()]).unwrap();
/// let reverse = select_candidate(&[b, a]).unwrap();
/// assert_eq!(forward.selected.candidate_id, reverse.selected.candidate_id);
/// ```
pub fn select_candidate(candidates: &[GatheredCandidate]) -> Result<SelectionResult, SelectionError> {
    select_with_rule(candidates, SelectionRule::Hashed)
}

/// Select the canonical candidate under `rule`.
pub fn select_with_rule(
    candidates: &[GatheredCandidate],
    rule: SelectionRule,
) -> Result<SelectionResult, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    let mut sorted: Vec<&GatheredCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));

    let sorted_candidate_ids: Vec<String> =
        sorted.iter().map(|c| c.candidate_id.clone()).collect();
    let selection_index = rule.select_index(&sorted_candidate_ids);

    Ok(SelectionResult {
        selected: sorted[selection_index].clone(),
        selection_index,
        sorted_candidate_ids,
        divergence: DivergenceMetrics {
            disagreement_score: disagreement_score(&sorted),
            source_dispersion: source_dispersion(&sorted),
            candidate_count: sorted.len(),
        },
        provider_mix: provider_mix(&sorted),
    })
}

/// Select from a gatherer using its configured rule.
pub fn select_from_gatherer(state: &GathererState) -> Result<SelectionResult, SelectionError> {
    select_with_rule(&state.candidates, state.config.selection_rule)
}

fn disagreement_score(candidates: &[&GatheredCandidate]) -> f64 {
    if candidates.len() <= 1 {
        return 0.0;
    }
    let hint_sets: Vec<BTreeSet<&str>> = candidates
        .iter()
        .map(|c| c.divergence_hints.iter().map(String::as_str).collect())
        .collect();

    let mut pairs = 0usize;
    let mut differing = 0usize;
    for (i, left) in hint_sets.iter().enumerate() {
        for right in &hint_sets[i + 1..] {
            pairs += 1;
            if left != right {
                differing += 1;
            }
        }
    }
    differing as f64 / pairs as f64
}

fn provider_counts<'a>(candidates: &[&'a GatheredCandidate]) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for candidate in candidates {
        *counts
            .entry(candidate.provider.provider_id.as_str())
            .or_insert(0) += 1;
    }
    counts
}

fn source_dispersion(candidates: &[&GatheredCandidate]) -> f64 {
    let counts = provider_counts(candidates);
    if candidates.len() <= 1 || counts.len() <= 1 {
        return 0.0;
    }
    let total = candidates.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.ln()
        })
        .sum();
    (entropy / (counts.len() as f64).ln()).clamp(0.0, 1.0)
}

fn provider_mix(candidates: &[&GatheredCandidate]) -> Vec<ProviderCount> {
    provider_counts(candidates)
        .into_iter()
        .map(|(provider_id, count)| ProviderCount {
            provider_id: provider_id.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::candidate::{ProviderInfo, ProviderKind};
    use crate::quorum::gatherer::GathererConfig;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn candidate(id: &str, provider: &str, hints: &[&str]) -> GatheredCandidate {
        GatheredCandidate::new(
            id,
            format!("summary of {id}"),
            ProviderInfo::new(provider, "model", ProviderKind::Remote),
            0,
        )
        .with_divergence_hints(hints.iter().copied())
    }

    fn pool() -> Vec<GatheredCandidate> {
        vec![
            candidate("c-3", "openai", &["cost"]),
            candidate("c-0", "local", &[]),
            candidate("c-7", "anthropic", &["cost", "timeline"]),
            candidate("c-1", "local", &["cost"]),
            candidate("c-5", "openai", &[]),
        ]
    }

    #[test]
    fn test_empty_set_fails() {
        assert_eq!(select_candidate(&[]), Err(SelectionError::NoCandidates));
    }

    #[test]
    fn test_winner_is_hash_of_sorted_ids() {
        let result = select_candidate(&[
            candidate("c-2", "p", &[]),
            candidate("c-0", "p", &[]),
            candidate("c-1", "p", &[]),
        ])
        .unwrap();

        assert_eq!(result.sorted_candidate_ids, ["c-0", "c-1", "c-2"]);
        // fnv1a32("c-0|c-1|c-2") % 3 == 2
        assert_eq!(result.selection_index, 2);
        assert_eq!(result.selected.candidate_id, "c-2");
    }

    #[test]
    fn test_selection_independent_of_order_over_random_shuffles() {
        let candidates = pool();
        let expected = select_candidate(&candidates).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let mut shuffled = candidates.clone();
            shuffled.shuffle(&mut rng);
            let result = select_candidate(&shuffled).unwrap();
            assert_eq!(result.selected.candidate_id, expected.selected.candidate_id);
            assert_eq!(result.sorted_candidate_ids, expected.sorted_candidate_ids);
            assert_eq!(result.divergence, expected.divergence);
            assert_eq!(result.provider_mix, expected.provider_mix);
        }
    }

    proptest! {
        #[test]
        fn prop_selection_is_permutation_invariant(
            ids in prop::collection::btree_set("[a-z0-9-]{1,8}", 1..12),
            seed in any::<u64>(),
        ) {
            let candidates: Vec<_> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| candidate(id, if i % 2 == 0 { "a" } else { "b" }, &[]))
                .collect();
            let mut shuffled = candidates.clone();
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

            let left = select_candidate(&candidates).unwrap();
            let right = select_candidate(&shuffled).unwrap();
            prop_assert_eq!(left.selected.candidate_id, right.selected.candidate_id);
            prop_assert!(left.divergence.source_dispersion <= 1.0);
        }
    }

    #[test]
    fn test_single_candidate_metrics_are_zero() {
        let result = select_candidate(&[candidate("c-0", "local", &["x"])]).unwrap();
        assert_eq!(result.divergence.disagreement_score, 0.0);
        assert_eq!(result.divergence.source_dispersion, 0.0);
        assert_eq!(result.divergence.candidate_count, 1);
    }

    #[test]
    fn test_disagreement_score() {
        // Hint sets: {cost}, {cost}, {} -> 2 of 3 pairs differ
        let result = select_candidate(&[
            candidate("a", "p", &["cost"]),
            candidate("b", "p", &["cost"]),
            candidate("c", "p", &[]),
        ])
        .unwrap();
        assert!((result.divergence.disagreement_score - 2.0 / 3.0).abs() < 1e-12);

        // Hint order and duplicates do not matter
        let same = select_candidate(&[
            candidate("a", "p", &["x", "y"]),
            candidate("b", "p", &["y", "x", "x"]),
        ])
        .unwrap();
        assert_eq!(same.divergence.disagreement_score, 0.0);
    }

    #[test]
    fn test_source_dispersion() {
        let single_provider = select_candidate(&[
            candidate("a", "p", &[]),
            candidate("b", "p", &[]),
        ])
        .unwrap();
        assert_eq!(single_provider.divergence.source_dispersion, 0.0);

        let uniform = select_candidate(&[
            candidate("a", "p1", &[]),
            candidate("b", "p2", &[]),
        ])
        .unwrap();
        assert!((uniform.divergence.source_dispersion - 1.0).abs() < 1e-12);

        let skewed = select_candidate(&[
            candidate("a", "p1", &[]),
            candidate("b", "p1", &[]),
            candidate("c", "p1", &[]),
            candidate("d", "p2", &[]),
        ])
        .unwrap();
        let d = skewed.divergence.source_dispersion;
        assert!(d > 0.0 && d < 1.0, "{d}");
    }

    #[test]
    fn test_provider_mix_sorted_by_provider() {
        let result = select_candidate(&pool()).unwrap();
        let mix: Vec<_> = result
            .provider_mix
            .iter()
            .map(|p| (p.provider_id.as_str(), p.count))
            .collect();
        assert_eq!(mix, [("anthropic", 1), ("local", 2), ("openai", 2)]);
    }

    #[test]
    fn test_select_from_gatherer_uses_configured_rule() {
        let config = GathererConfig::default()
            .with_quorum_size(5)
            .with_selection_rule(SelectionRule::FirstById);
        let mut state = GathererState::create("topic", 1, config, 0).unwrap();
        for c in pool() {
            state = state.add_candidate("topic", 1, c, 1).unwrap().state;
        }

        let result = select_from_gatherer(&state).unwrap();
        assert_eq!(result.selected.candidate_id, "c-0");
        assert_eq!(result.selection_index, 0);

        let empty = GathererState::create("topic", 1, GathererConfig::default(), 0).unwrap();
        assert!(select_from_gatherer(&empty).is_err());
    }
}
