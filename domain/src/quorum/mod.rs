//! Quorum selection domain
//!
//! Several peers independently ask AI providers for a synthesis of the same
//! topic. This module decides which of those candidates every peer treats as
//! canonical, without a coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Candidate flow                                                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Gatherer (gatherer.rs)                                    │  │
//! │  │  - collects candidates until quorum or timeout            │  │
//! │  │  - rejects mismatched / duplicate / late submissions      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          ↓                                       │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  Selector (selector.rs)                                    │  │
//! │  │  - sort ids, FNV-1a the joined ids, pick index            │  │
//! │  │  - divergence and provider-mix metrics                    │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both stages are pure: no I/O, no clocks (callers pass `now`), no retries.

pub mod candidate;
pub mod gatherer;
pub mod hash;
pub mod rule;
pub mod selector;

// Re-export main types
pub use candidate::{Frame, GatheredCandidate, ProviderInfo, ProviderKind};
pub use gatherer::{
    Accepted, GatherRejection, GatherStatus, GathererConfig, GathererState, QuorumStatus,
};
pub use hash::{fnv1a32, fnv1a32_str};
pub use rule::SelectionRule;
pub use selector::{
    DivergenceMetrics, ProviderCount, SelectionError, SelectionResult, select_candidate,
    select_from_gatherer, select_with_rule,
};
