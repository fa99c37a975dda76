//! Path classification table
//!
//! Every write path is classified before a value leaves the peer. The table
//! is ordered and the first matching rule wins; a path no rule matches is
//! unclassified and must be rejected by the guard.

use super::guard::TopologyViolation;
use crate::mesh::MeshPath;
use serde::{Deserialize, Serialize};

/// Visibility class of a write path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Replicated in the clear to every peer; identifying fields are forbidden.
    Public,
    /// Replicated, but only as ciphertext carrying the encrypted marker.
    Sensitive,
    /// Never leaves this device; unchecked.
    Local,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Public => write!(f, "public"),
            Classification::Sensitive => write!(f, "sensitive"),
            Classification::Local => write!(f, "local"),
        }
    }
}

/// One segment of a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    /// `*` alone, or a prefix followed by `*` such as `~*`
    Wildcard { prefix: String },
}

impl PatternSegment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            PatternSegment::Literal(lit) => lit == segment,
            PatternSegment::Wildcard { prefix } => segment.starts_with(prefix.as_str()),
        }
    }
}

/// A path prefix pattern with at most one wildcard segment.
///
/// # Example
///
/// ```
/// use quorum_domain::visibility::PathPattern;
///
/// let pattern = PathPattern::parse("~*/hermes/outbox").unwrap();
/// assert!(pattern.matches_str("~alice.pub/hermes/outbox/msg-1"));
/// assert!(!pattern.matches_str("vh/hermes/outbox"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Parse a pattern, rejecting empty patterns and patterns with more than
    /// one wildcard segment.
    pub fn parse(pattern: &str) -> Result<Self, TopologyViolation> {
        let parsed = Self::parse_unchecked(pattern);
        let wildcards = parsed
            .segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Wildcard { .. }))
            .count();
        if parsed.segments.is_empty() || wildcards > 1 {
            return Err(TopologyViolation::InvalidPattern {
                pattern: pattern.to_string(),
            });
        }
        Ok(parsed)
    }

    fn parse_unchecked(pattern: &str) -> Self {
        let segments = MeshPath::parse(pattern)
            .segments()
            .iter()
            .map(|segment| match segment.strip_suffix('*') {
                Some(prefix) => PatternSegment::Wildcard {
                    prefix: prefix.to_string(),
                },
                None => PatternSegment::Literal(segment.clone()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Whether `path` lies at or below this pattern
    pub fn matches(&self, path: &MeshPath) -> bool {
        let segments = path.segments();
        segments.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(pattern, segment)| pattern.matches(segment))
    }

    pub fn matches_str(&self, path: &str) -> bool {
        self.matches(&MeshPath::parse(path))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// A single classification rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub pattern: PathPattern,
    pub classification: Classification,
    /// Directory paths that publish identifying fields on purpose
    pub allow_identifying: bool,
}

impl PathRule {
    pub fn new(pattern: &str, classification: Classification) -> Result<Self, TopologyViolation> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            classification,
            allow_identifying: false,
        })
    }

    /// Allow identifying field names on this (public) path
    pub fn allowing_identifying(mut self) -> Self {
        self.allow_identifying = true;
        self
    }
}

/// Ordered classification table. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityTable {
    rules: Vec<PathRule>,
}

impl VisibilityTable {
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    /// The table every peer ships with.
    pub fn standard() -> Self {
        fn rule(pattern: &str, classification: Classification) -> PathRule {
            PathRule {
                pattern: PathPattern::parse_unchecked(pattern),
                classification,
                allow_identifying: false,
            }
        }

        Self::new(vec![
            // Directory entries map published keys to their owners.
            rule("vh/directory", Classification::Public).allowing_identifying(),
            rule("vh/aggregates", Classification::Public),
            rule("vh/topics", Classification::Public),
            rule("vh/public", Classification::Public),
            rule("vh/sensitive", Classification::Sensitive),
            rule("vh/user", Classification::Sensitive),
            rule("vh/local", Classification::Local),
            rule("~*/hermes/outbox", Classification::Sensitive),
            rule("~*/hermes/inbox", Classification::Sensitive),
            rule("~*/hermes", Classification::Sensitive),
            rule("~*/docs", Classification::Sensitive),
            rule("~*/local", Classification::Local),
        ])
    }

    /// Find the first rule matching `path`.
    pub fn classify(&self, path: &MeshPath) -> Option<&PathRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }
}

impl Default for VisibilityTable {
    fn default() -> Self {
        Self::standard()
    }
}
