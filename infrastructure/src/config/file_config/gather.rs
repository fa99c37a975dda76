//! Candidate gathering configuration from TOML (`[gather]` section)
//!
//! ```toml
//! [gather]
//! quorum_size = 3
//! candidate_timeout_ms = 30000
//! selection_rule = "hashed"     # or "first_by_id"
//! ```

use quorum_domain::{ConfigIssue, ConfigIssueCode, GathererConfig, SelectionRule, Severity};
use serde::{Deserialize, Serialize};

/// Raw `[gather]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGatherConfig {
    pub quorum_size: usize,
    pub candidate_timeout_ms: u64,
    pub selection_rule: String,
}

impl Default for FileGatherConfig {
    fn default() -> Self {
        Self {
            quorum_size: 3,
            candidate_timeout_ms: 30_000,
            selection_rule: "hashed".to_string(),
        }
    }
}

impl FileGatherConfig {
    /// Parse the selection rule, falling back to the default on an unknown
    /// value.
    pub fn parse_selection_rule(&self) -> (SelectionRule, Option<ConfigIssue>) {
        match self.selection_rule.parse() {
            Ok(rule) => (rule, None),
            Err(_) => (
                SelectionRule::default(),
                Some(ConfigIssue {
                    severity: Severity::Warning,
                    code: ConfigIssueCode::InvalidEnumValue {
                        field: "gather.selection_rule".to_string(),
                        value: self.selection_rule.clone(),
                        valid_values: vec!["hashed".to_string(), "first_by_id".to_string()],
                    },
                    message: format!(
                        "gather.selection_rule: unknown value '{}', falling back to 'hashed'",
                        self.selection_rule
                    ),
                }),
            ),
        }
    }

    pub fn to_gatherer_config(&self) -> GathererConfig {
        GathererConfig::default()
            .with_quorum_size(self.quorum_size)
            .with_candidate_timeout_ms(self.candidate_timeout_ms)
            .with_selection_rule(self.parse_selection_rule().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_rule() {
        let config = FileGatherConfig {
            selection_rule: "first-by-id".to_string(),
            ..Default::default()
        };
        let (rule, issue) = config.parse_selection_rule();
        assert_eq!(rule, SelectionRule::FirstById);
        assert!(issue.is_none());

        let config = FileGatherConfig {
            selection_rule: "random".to_string(),
            ..Default::default()
        };
        let (rule, issue) = config.parse_selection_rule();
        assert_eq!(rule, SelectionRule::Hashed);
        let issue = issue.unwrap();
        assert!(!issue.is_error());
        assert!(issue.message.contains("random"));
    }

    #[test]
    fn test_to_gatherer_config() {
        let config = FileGatherConfig {
            quorum_size: 2,
            ..Default::default()
        }
        .to_gatherer_config();
        assert_eq!(config.quorum_size, 2);
        assert_eq!(config.candidate_timeout_ms, 30_000);
    }
}
