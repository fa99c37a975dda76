//! Configuration issues
//!
//! Configuration is loaded in the infrastructure layer, but what counts as a
//! broken value is a domain decision. Issues are collected, not thrown, so a
//! caller can report every problem at once.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A duration that must be positive is zero.
    ZeroDuration { field: String },
    /// A count that must be positive is zero.
    ZeroValue { field: String },
    /// A string field holds an unknown enum value.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn zero_duration(field: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: ConfigIssueCode::ZeroDuration {
                field: field.to_string(),
            },
            message: format!("{field}: must be greater than 0 ms"),
        }
    }

    pub fn zero_value(field: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: ConfigIssueCode::ZeroValue {
                field: field.to_string(),
            },
            message: format!("{field}: must be at least 1"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_duration_issue() {
        let issue = ConfigIssue::zero_duration("mesh.barrier_timeout_ms");
        assert!(issue.is_error());
        assert!(issue.message.contains("mesh.barrier_timeout_ms"));
        assert_eq!(
            issue.code,
            ConfigIssueCode::ZeroDuration {
                field: "mesh.barrier_timeout_ms".to_string()
            }
        );
    }

    #[test]
    fn test_zero_value_issue() {
        let issue = ConfigIssue::zero_value("gather.quorum_size");
        assert!(issue.message.ends_with("must be at least 1"));
    }
}
