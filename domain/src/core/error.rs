//! Domain error types

use crate::quorum::{GatherRejection, SelectionError};
use crate::visibility::TopologyViolation;
use thiserror::Error;

/// A value failed shape validation or carried a forbidden field.
///
/// Always fatal: the caller built a bad value and retrying cannot help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' {message}")]
    Field { field: &'static str, message: String },

    #[error("Forbidden field '{key}' in payload")]
    ForbiddenKey { key: String },

    #[error("Payload could not be encoded: {0}")]
    Encoding(String),
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field,
            message: message.into(),
        }
    }
}

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Topology(#[from] TopologyViolation),

    #[error("Candidate rejected: {0}")]
    Gather(#[from] GatherRejection),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Invalid gatherer config: {0}")]
    InvalidConfig(String),
}

impl DomainError {
    /// Every domain error is a caller bug or a policy decision; none are retried.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
