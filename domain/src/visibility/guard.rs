//! Write-path guard
//!
//! `validate_write` is the single check every outgoing value passes. It is
//! pure and synchronous so it can run inside any write path without I/O.

use super::classification::{Classification, VisibilityTable};
use crate::mesh::MeshPath;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Key marking a payload as ciphertext
pub const ENCRYPTED_MARKER: &str = "__encrypted";

/// Exact key names that identify a person
const IDENTIFYING_KEYS: &[&str] = &[
    "nullifier",
    "district_hash",
    "email",
    "wallet",
    "address",
    "oauth",
    "bearer",
];

const IDENTIFYING_SUFFIXES: &[&str] = &["_token"];
const IDENTIFYING_PREFIXES: &[&str] = &["identity_"];

static STANDARD_TABLE: LazyLock<VisibilityTable> = LazyLock::new(VisibilityTable::standard);

/// A write would cross a visibility boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyViolation {
    #[error("Topology violation: no classification for path '{path}'")]
    Unclassified { path: String },

    #[error("Topology violation: identifying field '{field}' on public path '{path}'")]
    IdentifyingField { path: String, field: String },

    #[error("Topology violation: unencrypted payload on sensitive path '{path}'")]
    Unencrypted { path: String },

    #[error("Topology violation: invalid path pattern '{pattern}'")]
    InvalidPattern { pattern: String },
}

/// Whether a key name matches one of the identifying terms.
///
/// Matching is case-insensitive.
pub fn is_identifying_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    IDENTIFYING_KEYS.contains(&key.as_str())
        || IDENTIFYING_SUFFIXES.iter().any(|s| key.ends_with(s))
        || IDENTIFYING_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Walk `payload` (objects and arrays, any depth) and return the first key
/// for which `forbidden` holds.
///
/// `serde_json::Value` is an owned tree, so the walk needs no cycle tracking;
/// it is iterative so deeply nested payloads cannot exhaust the stack.
pub fn find_key(payload: &Value, forbidden: impl Fn(&str) -> bool) -> Option<String> {
    let mut stack = vec![payload];
    while let Some(value) = stack.pop() {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    if forbidden(key) {
                        return Some(key.clone());
                    }
                    stack.push(child);
                }
            }
            Value::Array(items) => stack.extend(items.iter()),
            _ => {}
        }
    }
    None
}

/// Whether `payload` carries the explicit encrypted marker.
pub fn is_encrypted(payload: &Value) -> bool {
    payload
        .get(ENCRYPTED_MARKER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

impl VisibilityTable {
    /// Check a write against this table, returning the path's classification.
    pub fn validate_write(
        &self,
        path: &MeshPath,
        payload: &Value,
    ) -> Result<Classification, TopologyViolation> {
        let rule = self
            .classify(path)
            .ok_or_else(|| TopologyViolation::Unclassified {
                path: path.render(),
            })?;

        match rule.classification {
            Classification::Public => {
                if !rule.allow_identifying
                    && let Some(field) = find_key(payload, is_identifying_key)
                {
                    return Err(TopologyViolation::IdentifyingField {
                        path: path.render(),
                        field,
                    });
                }
            }
            Classification::Sensitive => {
                if !is_encrypted(payload) {
                    return Err(TopologyViolation::Unencrypted {
                        path: path.render(),
                    });
                }
            }
            Classification::Local => {}
        }

        Ok(rule.classification)
    }
}

/// Check a write against the standard table.
///
/// # Example
///
/// ```
/// use quorum_domain::visibility::validate_write;
/// use serde_json::json;
///
/// assert!(validate_write("vh/public/x", &json!({"nullifier": "n"})).is_err());
/// assert!(validate_write("vh/sensitive/x", &json!({"__encrypted": true, "ciphertext": "..."})).is_ok());
/// ```
pub fn validate_write(path: &str, payload: &Value) -> Result<Classification, TopologyViolation> {
    STANDARD_TABLE.validate_write(&MeshPath::parse(path), payload)
}
