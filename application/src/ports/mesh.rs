//! Mesh substrate port
//!
//! Defines the interface to the replication substrate: a path-addressable
//! key/value mesh with eventual, best-effort propagation. The substrate may
//! silently drop or delay any operation, so every method here either returns
//! promptly or hands back something the caller can bound with a timeout.
//!
//! Capabilities are split in two:
//!
//! - [`MeshAdapter`]: required. One-shot reads, writes with an
//!   acknowledgement handle, and the "remote contacted" signal.
//! - [`MeshSubscribe`]: optional. Live subscriptions and per-child
//!   enumeration. Discovered once via [`MeshAdapter::subscriber`].

use crate::sync::ack::PendingAck;
use async_trait::async_trait;
use quorum_domain::MeshPath;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Explicit failure reported by the substrate
///
/// Silence is not an error; see [`AckOutcome::TimedOut`](crate::sync::ack::AckOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("Write to {path} rejected: {message}")]
    Rejected { path: String, message: String },

    #[error("Mesh unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed value at {path}: {message}")]
    Malformed { path: String, message: String },
}

impl MeshError {
    /// Whether the same operation may succeed later
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MeshError::Malformed { .. })
    }
}

/// A child value delivered by a subscription or enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEvent {
    /// Last path segment of the child
    pub key: String,
    pub value: Value,
}

/// Required substrate operations
///
/// Implementations live in the infrastructure layer.
#[async_trait]
pub trait MeshAdapter: Send + Sync {
    /// Read the value at `path` once.
    ///
    /// Reading a directory returns an object of its children. `Ok(None)`
    /// means nothing is known at `path` yet. May never resolve; callers bound
    /// it with a timeout.
    async fn once(&self, path: &MeshPath) -> Result<Option<Value>, MeshError>;

    /// Issue a write. The returned handle resolves when (and if) the
    /// substrate acknowledges it.
    fn put(&self, path: &MeshPath, value: Value) -> PendingAck;

    /// One-shot signal that a remote peer has been reached.
    ///
    /// Flips to `true` at most once and stays there.
    fn remote_contacted(&self) -> watch::Receiver<bool>;

    /// Optional subscription capability
    fn subscriber(&self) -> Option<Arc<dyn MeshSubscribe>> {
        None
    }
}

/// Optional substrate operations
///
/// Dropping the returned receiver unsubscribes.
pub trait MeshSubscribe: Send + Sync {
    /// Live updates for the children of `path`
    fn subscribe(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent>;

    /// Enumerate the children of `path` one at a time.
    ///
    /// The channel closes once the substrate has nothing more to offer,
    /// which for a real mesh may be never.
    fn iterate(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(MeshError::Unavailable("offline".into()).is_retryable());
        assert!(
            MeshError::Rejected {
                path: "a/".into(),
                message: "quota".into()
            }
            .is_retryable()
        );
        assert!(
            !MeshError::Malformed {
                path: "a/".into(),
                message: "not json".into()
            }
            .is_retryable()
        );
    }
}
