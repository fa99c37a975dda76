//! Guarded sync primitive
//!
//! [`GuardedMesh`] wraps a raw [`MeshAdapter`]. Every write through it is
//! first checked by the visibility guard against the full target path and
//! then held until the substrate reports a remote contact (bounded by
//! [`SyncConfig::remote_barrier_timeout`]). Reads and subscriptions pass
//! straight through.
//!
//! [`GuardedNode`] is a lazily built handle on one path. Building it costs
//! nothing and touches no network.

use super::ack::PendingAck;
use super::warn::RateLimitedWarning;
use crate::config::SyncConfig;
use crate::ports::mesh::{MeshAdapter, MeshError, MeshEvent, MeshSubscribe};
use quorum_domain::{Classification, MeshPath, TopologyViolation, VisibilityTable};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Failure of a guarded operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    Topology(#[from] TopologyViolation),

    #[error(transparent)]
    Substrate(#[from] MeshError),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Topology(_) => false,
            SyncError::Substrate(e) => e.is_retryable(),
        }
    }
}

/// Mesh handle whose writes pass the visibility guard and the remote barrier
#[derive(Clone)]
pub struct GuardedMesh {
    adapter: Arc<dyn MeshAdapter>,
    subscriber: Option<Arc<dyn MeshSubscribe>>,
    table: Arc<VisibilityTable>,
    config: SyncConfig,
    barrier_warning: Arc<RateLimitedWarning>,
}

impl GuardedMesh {
    /// Wrap `adapter` with the standard visibility table.
    pub fn new(adapter: Arc<dyn MeshAdapter>, config: SyncConfig) -> Self {
        let subscriber = adapter.subscriber();
        let barrier_warning = Arc::new(RateLimitedWarning::new(config.warn_interval));
        Self {
            adapter,
            subscriber,
            table: Arc::new(VisibilityTable::standard()),
            config,
            barrier_warning,
        }
    }

    pub fn with_table(mut self, table: VisibilityTable) -> Self {
        self.table = Arc::new(table);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the substrate offers subscribe/iterate
    pub fn supports_subscribe(&self) -> bool {
        self.subscriber.is_some()
    }

    /// Handle on the mesh root
    pub fn root(&self) -> GuardedNode {
        self.node(MeshPath::root())
    }

    /// Handle on `path`
    pub fn node(&self, path: MeshPath) -> GuardedNode {
        GuardedNode {
            mesh: self.clone(),
            path,
        }
    }

    /// Read `path` once. Unbounded; callers apply their own timeout.
    pub async fn once(&self, path: &MeshPath) -> Result<Option<Value>, SyncError> {
        Ok(self.adapter.once(path).await?)
    }

    /// Guard, wait for the barrier, then issue the write.
    ///
    /// A topology violation fails before anything is sent. The returned
    /// handle settles on the substrate's ack.
    pub async fn put(&self, path: &MeshPath, value: Value) -> Result<PendingAck, SyncError> {
        let classification = self.table.validate_write(path, &value)?;
        self.wait_for_remote(path, classification).await;
        debug!(path = %path, %classification, "Issuing guarded write");
        Ok(self.adapter.put(path, value))
    }

    pub fn subscribe(&self, path: &MeshPath) -> Option<mpsc::UnboundedReceiver<MeshEvent>> {
        self.subscriber.as_ref().map(|s| s.subscribe(path))
    }

    pub fn iterate(&self, path: &MeshPath) -> Option<mpsc::UnboundedReceiver<MeshEvent>> {
        self.subscriber.as_ref().map(|s| s.iterate(path))
    }

    async fn wait_for_remote(&self, path: &MeshPath, classification: Classification) {
        let mut contacted = self.adapter.remote_contacted();
        if *contacted.borrow() {
            return;
        }

        let timeout = self.config.remote_barrier_timeout;
        let reached = tokio::time::timeout(timeout, contacted.wait_for(|c| *c)).await;
        if !matches!(reached, Ok(Ok(_)))
            && let Some(suppressed) = self.barrier_warning.check()
        {
            warn!(
                path = %path,
                %classification,
                timeout_ms = timeout.as_millis() as u64,
                suppressed,
                "No remote peer contacted before write; proceeding anyway"
            );
        }
    }
}

impl std::fmt::Debug for GuardedMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedMesh")
            .field("supports_subscribe", &self.supports_subscribe())
            .field("config", &self.config)
            .finish()
    }
}

/// Lazily built handle on one mesh path
#[derive(Clone, Debug)]
pub struct GuardedNode {
    mesh: GuardedMesh,
    path: MeshPath,
}

impl GuardedNode {
    /// Descend to `key`. No network access.
    pub fn get(&self, key: impl AsRef<str>) -> GuardedNode {
        GuardedNode {
            mesh: self.mesh.clone(),
            path: self.path.child(key),
        }
    }

    pub fn path(&self) -> &MeshPath {
        &self.path
    }

    pub async fn once(&self) -> Result<Option<Value>, SyncError> {
        self.mesh.once(&self.path).await
    }

    pub async fn put(&self, value: Value) -> Result<PendingAck, SyncError> {
        self.mesh.put(&self.path, value).await
    }

    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<MeshEvent>> {
        self.mesh.subscribe(&self.path)
    }

    pub fn iterate(&self) -> Option<mpsc::UnboundedReceiver<MeshEvent>> {
        self.mesh.iterate(&self.path)
    }
}
