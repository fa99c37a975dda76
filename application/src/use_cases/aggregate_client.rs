//! Aggregate client
//!
//! Reads and writes point aggregates over a [`GuardedMesh`].
//!
//! # Reads
//!
//! [`AggregateClient::read_aggregates`] fetches the materialized snapshot
//! and fans in the live voter rows concurrently, then merges the two by
//! element-wise maximum. Concurrent reads of the same point share one
//! in-flight request.
//!
//! # Writes
//!
//! Voter nodes and snapshots are validated, scrubbed of forbidden keys and
//! written through the guard. An acknowledgement or an expired ack window
//! both count as success; only an explicit substrate error fails.
//!
//! # Lifecycle
//!
//! The snapshot cache and in-flight map belong to the client value (and its
//! clones). [`AggregateClient::reset`] clears both; dropping the last clone
//! releases them. Two independent clients never share state.

use crate::config::AggregateConfig;
use crate::ports::mesh::{MeshError, MeshEvent};
use crate::sync::ack::AckOutcome;
use crate::sync::guarded::{GuardedMesh, SyncError};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use quorum_domain::aggregate::paths::{snapshot_path, voter_node_path, voters_path};
use quorum_domain::aggregate::{newer_snapshot, tally_rows, to_publishable};
use quorum_domain::{
    MeshPath, PointAggregate, PointAggregateSnapshot, PointKey, TopologyViolation,
    ValidationError, VoterPointNode, VoterRows, merge_aggregate,
};
use quorum_domain::aggregate::validation::{
    validate_point_key, validate_snapshot, validate_voter_node,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors from aggregate reads and writes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("Invalid aggregate data: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Topology(#[from] TopologyViolation),

    #[error("Substrate error: {0}")]
    Substrate(#[from] MeshError),

    #[error("No acknowledgement for {path} within {timeout_ms}ms")]
    AckTimeout { path: String, timeout_ms: u64 },
}

impl AggregateError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Validation and topology failures are caller bugs and never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            AggregateError::Validation(_) | AggregateError::Topology(_) => false,
            AggregateError::Substrate(e) => e.is_retryable(),
            AggregateError::AckTimeout { .. } => true,
        }
    }
}

impl From<SyncError> for AggregateError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Topology(v) => AggregateError::Topology(v),
            SyncError::Substrate(e) => AggregateError::Substrate(e),
        }
    }
}

type AggregateRead = Shared<BoxFuture<'static, Result<PointAggregate, AggregateError>>>;

/// Bounded map of the newest snapshot seen per point
#[derive(Debug)]
struct SnapshotCache {
    capacity: usize,
    entries: HashMap<PointKey, PointAggregateSnapshot>,
    order: VecDeque<PointKey>,
}

impl SnapshotCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &PointKey) -> Option<&PointAggregateSnapshot> {
        self.entries.get(key)
    }

    /// Keep whichever of the cached and offered snapshot is newer and
    /// return it. With `wins_ties` an offered snapshot also replaces a cached
    /// one of equal rank.
    fn offer(&mut self, snapshot: PointAggregateSnapshot, wins_ties: bool) -> PointAggregateSnapshot {
        let key = snapshot.key();
        let best = match self.entries.get(&key) {
            Some(cached) if wins_ties => newer_snapshot(&snapshot, cached).clone(),
            Some(cached) => newer_snapshot(cached, &snapshot).clone(),
            None => snapshot,
        };
        if self.capacity == 0 {
            return best;
        }
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                }
            }
        }
        self.entries.insert(key, best.clone());
        best
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

struct ClientState {
    snapshots: Mutex<SnapshotCache>,
    /// In-flight reads tagged with the id of the read that registered them
    in_flight: Mutex<HashMap<PointKey, (u64, AggregateRead)>>,
    next_read_id: AtomicU64,
}

/// Client for the aggregate store of one mesh
#[derive(Clone)]
pub struct AggregateClient {
    mesh: GuardedMesh,
    config: AggregateConfig,
    state: Arc<ClientState>,
}

impl AggregateClient {
    pub fn new(mesh: GuardedMesh, config: AggregateConfig) -> Self {
        let state = ClientState {
            snapshots: Mutex::new(SnapshotCache::new(config.snapshot_cache_capacity)),
            in_flight: Mutex::new(HashMap::new()),
            next_read_id: AtomicU64::new(0),
        };
        Self {
            mesh,
            config,
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Drop cached snapshots and forget in-flight reads.
    ///
    /// Readers already attached to an in-flight read still get its result.
    pub fn reset(&self) {
        self.state
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.state
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Newest snapshot this client has seen for `key`
    pub fn cached_snapshot(&self, key: &PointKey) -> Option<PointAggregateSnapshot> {
        self.state
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn in_flight_count(&self) -> usize {
        self.state
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ==================== Reads ====================

    /// Current tally of a point: snapshot merged with live rows.
    pub async fn read_aggregates(&self, key: &PointKey) -> Result<PointAggregate, AggregateError> {
        validate_point_key(key)?;

        let read = {
            let mut in_flight = self
                .state
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(key) {
                Some((_, existing)) => {
                    debug!(point = %key, "Joining in-flight aggregate read");
                    existing.clone()
                }
                None => {
                    let read_id = self.state.next_read_id.fetch_add(1, Ordering::Relaxed);
                    let client = self.clone();
                    let owned_key = key.clone();
                    let read = async move {
                        let result = client.read_aggregates_uncached(&owned_key).await;
                        {
                            let mut in_flight = client
                                .state
                                .in_flight
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner);
                            // A reset may have let a newer read take this slot
                            if in_flight.get(&owned_key).is_some_and(|(id, _)| *id == read_id) {
                                in_flight.remove(&owned_key);
                            }
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.clone(), (read_id, read.clone()));
                    read
                }
            }
        };

        read.await
    }

    async fn read_aggregates_uncached(
        &self,
        key: &PointKey,
    ) -> Result<PointAggregate, AggregateError> {
        let (snapshot, rows) = tokio::join!(self.read_snapshot(key), self.read_voter_rows(key));
        let snapshot = snapshot?;
        let rows = rows?;

        let live = tally_rows(&key.point_id, &rows);
        let merged = merge_aggregate(&key.point_id, snapshot.as_ref(), &live);
        debug!(
            point = %key,
            rows = rows.len(),
            snapshot_version = ?merged.snapshot_version,
            participants = merged.participants,
            "Aggregate read"
        );
        Ok(merged)
    }

    /// One bounded read. Silence past `read_timeout` reads as absent.
    async fn read_once(&self, path: &MeshPath) -> Result<Option<Value>, AggregateError> {
        match tokio::time::timeout(self.config.read_timeout, self.mesh.once(path)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                debug!(path = %path, "Read timed out; treating as absent");
                Ok(None)
            }
        }
    }

    /// Materialized snapshot of a point, or the newest cached one if the
    /// mesh returns an older or no snapshot.
    pub async fn read_snapshot(
        &self,
        key: &PointKey,
    ) -> Result<Option<PointAggregateSnapshot>, AggregateError> {
        let path = snapshot_path(key);
        let fresh = match self.read_once(&path).await? {
            Some(value) => match parse_snapshot(key, value) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(path = %path, error = %e, "Ignoring malformed snapshot");
                    None
                }
            },
            None => None,
        };

        let mut cache = self
            .state
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(match fresh {
            Some(snapshot) => Some(cache.offer(snapshot, false)),
            None => cache.get(key).cloned(),
        })
    }

    /// Live voter rows for a point.
    ///
    /// Tries one bulk read of the voters directory first. If that yields
    /// nothing and the substrate can enumerate children, fans in per-voter
    /// rows until `fanin_idle` passes without a new one or `fanin_ceiling`
    /// is reached. The ceiling also bounds per-voter row reads.
    pub async fn read_voter_rows(&self, key: &PointKey) -> Result<VoterRows, AggregateError> {
        let dir = voters_path(key);
        let mut rows = VoterRows::new();
        if let Some(Value::Object(voters)) = self.read_once(&dir).await? {
            for (voter_id, subtree) in voters {
                if let Some(node) = node_from_subtree(key, &voter_id, &subtree) {
                    rows.insert(voter_id, node);
                }
            }
        }
        if !rows.is_empty() {
            return Ok(rows);
        }

        match self.mesh.iterate(&dir) {
            Some(children) => self.fan_in(key, children).await,
            None => Ok(rows),
        }
    }

    async fn fan_in(
        &self,
        key: &PointKey,
        mut children: mpsc::UnboundedReceiver<MeshEvent>,
    ) -> Result<VoterRows, AggregateError> {
        let mut rows = VoterRows::new();
        let deadline = Instant::now() + self.config.fanin_ceiling;

        loop {
            let wait = self
                .config
                .fanin_idle
                .min(deadline.saturating_duration_since(Instant::now()));
            if wait.is_zero() {
                debug!(point = %key, rows = rows.len(), "Fan-in hit ceiling");
                break;
            }
            let event = match tokio::time::timeout(wait, children.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => {
                    debug!(point = %key, rows = rows.len(), "Fan-in went idle");
                    break;
                }
            };

            let node = match node_from_subtree(key, &event.key, &event.value) {
                Some(node) => Some(node),
                // The enumeration may only carry a reference; read the row itself
                None => {
                    let read = self.read_voter_node(key, &event.key);
                    match tokio::time::timeout_at(deadline, read).await {
                        Ok(node) => node?,
                        Err(_) => {
                            debug!(point = %key, rows = rows.len(), "Fan-in hit ceiling during row read");
                            break;
                        }
                    }
                }
            };
            if let Some(node) = node {
                rows.insert(event.key, node);
            }
        }

        Ok(rows)
    }

    /// One voter's node for a point, if present and well-formed.
    pub async fn read_voter_node(
        &self,
        key: &PointKey,
        voter_id: &str,
    ) -> Result<Option<VoterPointNode>, AggregateError> {
        let path = voter_node_path(key, voter_id);
        Ok(self
            .read_once(&path)
            .await?
            .and_then(|value| parse_voter_node(key, voter_id, value)))
    }

    // ==================== Writes ====================

    /// Write one voter's node. Ack or ack timeout both succeed.
    pub async fn write_voter_node(
        &self,
        key: &PointKey,
        voter_id: &str,
        node: VoterPointNode,
    ) -> Result<VoterPointNode, AggregateError> {
        self.put_voter_node(key, voter_id, &node).await?;
        Ok(node)
    }

    /// Write one voter's node and report how the write settled.
    pub async fn put_voter_node(
        &self,
        key: &PointKey,
        voter_id: &str,
        node: &VoterPointNode,
    ) -> Result<AckOutcome, AggregateError> {
        validate_voter_node(key, voter_id, node)?;
        let payload = to_publishable(node)?;
        let path = voter_node_path(key, voter_id);
        self.put_with_ack(&path, payload).await
    }

    /// Materialize a snapshot at its canonical path.
    pub async fn write_point_aggregate_snapshot(
        &self,
        snapshot: PointAggregateSnapshot,
    ) -> Result<PointAggregateSnapshot, AggregateError> {
        validate_snapshot(&snapshot)?;
        let payload = to_publishable(&snapshot)?;
        let key = snapshot.key();
        let path = snapshot_path(&key);
        self.put_with_ack(&path, payload).await?;

        // The snapshot just written supersedes an equally ranked cached one
        self.state
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offer(snapshot.clone(), true);
        Ok(snapshot)
    }

    async fn put_with_ack(
        &self,
        path: &MeshPath,
        payload: Value,
    ) -> Result<AckOutcome, AggregateError> {
        let pending = self.mesh.put(path, payload).await?;
        let outcome = pending.await_ack(self.config.ack_timeout).await?;
        match outcome {
            AckOutcome::Acked => debug!(path = %path, "Write acknowledged"),
            AckOutcome::TimedOut => info!(
                path = %path,
                timeout_ms = self.config.ack_timeout.as_millis() as u64,
                "Write not acknowledged in time; treating as written"
            ),
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for AggregateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateClient")
            .field("mesh", &self.mesh)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

fn parse_snapshot(key: &PointKey, value: Value) -> Result<PointAggregateSnapshot, ValidationError> {
    let snapshot: PointAggregateSnapshot =
        serde_json::from_value(value).map_err(|e| ValidationError::Encoding(e.to_string()))?;
    validate_snapshot(&snapshot)?;
    if snapshot.key() != *key {
        return Err(ValidationError::field(
            "point",
            format!("snapshot is for {}, expected {key}", snapshot.key()),
        ));
    }
    Ok(snapshot)
}

fn parse_voter_node(key: &PointKey, voter_id: &str, value: Value) -> Option<VoterPointNode> {
    let parsed = serde_json::from_value::<VoterPointNode>(value)
        .map_err(|e| ValidationError::Encoding(e.to_string()))
        .and_then(|node| validate_voter_node(key, voter_id, &node).map(|()| node));
    match parsed {
        Ok(node) => Some(node),
        Err(e) => {
            debug!(point = %key, voter_id, error = %e, "Skipping unreadable voter row");
            None
        }
    }
}

/// Pull the row for `key.point_id` out of one voter's subtree.
fn node_from_subtree(key: &PointKey, voter_id: &str, subtree: &Value) -> Option<VoterPointNode> {
    subtree
        .get(&key.point_id)
        .and_then(|value| parse_voter_node(key, voter_id, value.clone()))
}
