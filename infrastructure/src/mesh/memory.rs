//! In-process mesh substrate.
//!
//! [`MemoryMesh`] keeps the whole mesh as one JSON tree addressed by
//! [`MeshPath`] segments. Every peer sharing the same `Arc<MemoryMesh>`
//! sees writes immediately, which makes it a stand-in for a perfectly
//! connected mesh. A [`FaultPlan`] brings back the failure modes a real
//! substrate has: unacknowledged writes, silently lost writes, explicit
//! rejections and reads that return nothing for directories.

use async_trait::async_trait;
use quorum_application::{AckSender, MeshAdapter, MeshError, MeshEvent, MeshSubscribe, PendingAck};
use quorum_domain::MeshPath;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Failure modes to inject
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultPlan {
    /// Store writes but never acknowledge them
    pub drop_acks: bool,
    /// Neither store nor acknowledge writes
    pub drop_writes: bool,
    /// Reject every write with this error
    pub fail_writes: Option<MeshError>,
    /// `once` on a directory returns nothing, forcing enumeration
    pub shallow_reads: bool,
}

impl FaultPlan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_drop_acks(mut self) -> Self {
        self.drop_acks = true;
        self
    }

    pub fn with_drop_writes(mut self) -> Self {
        self.drop_writes = true;
        self
    }

    pub fn with_fail_writes(mut self, error: MeshError) -> Self {
        self.fail_writes = Some(error);
        self
    }

    pub fn with_shallow_reads(mut self) -> Self {
        self.shallow_reads = true;
        self
    }
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshStats {
    pub reads: u64,
    pub writes: u64,
    pub unacked_writes: u64,
}

type Subscribers = Vec<(MeshPath, mpsc::UnboundedSender<MeshEvent>)>;

/// Shared in-process mesh
pub struct MemoryMesh {
    me: Weak<MemoryMesh>,
    tree: Mutex<Value>,
    faults: Mutex<FaultPlan>,
    // Held open so unacked writes stay pending until the writer times out
    unacked: Mutex<Vec<AckSender>>,
    subscribers: Mutex<Subscribers>,
    contacted: watch::Sender<bool>,
    reads: AtomicU64,
    writes: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryMesh {
    fn build(contacted: bool) -> Arc<Self> {
        let (contacted, _) = watch::channel(contacted);
        Arc::new_cyclic(|me| MemoryMesh {
            me: me.clone(),
            tree: Mutex::new(Value::Object(Map::new())),
            faults: Mutex::new(FaultPlan::none()),
            unacked: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            contacted,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    /// A mesh that has already reached a remote peer
    pub fn connected() -> Arc<Self> {
        Self::build(true)
    }

    /// A mesh that has not reached any peer yet; see [`MemoryMesh::connect`]
    pub fn isolated() -> Arc<Self> {
        Self::build(false)
    }

    /// Signal remote contact. Idempotent.
    pub fn connect(&self) {
        if !self.contacted.send_replace(true) {
            debug!("Memory mesh: remote contacted");
        }
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        *lock(&self.faults) = faults;
    }

    pub fn faults(&self) -> FaultPlan {
        lock(&self.faults).clone()
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            unacked_writes: lock(&self.unacked).len() as u64,
        }
    }

    /// Copy of the value at `path`
    pub fn value_at(&self, path: &MeshPath) -> Option<Value> {
        get_at(&lock(&self.tree), path).cloned()
    }

    /// Copy of the whole tree
    pub fn dump(&self) -> Value {
        lock(&self.tree).clone()
    }

    fn notify(&self, path: &MeshPath, value: &Value) {
        let (Some(parent), Some(key)) = (path.parent(), path.last()) else {
            return;
        };
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|(watched, tx)| {
            if *watched != parent {
                return !tx.is_closed();
            }
            tx.send(MeshEvent {
                key: key.to_string(),
                value: value.clone(),
            })
            .is_ok()
        });
    }
}

fn get_at<'a>(root: &'a Value, path: &MeshPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.get(segment))
}

fn put_at(root: &mut Value, path: &MeshPath, value: Value) {
    let mut node = root;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(children) = node else {
            return;
        };
        node = children
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *node = value;
}

fn is_directory(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|children| children.values().any(Value::is_object))
}

#[async_trait]
impl MeshAdapter for MemoryMesh {
    async fn once(&self, path: &MeshPath) -> Result<Option<Value>, MeshError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let shallow = lock(&self.faults).shallow_reads;
        let value = get_at(&lock(&self.tree), path).cloned();
        trace!(path = %path, found = value.is_some(), "Memory mesh read");
        Ok(value.filter(|v| !(shallow && is_directory(v))))
    }

    fn put(&self, path: &MeshPath, value: Value) -> PendingAck {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let faults = self.faults();

        if let Some(error) = faults.fail_writes {
            debug!(path = %path, error = %error, "Memory mesh: rejecting write");
            return PendingAck::failed(error);
        }

        if faults.drop_writes {
            debug!(path = %path, "Memory mesh: dropping write");
        } else {
            put_at(&mut lock(&self.tree), path, value.clone());
            self.notify(path, &value);
        }

        if faults.drop_acks || faults.drop_writes {
            let (tx, pending) = PendingAck::channel();
            lock(&self.unacked).push(tx);
            pending
        } else {
            PendingAck::acked()
        }
    }

    fn remote_contacted(&self) -> watch::Receiver<bool> {
        self.contacted.subscribe()
    }

    fn subscriber(&self) -> Option<Arc<dyn MeshSubscribe>> {
        self.me.upgrade().map(|me| me as Arc<dyn MeshSubscribe>)
    }
}

impl MeshSubscribe for MemoryMesh {
    fn subscribe(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push((path.clone(), tx));
        rx
    }

    fn iterate(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(Value::Object(children)) = get_at(&lock(&self.tree), path) {
            for (key, value) in children {
                let _ = tx.send(MeshEvent {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_application::AckOutcome;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_then_once() {
        let mesh = MemoryMesh::connected();
        let path = MeshPath::parse("vh/public/a");
        let ack = mesh.put(&path, json!({"n": 1}));
        assert_eq!(ack.await_ack(Duration::from_secs(1)).await, Ok(AckOutcome::Acked));

        assert_eq!(mesh.once(&path).await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(
            mesh.once(&MeshPath::parse("vh/public")).await.unwrap(),
            Some(json!({"a": {"n": 1}}))
        );
        assert_eq!(mesh.once(&MeshPath::parse("vh/other")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_acks_stores_without_ack() {
        let mesh = MemoryMesh::connected();
        mesh.set_faults(FaultPlan::none().with_drop_acks());
        let path = MeshPath::parse("vh/public/a");

        let outcome = mesh
            .put(&path, json!(1))
            .await_ack(Duration::from_secs(1))
            .await;
        assert_eq!(outcome, Ok(AckOutcome::TimedOut));
        assert_eq!(mesh.value_at(&path), Some(json!(1)));
        assert_eq!(mesh.stats().unacked_writes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_writes_loses_value() {
        let mesh = MemoryMesh::connected();
        mesh.set_faults(FaultPlan::none().with_drop_writes());
        let path = MeshPath::parse("vh/public/a");

        let outcome = mesh
            .put(&path, json!(1))
            .await_ack(Duration::from_secs(1))
            .await;
        assert_eq!(outcome, Ok(AckOutcome::TimedOut));
        assert_eq!(mesh.value_at(&path), None);
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let mesh = MemoryMesh::connected();
        let error = MeshError::Unavailable("partitioned".into());
        mesh.set_faults(FaultPlan::none().with_fail_writes(error.clone()));

        let outcome = mesh
            .put(&MeshPath::parse("vh/public/a"), json!(1))
            .await_ack(Duration::from_secs(1))
            .await;
        assert_eq!(outcome, Err(error));
    }

    #[tokio::test]
    async fn test_shallow_reads_hide_directories_only() {
        let mesh = MemoryMesh::connected();
        mesh.put(&MeshPath::parse("dir/a"), json!({"x": 1}));
        mesh.set_faults(FaultPlan::none().with_shallow_reads());

        assert_eq!(mesh.once(&MeshPath::parse("dir")).await.unwrap(), None);
        assert_eq!(
            mesh.once(&MeshPath::parse("dir/a")).await.unwrap(),
            Some(json!({"x": 1}))
        );
    }

    #[tokio::test]
    async fn test_subscribe_and_iterate() {
        let mesh = MemoryMesh::connected();
        let subscriber = mesh.subscriber().unwrap();
        let dir = MeshPath::parse("dir");

        let mut live = subscriber.subscribe(&dir);
        mesh.put(&dir.child("a"), json!(1));
        mesh.put(&dir.child("b"), json!(2));
        mesh.put(&MeshPath::parse("elsewhere/c"), json!(3));

        let first = live.recv().await.unwrap();
        assert_eq!((first.key.as_str(), first.value), ("a", json!(1)));
        assert_eq!(live.recv().await.unwrap().key, "b");
        assert!(live.try_recv().is_err());

        let mut children = subscriber.iterate(&dir);
        let mut keys = Vec::new();
        while let Some(event) = children.recv().await {
            keys.push(event.key);
        }
        assert_eq!(keys, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_connect_flips_contact_signal() {
        let mesh = MemoryMesh::isolated();
        let mut contacted = mesh.remote_contacted();
        assert!(!*contacted.borrow());

        mesh.connect();
        contacted.changed().await.unwrap();
        assert!(*contacted.borrow());
    }
}
