//! In-crate mesh double for unit tests

use crate::ports::mesh::{MeshAdapter, MeshError, MeshEvent, MeshSubscribe};
use crate::sync::ack::{AckSender, PendingAck};
use async_trait::async_trait;
use quorum_domain::MeshPath;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How the double answers writes
#[derive(Debug, Clone)]
pub enum AckMode {
    Ack,
    /// Store the value but never ack
    Silent,
    /// Neither store nor ack
    Drop,
    Fail(MeshError),
}

pub struct TestMesh {
    me: Weak<TestMesh>,
    tree: Mutex<Value>,
    writes: Mutex<Vec<String>>,
    ack_mode: Mutex<AckMode>,
    held: Mutex<Vec<AckSender>>,
    hidden: Mutex<Vec<MeshPath>>,
    read_delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
    subscribers: Mutex<Vec<(MeshPath, mpsc::UnboundedSender<MeshEvent>)>>,
    contacted: watch::Sender<bool>,
    can_subscribe: bool,
}

impl TestMesh {
    fn build(contacted: bool, can_subscribe: bool) -> Arc<Self> {
        let (tx, _) = watch::channel(contacted);
        Arc::new_cyclic(|me| TestMesh {
            me: me.clone(),
            tree: Mutex::new(json!({})),
            writes: Mutex::new(Vec::new()),
            ack_mode: Mutex::new(AckMode::Ack),
            held: Mutex::new(Vec::new()),
            hidden: Mutex::new(Vec::new()),
            read_delay: Mutex::new(None),
            reads: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
            contacted: tx,
            can_subscribe,
        })
    }

    pub fn connected() -> Arc<Self> {
        Self::build(true, true)
    }

    pub fn isolated() -> Arc<Self> {
        Self::build(false, true)
    }

    pub fn connected_without_subscribe() -> Arc<Self> {
        Self::build(true, false)
    }

    pub fn set_contacted(&self) {
        self.contacted.send_replace(true);
    }

    pub fn set_ack_mode(&self, mode: AckMode) {
        *self.ack_mode.lock().unwrap() = mode;
    }

    /// Make `once` return nothing at or below `path`
    pub fn hide_reads(&self, path: &str) {
        self.hidden.lock().unwrap().push(MeshPath::parse(path));
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Number of `once` calls served
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Rendered paths of every write received, in order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn value_at(&self, path: &str) -> Option<Value> {
        let tree = self.tree.lock().unwrap();
        get_at(&tree, &MeshPath::parse(path)).cloned()
    }

    /// Write directly, bypassing acks and the write log
    pub fn seed(&self, path: &str, value: Value) {
        put_at(&mut self.tree.lock().unwrap(), &MeshPath::parse(path), value);
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
            *node = json!({});
        }
        node = node
            .as_object_mut()
            .unwrap()
            .entry(segment.clone())
            .or_insert_with(|| json!({}));
    }
    *node = value;
}

#[async_trait]
impl MeshAdapter for TestMesh {
    async fn once(&self, path: &MeshPath) -> Result<Option<Value>, MeshError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.hidden.lock().unwrap().iter().any(|h| path.starts_with(h)) {
            return Ok(None);
        }
        let tree = self.tree.lock().unwrap();
        Ok(get_at(&tree, path).cloned())
    }

    fn put(&self, path: &MeshPath, value: Value) -> PendingAck {
        self.writes.lock().unwrap().push(path.render());
        let mode = self.ack_mode.lock().unwrap().clone();
        if let AckMode::Fail(error) = mode {
            return PendingAck::failed(error);
        }
        if !matches!(mode, AckMode::Drop) {
            put_at(&mut self.tree.lock().unwrap(), path, value.clone());
            if let (Some(parent), Some(key)) = (path.parent(), path.last()) {
                for (watched, tx) in self.subscribers.lock().unwrap().iter() {
                    if *watched == parent {
                        let _ = tx.send(MeshEvent {
                            key: key.to_string(),
                            value: value.clone(),
                        });
                    }
                }
            }
        }
        match mode {
            AckMode::Ack => PendingAck::acked(),
            _ => {
                let (tx, pending) = PendingAck::channel();
                self.held.lock().unwrap().push(tx);
                pending
            }
        }
    }

    fn remote_contacted(&self) -> watch::Receiver<bool> {
        self.contacted.subscribe()
    }

    fn subscriber(&self) -> Option<Arc<dyn MeshSubscribe>> {
        if !self.can_subscribe {
            return None;
        }
        self.me
            .upgrade()
            .map(|me| me as Arc<dyn MeshSubscribe>)
    }
}

impl MeshSubscribe for TestMesh {
    fn subscribe(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push((path.clone(), tx));
        rx
    }

    fn iterate(&self, path: &MeshPath) -> mpsc::UnboundedReceiver<MeshEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let tree = self.tree.lock().unwrap();
        if let Some(Value::Object(children)) = get_at(&tree, path) {
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
