//! Scripted replay against the in-process mesh.
//!
//! Each simulated peer owns its own queue, client cache and replay
//! scheduler; all of them share one [`MemoryMesh`]. An intent is queued on
//! the peer its voter hashes to, so the same voter always lands on the same
//! peer.

use anyhow::{Context, Result, bail};
use quorum_application::{
    AggregateClient, EventLogger, GuardedMesh, IntentMaterializer, MemoryIntentStore,
    ReplayReport, ReplayScheduler, VoteIntentQueue,
};
use quorum_domain::{
    Agreement, PointAggregate, PointAggregateSnapshot, PointKey, VoteIntentRecord, fnv1a32_str,
};
use quorum_infrastructure::{FaultPlan, FileConfig, MemoryMesh, MeshStats};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MAX_PASSES: usize = 10;

/// How to run a simulation
#[derive(Debug, Clone, Default)]
pub struct SimulationOptions {
    pub peers: usize,
    pub faults: FaultPlan,
    pub lossy_first_pass: bool,
    pub contact_after: Option<Duration>,
}

/// Final state of one point
#[derive(Debug, Clone, Serialize)]
pub struct PointOutcome {
    pub snapshot: Option<PointAggregateSnapshot>,
    pub aggregate: PointAggregate,
}

/// What a simulation produced
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub peers: usize,
    pub intents: usize,
    pub replay: ReplayReport,
    /// Intents still queued after the last pass
    pub pending: usize,
    pub mesh: MeshStats,
    pub points: Vec<PointOutcome>,
}

/// Two voters on one point; voter A changes their mind.
pub fn default_script() -> Vec<VoteIntentRecord> {
    let vote = |intent_id: &str, voter_id: &str, agreement, weight, seq| VoteIntentRecord {
        intent_id: intent_id.to_string(),
        voter_id: voter_id.to_string(),
        topic_id: "demo-topic".to_string(),
        synthesis_id: "demo-synthesis".to_string(),
        epoch: 1,
        point_id: "point-1".to_string(),
        agreement,
        weight,
        proof_ref: None,
        seq,
        emitted_at: seq,
    };
    vec![
        vote("a-1", "voter-a", Agreement::Agree, 0.7, 10),
        vote("b-1", "voter-b", Agreement::Agree, 1.1, 20),
        vote("a-2", "voter-a", Agreement::Disagree, 1.3, 30),
    ]
}

/// Read a script file: a JSON array of vote intents.
pub fn load_script(path: &Path) -> Result<Vec<VoteIntentRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
}

fn peer(
    mesh: &Arc<MemoryMesh>,
    config: &FileConfig,
    logger: &Arc<dyn EventLogger>,
) -> Result<Arc<ReplayScheduler>> {
    let queue = VoteIntentQueue::open(
        Arc::new(MemoryIntentStore::new()),
        config.queue.to_queue_config(),
    )?
    .with_logger(logger.clone());
    let client = AggregateClient::new(
        GuardedMesh::new(mesh.clone(), config.mesh.to_sync_config()),
        config.aggregates.to_aggregate_config(),
    );
    Ok(Arc::new(
        ReplayScheduler::new(
            Arc::new(queue),
            IntentMaterializer::new(client),
            config.replay.to_replay_config(),
        )
        .with_logger(logger.clone()),
    ))
}

/// Run `script` through `options.peers` peers and read back every point.
pub async fn run(
    script: Vec<VoteIntentRecord>,
    options: &SimulationOptions,
    config: &FileConfig,
    logger: Arc<dyn EventLogger>,
) -> Result<SimulationReport> {
    if options.peers == 0 {
        bail!("--peers must be at least 1");
    }

    let mesh = match options.contact_after {
        Some(delay) => {
            let mesh = MemoryMesh::isolated();
            let remote = mesh.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                remote.connect();
            });
            mesh
        }
        None => MemoryMesh::connected(),
    };

    let mut faults = options.faults.clone();
    faults.drop_writes |= options.lossy_first_pass;
    mesh.set_faults(faults);

    let peers = (0..options.peers)
        .map(|_| peer(&mesh, config, &logger))
        .collect::<Result<Vec<_>>>()?;

    let mut keys = BTreeSet::new();
    for record in &script {
        let index = fnv1a32_str(&record.voter_id) as usize % peers.len();
        keys.insert(record.point_key());
        let outcome = peers[index]
            .queue()
            .enqueue(record.clone())
            .with_context(|| format!("queueing intent {}", record.intent_id))?;
        debug!(intent_id = %record.intent_id, peer = index, ?outcome, "Queued intent");
    }

    let mut replay = ReplayReport::default();
    if options.lossy_first_pass {
        for peer in &peers {
            replay += peer.replay_pending_intents().await;
        }
        info!(failed = replay.failed, "Lossy pass finished; healing mesh");
        mesh.set_faults(options.faults.clone());
    }

    for peer in &peers {
        replay += peer.run_until_drained(MAX_PASSES).await;
    }

    // Read back through a fresh client so nothing comes from a peer's cache
    let observer = AggregateClient::new(
        GuardedMesh::new(mesh.clone(), config.mesh.to_sync_config()),
        config.aggregates.to_aggregate_config(),
    );
    let mut points = Vec::with_capacity(keys.len());
    for key in &keys {
        points.push(read_point(&observer, key).await?);
    }

    Ok(SimulationReport {
        peers: peers.len(),
        intents: script.len(),
        replay,
        pending: peers.iter().map(|p| p.queue().len()).sum(),
        mesh: mesh.stats(),
        points,
    })
}

async fn read_point(client: &AggregateClient, key: &PointKey) -> Result<PointOutcome> {
    let snapshot = client.read_snapshot(key).await?;
    let aggregate = client.read_aggregates(key).await?;
    Ok(PointOutcome { snapshot, aggregate })
}
