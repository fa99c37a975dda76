//! Vote intent materializer
//!
//! Projects a queued [`VoteIntentRecord`] onto the shared aggregate:
//!
//! 1. Read the point's live voter rows.
//! 2. Apply last-write-wins for the intent's voter.
//! 3. If the intent wins, write the voter node. An unacknowledged write is
//!    confirmed with a recovery read; if the read does not show the intent,
//!    the projection fails so the queue retries it.
//! 4. Recompute the snapshot from the full row set and the previous
//!    snapshot, and materialize it.

use super::aggregate_client::{AggregateClient, AggregateError};
use super::intent_queue::ReplayFailure;
use crate::sync::ack::AckOutcome;
use quorum_domain::aggregate::paths::voter_node_path;
use quorum_domain::util::now_millis;
use quorum_domain::{PointAggregateSnapshot, ValidationError, VoteIntentRecord, compute_snapshot};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from projecting one intent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid vote intent: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Recovery read for intent {intent_id} found intent {found} instead")]
    RecoveryMismatch { intent_id: String, found: String },
}

impl ProjectionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProjectionError::Validation(_) => false,
            ProjectionError::Aggregate(e) => e.is_retryable(),
            ProjectionError::RecoveryMismatch { .. } => true,
        }
    }
}

impl ReplayFailure for ProjectionError {
    fn is_retryable(&self) -> bool {
        ProjectionError::is_retryable(self)
    }
}

/// What a successful projection did
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Whether the intent replaced the voter's node
    pub applied: bool,
    pub snapshot: PointAggregateSnapshot,
}

/// Projects intents through an [`AggregateClient`]
#[derive(Debug, Clone)]
pub struct IntentMaterializer {
    client: AggregateClient,
}

impl IntentMaterializer {
    pub fn new(client: AggregateClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AggregateClient {
        &self.client
    }

    /// Project one intent and rematerialize its point's snapshot.
    pub async fn project_intent_record(
        &self,
        record: &VoteIntentRecord,
    ) -> Result<Projection, ProjectionError> {
        record.validate()?;
        let key = record.point_key();
        let mut rows = self.client.read_voter_rows(&key).await?;

        let applied = record.beats(rows.get(&record.voter_id));
        if applied {
            let node = record.to_node(now_millis());
            let outcome = self
                .client
                .put_voter_node(&key, &record.voter_id, &node)
                .await?;

            let node = match outcome {
                AckOutcome::Acked => node,
                AckOutcome::TimedOut => self.recover(record).await?,
            };
            rows.insert(record.voter_id.clone(), node);
        } else {
            debug!(
                intent_id = %record.intent_id,
                voter_id = %record.voter_id,
                "Intent superseded by existing node"
            );
        }

        let previous = self.client.read_snapshot(&key).await?;
        let snapshot = compute_snapshot(&key, &rows, previous.as_ref(), now_millis());
        let snapshot = self.client.write_point_aggregate_snapshot(snapshot).await?;

        info!(
            intent_id = %record.intent_id,
            point = %key,
            applied,
            version = snapshot.version,
            participants = snapshot.participants,
            "Intent projected"
        );
        Ok(Projection { applied, snapshot })
    }

    /// Confirm an unacknowledged voter write by reading it back.
    async fn recover(
        &self,
        record: &VoteIntentRecord,
    ) -> Result<quorum_domain::VoterPointNode, ProjectionError> {
        let key = record.point_key();
        match self.client.read_voter_node(&key, &record.voter_id).await? {
            Some(node) if record.is_reflected_by(&node) => {
                debug!(intent_id = %record.intent_id, "Recovery read confirmed write");
                Ok(node)
            }
            Some(node) => {
                warn!(
                    intent_id = %record.intent_id,
                    found = %node.intent_id,
                    "Recovery read shows a different node"
                );
                Err(ProjectionError::RecoveryMismatch {
                    intent_id: record.intent_id.clone(),
                    found: node.intent_id,
                })
            }
            None => {
                let timeout = self.client.config().ack_timeout;
                warn!(intent_id = %record.intent_id, "Recovery read found nothing");
                Err(AggregateError::AckTimeout {
                    path: voter_node_path(&key, &record.voter_id).render(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into())
            }
        }
    }
}
