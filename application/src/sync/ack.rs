//! Ack-or-timeout
//!
//! Every write to the mesh hands back a [`PendingAck`]. Awaiting it with
//! [`PendingAck::await_ack`] resolves on whichever comes first: the
//! substrate's acknowledgement or the end of the wait window. Silence is
//! reported as [`AckOutcome::TimedOut`], not as an error; only an explicit
//! substrate failure becomes `Err`.

use crate::ports::mesh::MeshError;
use std::time::Duration;
use tokio::sync::oneshot;

/// Sending half held by the substrate adapter
pub type AckSender = oneshot::Sender<Result<(), MeshError>>;

/// How a write settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    TimedOut,
}

impl AckOutcome {
    pub fn is_acked(&self) -> bool {
        matches!(self, AckOutcome::Acked)
    }
}

impl std::fmt::Display for AckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckOutcome::Acked => write!(f, "acked"),
            AckOutcome::TimedOut => write!(f, "ack timed out"),
        }
    }
}

/// Acknowledgement of an issued write
#[derive(Debug)]
pub struct PendingAck {
    rx: oneshot::Receiver<Result<(), MeshError>>,
}

impl PendingAck {
    /// A connected sender/handle pair
    pub fn channel() -> (AckSender, PendingAck) {
        let (tx, rx) = oneshot::channel();
        (tx, PendingAck { rx })
    }

    /// Already acknowledged
    pub fn acked() -> Self {
        Self::settled(Ok(()))
    }

    /// Already failed
    pub fn failed(error: MeshError) -> Self {
        Self::settled(Err(error))
    }

    fn settled(result: Result<(), MeshError>) -> Self {
        let (tx, pending) = Self::channel();
        // The receiver is alive in `pending`, so this cannot fail
        let _ = tx.send(result);
        pending
    }

    /// Wait up to `timeout` for the acknowledgement.
    ///
    /// A sender dropped without answering can never ack, so it resolves as
    /// `TimedOut` straight away.
    pub async fn await_ack(self, timeout: Duration) -> Result<AckOutcome, MeshError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(Ok(()))) => Ok(AckOutcome::Acked),
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) | Err(_) => Ok(AckOutcome::TimedOut),
        }
    }
}
