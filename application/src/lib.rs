//! Application layer for mesh-quorum
//!
//! This crate contains use cases, port definitions, the guarded sync
//! primitive and application configuration. It depends only on the domain
//! layer.

pub mod config;
pub mod ports;
pub mod sync;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{AggregateConfig, QueueConfig, ReplayConfig, SyncConfig};
pub use ports::{
    event_logger::{EventLogger, LogEvent, NoEventLogger},
    intent_store::{IntentStore, MemoryIntentStore, StoreError},
    mesh::{MeshAdapter, MeshError, MeshEvent, MeshSubscribe},
};
pub use sync::{AckOutcome, AckSender, GuardedMesh, GuardedNode, PendingAck, SyncError};
pub use use_cases::aggregate_client::{AggregateClient, AggregateError};
pub use use_cases::intent_queue::{
    EnqueueOutcome, QueueError, ReplayFailure, ReplayReport, VoteIntentQueue,
};
pub use use_cases::materializer::{IntentMaterializer, Projection, ProjectionError};
pub use use_cases::replay::ReplayScheduler;
