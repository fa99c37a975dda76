//! Guarded sync primitive and the ack-or-timeout combinator
//!
//! Everything that writes to the mesh goes through [`GuardedMesh::put`] and
//! settles its result with [`PendingAck::await_ack`].

pub mod ack;
pub mod guarded;
pub mod warn;

pub use ack::{AckOutcome, AckSender, PendingAck};
pub use guarded::{GuardedMesh, GuardedNode, SyncError};
pub use warn::RateLimitedWarning;
