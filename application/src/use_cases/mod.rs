//! Use cases
//!
//! Application-level operations that orchestrate domain logic over the
//! mesh and the local intent store.

pub mod aggregate_client;
pub mod intent_queue;
pub mod materializer;
pub mod replay;
