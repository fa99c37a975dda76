//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod event_logger;
pub mod intent_store;
pub mod mesh;
