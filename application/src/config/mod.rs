//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`SyncConfig`]: write barrier and warning rate limit
//! - [`AggregateConfig`]: ack, read and fan-in bounds, snapshot cache size
//! - [`QueueConfig`] / [`ReplayConfig`]: queue cap, replay batch and backoff
//!
//! File and environment loading lives in the infrastructure layer, which
//! converts into these types.

pub mod aggregate_params;
pub mod queue_params;
pub mod sync_params;

pub use aggregate_params::AggregateConfig;
pub use queue_params::{QueueConfig, ReplayConfig};
pub use sync_params::SyncConfig;
