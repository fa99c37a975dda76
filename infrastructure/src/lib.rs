//! Infrastructure layer for mesh-quorum
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the in-process mesh substrate, the file-backed
//! intent store, the JSONL event journal and configuration file loading.

pub mod config;
pub mod logging;
pub mod mesh;
pub mod store;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileAggregatesConfig, FileConfig, FileGatherConfig, FileMeshConfig,
    FileQueueConfig, FileReplayConfig,
};
pub use logging::JsonlEventLogger;
pub use mesh::{FaultPlan, MemoryMesh, MeshStats};
pub use store::JsonFileIntentStore;
