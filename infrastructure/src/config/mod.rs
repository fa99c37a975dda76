//! Configuration file loading for mesh-quorum
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `MESH_QUORUM_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./mesh-quorum.toml` or `./.mesh-quorum.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/mesh-quorum/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAggregatesConfig, FileConfig, FileGatherConfig, FileMeshConfig, FileQueueConfig,
    FileReplayConfig,
};
pub use loader::ConfigLoader;
