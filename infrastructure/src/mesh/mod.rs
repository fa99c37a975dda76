//! Mesh substrate adapters.
//!
//! Provides [`MemoryMesh`], an in-process implementation of the
//! [`MeshAdapter`](quorum_application::MeshAdapter) and
//! [`MeshSubscribe`](quorum_application::MeshSubscribe) ports with fault
//! injection.

mod memory;

pub use memory::{FaultPlan, MemoryMesh, MeshStats};
