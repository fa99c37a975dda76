//! Mesh addressing
//!
//! Paths into the replication substrate. Nothing here performs I/O; the
//! substrate itself is a port in the application layer.

pub mod path;

pub use path::MeshPath;
