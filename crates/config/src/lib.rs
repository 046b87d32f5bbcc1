//! Configuration for dgrep
//!
//! - **`engine`**: `EngineConfig`, the settings one node's engine runs with.
//! - **`cluster`**: `ClusterLayout`, the naming convention that turns an
//!   ordinal into a hostname and port for every node of the cluster.

pub mod cluster;
pub mod engine;

pub use cluster::ClusterLayout;
pub use engine::EngineConfig;
