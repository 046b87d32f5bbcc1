//! Distributed log query engine.
//!
//! Every node runs the same [`Engine`]: it serves its own log file to peers
//! over TCP and fans queries typed locally out to every connected peer,
//! caching results per canonical query key.

pub mod coordinator;
pub mod engine;
pub mod exporter;
pub mod matcher;
pub mod peers;
pub mod protocol;
pub mod report;
pub mod resolver;
pub mod server;

pub use coordinator::Coordinator;
pub use engine::Engine;
pub use exporter::{read_export, ExportRecord, JsonExporter};
pub use matcher::{count_lines, MatchOutput, Matcher, ProcessMatcher};
pub use peers::{PeerConnection, PeerRegistry, PeerState};
pub use report::QueryReport;
pub use resolver::QueryResolver;
pub use server::{QueryServer, ServerContext};
