//! Core error type definitions

use std::path::PathBuf;

/// Result type alias for dgrep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dgrep operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raw user input could not be turned into a query
    InvalidQuery { input: String, message: String },

    /// The remote end closed the stream at a frame boundary
    ConnectionClosed { peer: String },

    /// The stream ended in the middle of a frame
    Truncated {
        peer: String,
        expected: usize,
        received: usize,
    },

    /// A frame arrived but its payload violates the wire schema
    Protocol { peer: String, message: String },

    /// Network-related errors (dial, bind, accept, write)
    Network { endpoint: String, message: String },

    /// Command execution errors
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    /// Configuration errors
    Configuration { message: String },

    /// File system operations
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Security validation errors
    Security { message: String },
}

impl Error {
    /// Whether this error means the peer on the other end of the stream is gone.
    ///
    /// Only these errors move a peer connection to `Disconnected`.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Error::ConnectionClosed { .. } | Error::Truncated { .. })
    }
}
