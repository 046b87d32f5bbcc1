//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;

impl Error {
    /// Create an invalid query error
    #[must_use]
    pub fn invalid_query(input: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create a clean-disconnect error for a peer
    #[must_use]
    pub fn connection_closed(peer: impl Into<String>) -> Self {
        Error::ConnectionClosed { peer: peer.into() }
    }

    /// Create a partial-frame error for a peer
    #[must_use]
    pub fn truncated(peer: impl Into<String>, expected: usize, received: usize) -> Self {
        Error::Truncated {
            peer: peer.into(),
            expected,
            received,
        }
    }

    /// Create a wire protocol error
    #[must_use]
    pub fn protocol(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Protocol {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
            exit_code,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a security validation error
    #[must_use]
    pub fn security(message: impl Into<String>) -> Self {
        Error::Security {
            message: message.into(),
        }
    }
}
