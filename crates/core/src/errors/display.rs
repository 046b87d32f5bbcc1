//! Display implementations for error types

use super::types::Error;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidQuery { input, message } => {
                write!(f, "invalid query '{input}': {message}")
            }
            Error::ConnectionClosed { peer } => {
                write!(f, "connection to '{peer}' closed")
            }
            Error::Truncated {
                peer,
                expected,
                received,
            } => {
                write!(
                    f,
                    "truncated frame from '{peer}': expected {expected} bytes, received {received}"
                )
            }
            Error::Protocol { peer, message } => {
                write!(f, "protocol error from '{peer}': {message}")
            }
            Error::Network { endpoint, message } => {
                write!(f, "network error for '{endpoint}': {message}")
            }
            Error::CommandExecution {
                command,
                args,
                message,
                exit_code,
            } => {
                let args_str = args.join(" ");
                let invocation = if args_str.is_empty() {
                    command.clone()
                } else {
                    format!("{command} {args_str}")
                };
                match exit_code {
                    Some(code) => write!(
                        f,
                        "command '{invocation}' failed with exit code {code}: {message}"
                    ),
                    None => write!(f, "command '{invocation}' failed: {message}"),
                }
            }
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
            Error::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Json { message, .. } => {
                write!(f, "JSON error: {message}")
            }
            Error::Security { message } => {
                write!(f, "security validation error: {message}")
            }
        }
    }
}
