//! Core domain types, errors, and constants for `dgrep`.
//!
//! ## Key Components
//!
//! - **`errors`**: The `Error` enum and `Result` alias shared by every crate in
//!   the workspace.
//! - **`types`**: `Query` (tokenised filter plus canonical cache key) and
//!   `QueryResult` (one node's answer to a query).
//! - **`constants`**: Protocol and default tuning constants.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    types::*,
};
