//! Shared utilities for dgrep
//!
//! Logging setup and the retry policy used during cluster bring-up.

pub mod resilience;
pub mod tracing;

pub use resilience::{retry, RetryPolicy};
