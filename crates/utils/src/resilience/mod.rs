//! Retry policy for operations that must eventually succeed.
//!
//! Used for the cluster bring-up barrier: dialing every peer until it
//! accepts. Steady-state failures are handled by the callers, not here.

mod retry;

pub use retry::{retry, RetryPolicy};
