//! Domain types shared by the cache, the wire protocol and the coordinator.

mod query;
mod result;

pub use query::Query;
pub use result::{duration_nanos, QueryResult};
