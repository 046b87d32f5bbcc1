//! Result cache for dgrep
//!
//! A bounded least-recently-used map from a query's canonical key to the last
//! `QueryResult` computed for it. One instance is shared by the local side of
//! every query and by every inbound handler, so all operations take `&self`.

mod result_cache;
mod statistics;

pub use result_cache::ResultCache;
pub use statistics::CacheStats;
