//! Local query resolution through the result cache

use crate::matcher::Matcher;
use dgrep_cache::{CacheStats, ResultCache};
use dgrep_core::{Error, Query, QueryResult, Result};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Fallback identity before the node has bound or been told its address
pub const UNBOUND_NODE_ID: &str = "local";

/// Answers queries against this node's log file.
///
/// Shared by the coordinator (for the local half of a query) and by every
/// inbound connection handler.
pub struct QueryResolver {
    cache: ResultCache,
    matcher: Arc<dyn Matcher>,
    log_file: PathBuf,
    identity: OnceLock<String>,
}

impl QueryResolver {
    pub fn new(cache: ResultCache, matcher: Arc<dyn Matcher>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            matcher,
            log_file: log_file.into(),
            identity: OnceLock::new(),
        }
    }

    /// Fix this node's identity. Only the first call has any effect.
    pub fn set_node_id(&self, id: impl Into<String>) -> bool {
        self.identity.set(id.into()).is_ok()
    }

    pub fn node_id(&self) -> &str {
        self.identity
            .get()
            .map_or(UNBOUND_NODE_ID, String::as_str)
    }

    pub fn has_node_id(&self) -> bool {
        self.identity.get().is_some()
    }

    /// Serve from the cache, or run the matcher and cache its result.
    ///
    /// Matcher failures are returned and never cached.
    pub async fn resolve(&self, query: &Query) -> Result<QueryResult> {
        self.cache
            .try_get_or_compute(query.key(), || async {
                let started = Instant::now();
                let matched = self.matcher.run(query, &self.log_file).await?;
                Ok::<_, Error>(QueryResult::new(
                    matched.output,
                    self.node_id(),
                    &self.log_file,
                    matched.line_count,
                    started.elapsed(),
                ))
            })
            .await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::testing::StaticMatcher;

    fn resolver(matcher: Arc<StaticMatcher>) -> QueryResolver {
        QueryResolver::new(ResultCache::new(4).unwrap(), matcher, "/logs/machine.1.log")
    }

    #[tokio::test]
    async fn test_second_resolve_hits_cache() {
        let matcher = Arc::new(StaticMatcher::default().with("grep;-c;ERROR", "1\n", 1));
        let resolver = resolver(Arc::clone(&matcher));
        resolver.set_node_id("127.0.0.1:9001");
        let query = Query::parse("grep -c ERROR").unwrap();

        let first = resolver.resolve(&query).await.unwrap();
        let second = resolver.resolve(&query).await.unwrap();

        assert_eq!(first.node, "127.0.0.1:9001");
        assert_eq!(first.file, "machine.1.log");
        assert_eq!(first.line_count, 1);
        assert!(first.same_content(&second));
        assert_eq!(matcher.calls(), 1);
        assert_eq!(resolver.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let matcher = Arc::new(StaticMatcher::default());
        let resolver = resolver(Arc::clone(&matcher));
        let query = Query::parse("grep WARN").unwrap();

        assert!(resolver.resolve(&query).await.is_err());
        assert!(resolver.resolve(&query).await.is_err());
        assert_eq!(matcher.calls(), 2);
        assert_eq!(resolver.cache_stats().len, 0);
    }

    #[test]
    fn test_identity_is_set_once() {
        let resolver = resolver(Arc::new(StaticMatcher::default()));
        assert_eq!(resolver.node_id(), UNBOUND_NODE_ID);
        assert!(!resolver.has_node_id());

        assert!(resolver.set_node_id("a:1"));
        assert!(!resolver.set_node_id("b:2"));
        assert_eq!(resolver.node_id(), "a:1");
    }
}
