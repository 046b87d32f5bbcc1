//! The node-level facade tying server, peers and coordinator together

use crate::coordinator::Coordinator;
use crate::exporter::JsonExporter;
use crate::matcher::{Matcher, ProcessMatcher};
use crate::peers::{self, PeerRegistry, PeerState};
use crate::report::QueryReport;
use crate::resolver::QueryResolver;
use crate::server::{QueryServer, ServerContext};
use dgrep_cache::{CacheStats, ResultCache};
use dgrep_config::EngineConfig;
use dgrep_core::{Error, Query, Result};
use std::net::SocketAddr;
use std::sync::Arc;

/// One node of the cluster.
///
/// A node answers peers' queries through its server and issues its own
/// queries through the coordinator. Both share a single result cache.
pub struct Engine {
    config: EngineConfig,
    resolver: Arc<QueryResolver>,
    registry: Arc<PeerRegistry>,
    coordinator: Coordinator,
    server: tokio::sync::Mutex<Option<QueryServer>>,
}

impl Engine {
    pub fn new(config: EngineConfig, matcher: Arc<dyn Matcher>) -> Result<Self> {
        config.validate()?;

        let cache = ResultCache::new(config.cache_capacity)?;
        let resolver = Arc::new(QueryResolver::new(cache, matcher, &config.log_file));
        if let Some(addr) = &config.advertise_addr {
            resolver.set_node_id(addr.clone());
        }

        let exporter = config
            .test_output_dir
            .as_ref()
            .map(JsonExporter::new)
            .transpose()?;

        let registry = Arc::new(PeerRegistry::new());
        let coordinator = Coordinator::new(Arc::clone(&resolver), Arc::clone(&registry), exporter);

        Ok(Self {
            config,
            resolver,
            registry,
            coordinator,
            server: tokio::sync::Mutex::new(None),
        })
    }

    /// Build an engine that launches real processes from the configured allowlist
    pub fn with_process_matcher(config: EngineConfig) -> Result<Self> {
        let matcher = ProcessMatcher::new(config.allowed_programs.iter().cloned());
        Self::new(config, Arc::new(matcher))
    }

    /// Bind the listening socket and start serving peers in the background.
    pub async fn start_server(&self) -> Result<SocketAddr> {
        let mut server = self.server.lock().await;
        if let Some(running) = server.as_ref() {
            return Err(Error::configuration(format!(
                "server already listening on {}",
                running.local_addr()
            )));
        }

        let started = QueryServer::start(
            self.config.listen_addr,
            ServerContext {
                resolver: Arc::clone(&self.resolver),
                registry: Arc::clone(&self.registry),
                max_frame_bytes: self.config.max_frame_bytes,
            },
        )
        .await?;

        let addr = started.local_addr();
        self.resolver.set_node_id(addr.to_string());
        *server = Some(started);
        Ok(addr)
    }

    /// Dial every peer, retrying per the dial policy, until all are connected.
    pub async fn connect_to_peers(&self, addrs: &[String]) -> Result<()> {
        if !self.resolver.has_node_id() {
            return Err(Error::configuration(
                "start the server or set an advertise address before connecting to peers",
            ));
        }

        let connections = peers::connect_all(
            &self.registry,
            addrs,
            self.resolver.node_id(),
            &self.config.dial_policy,
        )
        .await?;
        self.coordinator.add_connections(connections);

        tracing::info!(peers = self.registry.active_count(), "All peers connected");
        Ok(())
    }

    /// Run a query across the cluster.
    pub async fn execute(&self, query: &Query) -> QueryReport {
        self.coordinator.execute(query).await
    }

    pub fn active_peer_count(&self) -> usize {
        self.registry.active_count()
    }

    pub fn peer_states(&self) -> Vec<(String, PeerState)> {
        self.registry.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }

    pub fn node_id(&self) -> &str {
        self.resolver.node_id()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop accepting and wait for connection handlers to drain.
    pub async fn stop_server(&self) {
        if let Some(server) = self.server.lock().await.take() {
            server.stop().await;
        }
    }

    /// Stop the server and close every outbound connection.
    pub async fn shutdown(&self) {
        self.stop_server().await;
        self.coordinator.close_all().await;
        tracing::info!(node = %self.node_id(), "Engine shut down");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("node_id", &self.node_id())
            .field("log_file", &self.config.log_file)
            .field("active_peers", &self.active_peer_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::testing::StaticMatcher;

    fn engine(config: EngineConfig) -> Engine {
        Engine::new(config, Arc::new(StaticMatcher::default())).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::new("m.log").with_cache_capacity(0);
        assert!(Engine::new(config, Arc::new(StaticMatcher::default())).is_err());
    }

    #[test]
    fn test_advertise_addr_is_identity() {
        let engine = engine(EngineConfig::new("m.log").with_advertise_addr("10.0.0.4:9004"));
        assert_eq!(engine.node_id(), "10.0.0.4:9004");
    }

    #[tokio::test]
    async fn test_bound_addr_becomes_identity() {
        let engine = engine(EngineConfig::new("m.log"));
        let addr = engine.start_server().await.unwrap();
        assert_eq!(engine.node_id(), addr.to_string());
        assert!(engine.start_server().await.is_err());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_requires_identity() {
        let engine = engine(EngineConfig::new("m.log"));
        let err = engine
            .connect_to_peers(&["127.0.0.1:1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let engine = engine(EngineConfig::new("m.log"));
        engine.stop_server().await;
        engine.shutdown().await;
        assert_eq!(engine.active_peer_count(), 0);
    }
}
