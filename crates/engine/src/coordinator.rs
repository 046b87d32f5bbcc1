//! Fan-out of a query to the local node and every active peer

use crate::exporter::JsonExporter;
use crate::peers::{PeerConnection, PeerRegistry};
use crate::protocol::{self, Message};
use crate::report::QueryReport;
use crate::resolver::QueryResolver;
use dgrep_core::{Query, QueryResult, Result};
use dgrep_utils::tracing::query_span;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Owns the outbound connections and aggregates results for the caller.
pub struct Coordinator {
    resolver: Arc<QueryResolver>,
    registry: Arc<PeerRegistry>,
    connections: RwLock<Vec<Arc<PeerConnection>>>,
    exporter: Option<JsonExporter>,
}

impl Coordinator {
    pub fn new(
        resolver: Arc<QueryResolver>,
        registry: Arc<PeerRegistry>,
        exporter: Option<JsonExporter>,
    ) -> Self {
        Self {
            resolver,
            registry,
            connections: RwLock::new(Vec::new()),
            exporter,
        }
    }

    /// Adopt freshly dialed connections, appended after any existing ones.
    pub fn add_connections(&self, connections: impl IntoIterator<Item = Arc<PeerConnection>>) {
        self.connections.write().extend(connections);
    }

    /// Connections whose peer is still connected, in dial order
    fn active_connections(&self) -> Vec<Arc<PeerConnection>> {
        self.connections
            .read()
            .iter()
            .filter(|c| self.registry.is_active(c.id()))
            .cloned()
            .collect()
    }

    /// Run `query` locally and on every active peer concurrently.
    ///
    /// The report lists the local result first, then peers in dial order.
    /// Nodes that fail are logged and left out; the call itself never fails.
    pub async fn execute(&self, query: &Query) -> QueryReport {
        let started = Instant::now();
        let peers = self.active_connections();
        let span = query_span(query.key(), peers.len());

        async {
            let request = match protocol::encode(&Message::Query(query.clone())) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode query; asking no peers");
                    None
                }
            };

            let local = async {
                match self.resolver.resolve(query).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!(
                            node = %self.resolver.node_id(),
                            error = %e,
                            "Local execution failed"
                        );
                        None
                    }
                }
            };
            let remote = futures::future::join_all(
                peers
                    .iter()
                    .map(|peer| self.ask_peer(peer, request.as_deref())),
            );

            let (local, remote) = tokio::join!(local, remote);
            let results: Vec<QueryResult> = local
                .into_iter()
                .chain(remote.into_iter().flatten())
                .collect();

            let report = QueryReport::new(query.key(), results, started.elapsed());
            tracing::info!(
                nodes = report.node_count(),
                total_lines = report.total_lines,
                elapsed_ns = %report.elapsed.as_nanos(),
                "Query complete"
            );

            if let Some(exporter) = &self.exporter {
                if let Err(e) = exporter.export(&report).await {
                    tracing::warn!(error = %e, "Failed to export query results");
                }
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn ask_peer(&self, peer: &PeerConnection, request: Option<&[u8]>) -> Option<QueryResult> {
        let request = request?;
        match self.round_trip(peer, request).await {
            Ok(Message::Result(result)) => Some(result),
            Ok(Message::Failure(failure)) => {
                tracing::warn!(
                    peer = %peer.id(),
                    node = %failure.node,
                    error = %failure.message,
                    "Peer failed to execute query"
                );
                None
            }
            Ok(other) => {
                tracing::warn!(peer = %peer.id(), message = ?other, "Unexpected response from peer");
                None
            }
            Err(e) => {
                if e.is_disconnect() {
                    peer.close().await;
                    if self.registry.mark_disconnected(peer.id()) {
                        tracing::info!(
                            peer = %peer.id(),
                            active = self.registry.active_count(),
                            "Peer disconnected"
                        );
                    }
                } else {
                    tracing::warn!(peer = %peer.id(), error = %e, "Skipping peer");
                }
                None
            }
        }
    }

    async fn round_trip(&self, peer: &PeerConnection, request: &[u8]) -> Result<Message> {
        let response = peer.round_trip(request).await?;
        protocol::decode(&response).map_err(|e| e.into_error(peer.id()))
    }

    /// Close every outbound connection
    pub async fn close_all(&self) {
        let connections: Vec<_> = self.connections.write().drain(..).collect();
        for connection in connections {
            connection.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::testing::StaticMatcher;
    use dgrep_cache::ResultCache;

    fn coordinator(matcher: StaticMatcher, exporter: Option<JsonExporter>) -> Coordinator {
        let resolver = QueryResolver::new(ResultCache::new(8).unwrap(), Arc::new(matcher), "m.log");
        resolver.set_node_id("local:1");
        Coordinator::new(Arc::new(resolver), Arc::new(PeerRegistry::new()), exporter)
    }

    #[tokio::test]
    async fn test_no_peers_reports_local_only() {
        let coordinator = coordinator(StaticMatcher::default().with("grep;-c;ERROR", "4\n", 4), None);
        let report = coordinator
            .execute(&Query::parse("grep -c ERROR").unwrap())
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].node, "local:1");
        assert_eq!(report.total_lines, 4);
    }

    #[tokio::test]
    async fn test_local_failure_is_omitted() {
        let coordinator = coordinator(StaticMatcher::default(), None);
        let report = coordinator.execute(&Query::parse("grep WARN").unwrap()).await;

        assert!(report.results.is_empty());
        assert_eq!(report.total_lines, 0);
    }

    #[tokio::test]
    async fn test_each_query_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path()).unwrap();
        let coordinator = coordinator(StaticMatcher::default().with("grep;x", "x\n", 1), Some(exporter));

        let query = Query::parse("grep x").unwrap();
        coordinator.execute(&query).await;
        coordinator.execute(&query).await;

        let record = crate::exporter::read_export(&dir.path().join("query_2.json"))
            .await
            .unwrap();
        assert_eq!(record.query, "grep;x");
        assert_eq!(record.outputs.len(), 1);
    }
}
