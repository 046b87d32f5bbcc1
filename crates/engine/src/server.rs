//! Inbound query server

use crate::peers::PeerRegistry;
use crate::protocol::{self, Failure, Message};
use crate::resolver::QueryResolver;
use dgrep_core::{Error, Result};
use dgrep_utils::tracing::connection_span;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

/// State shared by every connection handler
pub struct ServerContext {
    pub resolver: Arc<QueryResolver>,
    pub registry: Arc<PeerRegistry>,
    pub max_frame_bytes: usize,
}

/// A running accept loop and its connection handlers
pub struct QueryServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl QueryServer {
    /// Bind `addr` and start accepting connections in the background.
    ///
    /// Returns once the socket is listening; a bind failure is returned to the
    /// caller rather than logged.
    pub async fn start(addr: SocketAddr, context: ServerContext) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::network(addr.to_string(), format!("failed to bind: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::network(addr.to_string(), e.to_string()))?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, Arc::new(context), shutdown_rx));

        tracing::info!(addr = %local_addr, "Query server listening");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, interrupt idle handlers, and wait for all of them.
    ///
    /// A handler in the middle of answering a query finishes writing its
    /// response first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Accept loop panicked");
        }
        tracing::info!(addr = %self.local_addr, "Query server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            () = stopped(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    tracing::debug!(remote = %remote, "Accepted connection");
                    let context = Arc::clone(&context);
                    let shutdown = shutdown.clone();
                    handlers.spawn(
                        async move {
                            if let Err(e) = handle_client(stream, remote, context, shutdown).await {
                                tracing::warn!(error = %e, "Dropping connection");
                            }
                        }
                        .instrument(connection_span(&remote.to_string())),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            },
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Connection handler panicked");
                }
            }
        }
    }

    drop(listener);
    while let Some(joined) = handlers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Connection handler panicked");
        }
    }
}

/// Resolves once shutdown is signalled or the server handle is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

/// Serve one inbound connection until the peer leaves or the server stops.
///
/// The first frame is expected to be a `Hello` naming the peer; after that
/// every frame is a query answered with exactly one response frame.
async fn handle_client(
    stream: TcpStream,
    remote: SocketAddr,
    context: Arc<ServerContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut peer = remote.to_string();

    loop {
        let frame = tokio::select! {
            biased;
            () = stopped(&mut shutdown) => {
                tracing::debug!(peer = %peer, "Closing idle connection for shutdown");
                return Ok(());
            }
            frame = protocol::read_frame_limited(&mut reader, context.max_frame_bytes) => frame,
        };

        let payload = match frame {
            Ok(payload) => payload,
            Err(e) => {
                let err = e.into_error(&peer);
                if !err.is_disconnect() {
                    return Err(err);
                }
                if context.registry.mark_disconnected(&peer) {
                    tracing::info!(
                        peer = %peer,
                        active = context.registry.active_count(),
                        "Peer disconnected"
                    );
                } else {
                    tracing::debug!(peer = %peer, error = %err, "Connection closed");
                }
                return Ok(());
            }
        };

        let message = protocol::decode(&payload).map_err(|e| e.into_error(&peer))?;
        let response = match message {
            Message::Hello(hello) => {
                tracing::debug!(remote = %remote, peer = %hello.node_id, "Peer introduced itself");
                peer = hello.node_id;
                continue;
            }
            Message::Query(query) => {
                tracing::debug!(peer = %peer, key = %query.key(), "Received query");
                match context.resolver.resolve(&query).await {
                    Ok(result) => Message::Result(result),
                    Err(e) => {
                        tracing::warn!(key = %query.key(), error = %e, "Query failed for peer");
                        Message::Failure(Failure {
                            node: context.resolver.node_id().to_string(),
                            message: e.to_string(),
                        })
                    }
                }
            }
            other => {
                return Err(Error::protocol(
                    &peer,
                    format!("unexpected message: {other:?}"),
                ));
            }
        };

        let bytes = protocol::encode(&response).map_err(|e| e.into_error(&peer))?;
        protocol::write_frame(&mut write_half, &bytes)
            .await
            .map_err(|e| e.into_error(&peer))?;
    }
}
