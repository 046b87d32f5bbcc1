//! Peer bookkeeping and outbound connections

use crate::protocol::{self, Hello, Message};
use dgrep_core::{Error, Result};
use dgrep_utils::{retry, RetryPolicy};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;

/// Lifecycle of one peer as seen from this node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Dialing,
    Connected,
    /// Terminal; a disconnected peer is never dialed again
    Disconnected,
}

#[derive(Debug, Default)]
struct RegistryInner {
    peers: IndexMap<String, PeerState>,
    active: usize,
}

/// Thread-safe table of peers keyed by identity (`ip:port`).
///
/// The active count always equals the number of peers in
/// [`PeerState::Connected`].
#[derive(Debug, Default)]
pub struct PeerRegistry {
    inner: Mutex<RegistryInner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer we are about to dial.
    ///
    /// Returns `false` if the peer was already known, in any state; the
    /// existing entry is left alone and the caller should not dial it.
    pub fn begin_dial(&self, peer: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.peers.contains_key(peer) {
            return false;
        }
        inner.peers.insert(peer.to_string(), PeerState::Dialing);
        true
    }

    /// Move a dialing peer to connected. Returns `false` if it was not dialing.
    pub fn mark_connected(&self, peer: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.peers.get_mut(peer) {
            Some(state) if *state == PeerState::Dialing => {
                *state = PeerState::Connected;
                inner.active += 1;
                true
            }
            _ => false,
        }
    }

    /// Move a connected peer to disconnected.
    ///
    /// Returns `true` only for the call that performed the transition, so a
    /// peer noticed by both its handler and the coordinator is counted once.
    pub fn mark_disconnected(&self, peer: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.peers.get_mut(peer) {
            Some(state) if *state == PeerState::Connected => {
                *state = PeerState::Disconnected;
                inner.active -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, peer: &str) -> Option<PeerState> {
        self.inner.lock().peers.get(peer).copied()
    }

    pub fn is_active(&self, peer: &str) -> bool {
        self.state(peer) == Some(PeerState::Connected)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().active
    }

    /// All known peers in registration order
    pub fn snapshot(&self) -> Vec<(String, PeerState)> {
        self.inner
            .lock()
            .peers
            .iter()
            .map(|(id, state)| (id.clone(), *state))
            .collect()
    }
}

/// An outbound connection used for request/response round trips.
///
/// Round trips on one connection are serialised so a response is always
/// paired with the request that caused it.
pub struct PeerConnection {
    id: String,
    stream: tokio::sync::Mutex<Option<BufReader<TcpStream>>>,
}

impl PeerConnection {
    /// Connect to `addr` and introduce ourselves as `local_id`.
    pub async fn dial(addr: &str, local_id: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::network(addr, format!("failed to connect: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::network(addr, e.to_string()))?;

        let mut stream = BufReader::new(stream);
        let hello = protocol::encode(&Message::Hello(Hello {
            node_id: local_id.to_string(),
        }))
        .map_err(|e| e.into_error(addr))?;
        protocol::write_frame(stream.get_mut(), &hello)
            .await
            .map_err(|e| e.into_error(addr))?;

        Ok(Self {
            id: addr.to_string(),
            stream: tokio::sync::Mutex::new(Some(stream)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send one request frame and wait for the matching response frame.
    pub async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| Error::connection_closed(&self.id))?;

        protocol::write_frame(stream.get_mut(), request)
            .await
            .map_err(|e| e.into_error(&self.id))?;
        protocol::read_frame(stream)
            .await
            .map_err(|e| e.into_error(&self.id))
    }

    /// Drop the underlying stream; later round trips fail as closed.
    pub async fn close(&self) {
        self.stream.lock().await.take();
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Dial every address until each one answers, registering them as connected.
///
/// Addresses the registry already knows, including repeats within `addrs`,
/// are skipped, so each peer gets at most one connection. Peers are dialed
/// concurrently; the returned connections keep the order of `addrs`. With a
/// bounded policy, the error of the first peer (in address order) that could
/// not be reached is returned.
pub async fn connect_all(
    registry: &PeerRegistry,
    addrs: &[String],
    local_id: &str,
    policy: &RetryPolicy,
) -> Result<Vec<Arc<PeerConnection>>> {
    let fresh: Vec<&String> = addrs
        .iter()
        .filter(|addr| {
            let new = registry.begin_dial(addr);
            if !new {
                tracing::debug!(peer = %addr, "Peer already known; not dialing again");
            }
            new
        })
        .collect();

    let dials = fresh.into_iter().map(|addr| async move {
        tracing::debug!(peer = %addr, "Dialing peer");
        let connection = retry(policy, || PeerConnection::dial(addr, local_id)).await?;
        if !registry.mark_connected(addr) {
            connection.close().await;
            return Ok(None);
        }
        tracing::info!(peer = %addr, "Connected to peer");
        Ok::<_, Error>(Some(Arc::new(connection)))
    });

    let dialed: Vec<Option<Arc<PeerConnection>>> = futures::future::join_all(dials)
        .await
        .into_iter()
        .collect::<Result<_>>()?;
    Ok(dialed.into_iter().flatten().collect())
}
