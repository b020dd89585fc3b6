//! Network contracts consumed by the exchange engine.
//!
//! The engine never opens sockets itself: it dials through a [`Swarm`],
//! frames messages through [`WireProtocol`]s, and discovers providers
//! through a [`Router`]. Implementations are injected at start; an
//! in-process swarm for tests and embedding ships with `weft-engine`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use weft_types::{Cid, DataBlock, PeerId};

use crate::error::SwapError;

/// A bidirectional byte stream to a peer.
pub trait WireStream: AsyncRead + AsyncWrite + Send + Unpin + std::fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + std::fmt::Debug> WireStream for T {}

/// An owned wire stream, as returned by [`Swarm::dial`].
pub type BoxStream = Box<dyn WireStream>;

/// A live connection to a peer.
///
/// The identity handshake may still be in flight when the connection is
/// announced; [`PeerConnection::identity_established`] gates on it.
#[derive(Clone, Debug)]
pub struct PeerConnection {
    peer: PeerId,
    identified: watch::Receiver<bool>,
}

impl PeerConnection {
    /// A connection whose identity handshake has already concluded.
    pub fn identified(peer: PeerId) -> Self {
        let (_tx, rx) = watch::channel(true);
        Self {
            peer,
            identified: rx,
        }
    }

    /// A connection whose handshake is still pending; the returned
    /// [`IdentityGate`] releases it.
    pub fn gated(peer: PeerId) -> (Self, IdentityGate) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                peer,
                identified: rx,
            },
            IdentityGate { tx },
        )
    }

    pub fn remote_peer(&self) -> &PeerId {
        &self.peer
    }

    /// Wait for the identity handshake. Returns `false` if the
    /// connection went away before the handshake concluded.
    pub async fn identity_established(&self) -> bool {
        let mut rx = self.identified.clone();
        if *rx.borrow() {
            return true;
        }
        let result = rx.wait_for(|established| *established).await;
        result.is_ok()
    }
}

/// Releases a pending identity handshake.
pub struct IdentityGate {
    tx: watch::Sender<bool>,
}

impl IdentityGate {
    pub fn establish(&self) {
        let _ = self.tx.send(true);
    }
}

/// Events published by a swarm.
#[derive(Clone, Debug)]
pub enum SwarmEvent {
    ConnectionEstablished(PeerConnection),
}

/// Peer-connection and protocol-multiplexing abstraction.
///
/// Supplied by the embedding application; the engine registers its
/// protocols on start and unregisters them on stop.
#[async_trait]
pub trait Swarm: Send + Sync {
    /// The identity this swarm presents to remote peers.
    fn local_peer(&self) -> PeerId;

    /// Open a stream to `peer` speaking `protocol_id`.
    async fn dial(
        &self,
        peer: &PeerId,
        protocol_id: &str,
        cancel: CancellationToken,
    ) -> Result<BoxStream, SwapError>;

    /// Peers with a connected or known address.
    fn known_peers(&self) -> Vec<PeerId>;

    /// Make a peer known (e.g. a provider learned from the router).
    fn register_peer(&self, peer: PeerId);

    /// Subscribe to connection events.
    fn subscribe(&self) -> broadcast::Receiver<SwarmEvent>;

    /// Register a protocol handler for inbound streams.
    async fn add_protocol(&self, protocol: Arc<dyn WireProtocol>);

    /// Unregister a protocol handler.
    async fn remove_protocol(&self, protocol_id: &str);
}

/// A want-list entry as carried on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WantEntry {
    pub id: Cid,
    pub priority: i32,
    pub cancel: bool,
}

impl WantEntry {
    pub fn want(id: Cid) -> Self {
        Self {
            id,
            priority: 1,
            cancel: false,
        }
    }

    pub fn cancelled(id: Cid) -> Self {
        Self {
            id,
            priority: 1,
            cancel: true,
        }
    }
}

/// One framed request/response protocol variant.
///
/// `handle` runs the receive loop for an inbound stream; the `send_*`
/// methods frame outbound records on a dialed stream.
#[async_trait]
pub trait WireProtocol: Send + Sync {
    /// Protocol identifier, e.g. `/ipfs/bitswap/1.1.0`.
    fn protocol_id(&self) -> &'static str;

    /// Process an inbound stream until it is exhausted.
    async fn handle(&self, conn: PeerConnection, stream: BoxStream) -> Result<(), SwapError>;

    /// Send a want-list.
    async fn send_wants(
        &self,
        stream: &mut BoxStream,
        wants: &[WantEntry],
        full: bool,
    ) -> Result<(), SwapError>;

    /// Send a single block.
    async fn send_block(&self, stream: &mut BoxStream, block: &DataBlock) -> Result<(), SwapError>;
}

/// Error from the provider-lookup router.
#[derive(Debug, thiserror::Error)]
#[error("router error: {0}")]
pub struct RouterError(pub String);

/// Provider lookup and content advertisement.
///
/// The generic DHT walk itself is out of scope; the core only consumes
/// this interface.
#[async_trait]
pub trait Router: Send + Sync {
    /// Find up to `limit` peers that can provide `id`.
    ///
    /// Cancelling stops further discovery; peers already found are
    /// returned.
    async fn find_providers(
        &self,
        id: &Cid,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<PeerId>, RouterError>;

    /// Announce that this node can provide `id`.
    async fn provide(
        &self,
        id: &Cid,
        advertise: bool,
        cancel: CancellationToken,
    ) -> Result<(), RouterError>;
}

/// A router that knows no providers and accepts announcements.
#[derive(Default)]
pub struct NullRouter;

impl NullRouter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Router for NullRouter {
    async fn find_providers(
        &self,
        _id: &Cid,
        _limit: usize,
        _cancel: CancellationToken,
    ) -> Result<Vec<PeerId>, RouterError> {
        Ok(Vec::new())
    }

    async fn provide(
        &self,
        _id: &Cid,
        _advertise: bool,
        _cancel: CancellationToken,
    ) -> Result<(), RouterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identified_connection_passes_immediately() {
        let conn = PeerConnection::identified(PeerId::new("p"));
        assert!(conn.identity_established().await);
    }

    #[tokio::test]
    async fn gated_connection_waits_for_handshake() {
        let (conn, gate) = PeerConnection::gated(PeerId::new("p"));
        let waiter = tokio::spawn({
            let conn = conn.clone();
            async move { conn.identity_established().await }
        });
        // The waiter cannot complete before the gate opens.
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.establish();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_gate_reports_no_identity() {
        let (conn, gate) = PeerConnection::gated(PeerId::new("p"));
        drop(gate);
        assert!(!conn.identity_established().await);
    }

    #[test]
    fn want_entry_constructors() {
        let id = Cid::for_content(
            weft_types::Codec::Raw,
            weft_types::HashAlgorithm::Sha2_256,
            b"w",
        );
        let want = WantEntry::want(id.clone());
        assert_eq!(want.priority, 1);
        assert!(!want.cancel);
        assert!(WantEntry::cancelled(id).cancel);
    }

    #[tokio::test]
    async fn null_router_finds_nothing() {
        let router = NullRouter::new();
        let id = Cid::for_content(
            weft_types::Codec::Raw,
            weft_types::HashAlgorithm::Sha2_256,
            b"r",
        );
        let found = router
            .find_providers(&id, 20, CancellationToken::new())
            .await
            .unwrap();
        assert!(found.is_empty());
        router
            .provide(&id, true, CancellationToken::new())
            .await
            .unwrap();
    }
}
