//! In-process swarm for tests and embedding.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_swap::{
    BoxStream, PeerConnection, Swarm, SwapError, SwarmEvent, WireProtocol,
};
use weft_types::PeerId;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const STREAM_BUFFER: usize = 256 * 1024;

struct SwarmShared {
    peer: PeerId,
    protocols: Mutex<HashMap<String, Arc<dyn WireProtocol>>>,
    events: broadcast::Sender<SwarmEvent>,
    known: Mutex<HashSet<PeerId>>,
}

/// A process-local network of [`MemorySwarm`]s.
///
/// Dialing a registered peer hands the far end of a duplex stream to
/// that peer's protocol handler on a spawned task; no sockets are
/// involved. The same role the in-memory store plays for persistence.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    peers: Arc<Mutex<HashMap<PeerId, Arc<SwarmShared>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (and register) a swarm for `peer`.
    pub fn swarm(&self, peer: impl Into<PeerId>) -> Arc<MemorySwarm> {
        let peer = peer.into();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(SwarmShared {
            peer: peer.clone(),
            protocols: Mutex::new(HashMap::new()),
            events,
            known: Mutex::new(HashSet::new()),
        });
        self.peers
            .lock()
            .expect("lock poisoned")
            .insert(peer, Arc::clone(&shared));
        Arc::new(MemorySwarm {
            shared,
            network: self.clone(),
        })
    }

    /// Make `a` and `b` known to each other and fire
    /// `ConnectionEstablished` on both sides, identity already
    /// concluded.
    pub fn connect(&self, a: &PeerId, b: &PeerId) {
        let peers = self.peers.lock().expect("lock poisoned");
        if let Some(shared) = peers.get(a) {
            shared.known.lock().expect("lock poisoned").insert(b.clone());
            let _ = shared.events.send(SwarmEvent::ConnectionEstablished(
                PeerConnection::identified(b.clone()),
            ));
        }
        if let Some(shared) = peers.get(b) {
            shared.known.lock().expect("lock poisoned").insert(a.clone());
            let _ = shared.events.send(SwarmEvent::ConnectionEstablished(
                PeerConnection::identified(a.clone()),
            ));
        }
    }

    fn lookup(&self, peer: &PeerId) -> Option<Arc<SwarmShared>> {
        self.peers.lock().expect("lock poisoned").get(peer).cloned()
    }
}

/// One node's view of a [`MemoryNetwork`].
pub struct MemorySwarm {
    shared: Arc<SwarmShared>,
    network: MemoryNetwork,
}

#[async_trait]
impl Swarm for MemorySwarm {
    fn local_peer(&self) -> PeerId {
        self.shared.peer.clone()
    }

    async fn dial(
        &self,
        peer: &PeerId,
        protocol_id: &str,
        _cancel: CancellationToken,
    ) -> Result<BoxStream, SwapError> {
        let target = self.network.lookup(peer).ok_or_else(|| SwapError::Dial {
            peer: peer.clone(),
            reason: "unknown peer".into(),
        })?;
        let handler = target
            .protocols
            .lock()
            .expect("lock poisoned")
            .get(protocol_id)
            .cloned()
            .ok_or_else(|| SwapError::Dial {
                peer: peer.clone(),
                reason: format!("{protocol_id} not registered"),
            })?;

        let (near, far) = tokio::io::duplex(STREAM_BUFFER);
        let conn = PeerConnection::identified(self.shared.peer.clone());
        let remote = peer.clone();
        tokio::spawn(async move {
            if let Err(e) = handler.handle(conn, Box::new(far)).await {
                debug!(peer = %remote, error = %e, "inbound stream handler failed");
            }
        });
        Ok(Box::new(near))
    }

    fn known_peers(&self) -> Vec<PeerId> {
        self.shared
            .known
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn register_peer(&self, peer: PeerId) {
        if peer != self.shared.peer {
            self.shared.known.lock().expect("lock poisoned").insert(peer);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.shared.events.subscribe()
    }

    async fn add_protocol(&self, protocol: Arc<dyn WireProtocol>) {
        self.shared
            .protocols
            .lock()
            .expect("lock poisoned")
            .insert(protocol.protocol_id().to_string(), protocol);
    }

    async fn remove_protocol(&self, protocol_id: &str) {
        self.shared
            .protocols
            .lock()
            .expect("lock poisoned")
            .remove(protocol_id);
    }
}
