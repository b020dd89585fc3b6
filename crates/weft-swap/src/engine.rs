//! The exchange engine: owns the want registry and reacts to traffic.

use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use weft_store::BlockService;
use weft_types::{Cid, Codec, DataBlock, HashAlgorithm, PeerId};

use crate::error::{SwapError, SwapResult};
use crate::ledger::{Ledger, LedgerBook};
use crate::net::{PeerConnection, Swarm, SwarmEvent, WantEntry, WireProtocol};
use crate::stats::{SwapCounters, SwapStats};
use crate::wantlist::WantRegistry;

const NEEDED_CHANNEL_CAPACITY: usize = 64;

struct Running {
    swarm: Arc<dyn Swarm>,
    stop: CancellationToken,
}

/// The block-exchange engine.
///
/// Composes the want registry, the per-peer ledgers, and the aggregate
/// counters. Wire protocols and the block service are injected after
/// construction (the facade owns the wiring order); the swarm arrives
/// at [`SwapEngine::start`].
///
/// A `get` that misses the local store lands here as
/// [`SwapEngine::want_async`]; a block pushed by a peer lands as
/// [`SwapEngine::on_block_received`] and flows through the block
/// service, whose `put` resolves the waiters via
/// [`SwapEngine::found`]. The engine never calls `found` for received
/// blocks itself.
pub struct SwapEngine {
    registry: WantRegistry,
    ledgers: LedgerBook,
    counters: SwapCounters,
    needed_tx: broadcast::Sender<Cid>,
    depot: OnceLock<Arc<dyn BlockService>>,
    protocols: OnceLock<Vec<Arc<dyn WireProtocol>>>,
    running: Mutex<Option<Running>>,
}

impl SwapEngine {
    pub fn new() -> Arc<Self> {
        let (needed_tx, _) = broadcast::channel(NEEDED_CHANNEL_CAPACITY);
        Arc::new(Self {
            registry: WantRegistry::new(),
            ledgers: LedgerBook::new(),
            counters: SwapCounters::new(),
            needed_tx,
            depot: OnceLock::new(),
            protocols: OnceLock::new(),
            running: Mutex::new(None),
        })
    }

    /// Inject the block service. Second calls are ignored.
    pub fn set_block_service(&self, depot: Arc<dyn BlockService>) {
        let _ = self.depot.set(depot);
    }

    /// Inject the wire protocols, most preferred first. Second calls
    /// are ignored.
    pub fn set_protocols(&self, protocols: Vec<Arc<dyn WireProtocol>>) {
        let _ = self.protocols.set(protocols);
    }

    /// The injected block service.
    pub fn block_service(&self) -> SwapResult<&Arc<dyn BlockService>> {
        self.depot.get().ok_or(SwapError::NotStarted)
    }

    fn protocols(&self) -> &[Arc<dyn WireProtocol>] {
        self.protocols.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The swarm supplied at start.
    pub fn swarm(&self) -> SwapResult<Arc<dyn Swarm>> {
        self.running
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|r| Arc::clone(&r.swarm))
            .ok_or(SwapError::NotStarted)
    }

    fn stop_token(&self) -> SwapResult<CancellationToken> {
        self.running
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|r| r.stop.clone())
            .ok_or(SwapError::NotStarted)
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().expect("lock poisoned").is_some()
    }

    /// Notifications that a newly wanted CID needs provider lookup.
    pub fn subscribe_needed(&self) -> broadcast::Receiver<Cid> {
        self.needed_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the engine on a swarm: reset accounting, register the
    /// wire protocols, and watch for new connections.
    pub async fn start(self: &Arc<Self>, swarm: Arc<dyn Swarm>) -> SwapResult<()> {
        let stop = CancellationToken::new();
        {
            let mut running = self.running.lock().expect("lock poisoned");
            if running.is_some() {
                return Err(SwapError::AlreadyStarted);
            }
            *running = Some(Running {
                swarm: Arc::clone(&swarm),
                stop: stop.clone(),
            });
        }
        self.counters.reset();
        self.ledgers.clear();

        for protocol in self.protocols() {
            swarm.add_protocol(Arc::clone(protocol)).await;
        }

        let mut events = swarm.subscribe();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(SwarmEvent::ConnectionEstablished(conn)) => {
                            let engine = Arc::clone(&engine);
                            tokio::spawn(async move {
                                engine.on_connection_established(conn).await;
                            });
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "connection events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        info!("block exchange started");
        Ok(())
    }

    /// Stop the engine: unregister protocols, stop watching the swarm,
    /// and cancel every outstanding waiter.
    pub async fn stop(&self) {
        let running = self.running.lock().expect("lock poisoned").take();
        let Some(running) = running else {
            return;
        };
        running.stop.cancel();
        for protocol in self.protocols() {
            running.swarm.remove_protocol(protocol.protocol_id()).await;
        }
        let cancelled = self.registry.clear();
        info!(cancelled_waiters = cancelled, "block exchange stopped");
    }

    /// Send the full want-list to a peer whose connection just came up.
    async fn on_connection_established(&self, conn: PeerConnection) {
        if self.registry.is_empty() {
            return;
        }
        // Never talk to an unidentified peer.
        if !conn.identity_established().await {
            return;
        }
        let wants = self.current_wants();
        if wants.is_empty() {
            return;
        }
        let peer = conn.remote_peer();
        if let Err(e) = self.send_wantlist_to_peer(peer, &wants, true).await {
            debug!(peer = %peer, error = %e, "could not send want-list on connect");
        }
    }

    // -----------------------------------------------------------------------
    // Wants
    // -----------------------------------------------------------------------

    /// Register a waiter for `id` and suspend until the block arrives.
    ///
    /// A newly created entry announces the need (for provider lookup)
    /// and schedules a full want-list broadcast to every known peer.
    /// Cancelling removes only this caller's waiter; the entry is
    /// dropped when its last waiter leaves.
    pub async fn want_async(
        self: &Arc<Self>,
        id: &Cid,
        requester: &PeerId,
        cancel: CancellationToken,
    ) -> SwapResult<DataBlock> {
        let (handle, created) = self.registry.want(id, requester);
        if created {
            debug!(id = %id, peer = %requester, "block wanted");
            let _ = self.needed_tx.send(id.clone());
            let engine = Arc::clone(self);
            let wants = self.current_wants();
            tokio::spawn(async move {
                engine.send_wantlist_to_all(wants, true).await;
            });
        }
        let waiter_id = handle.waiter_id();
        tokio::select! {
            _ = cancel.cancelled() => {
                self.registry.remove_waiter(id, waiter_id);
                debug!(id = %id, "want cancelled by caller");
                Err(SwapError::Cancelled)
            }
            result = handle.wait() => result,
        }
    }

    /// Drop the want for `id` entirely, cancelling every waiter.
    pub fn unwant(&self, id: &Cid) -> usize {
        let cancelled = self.registry.unwant(id);
        if cancelled > 0 {
            debug!(id = %id, cancelled, "block unwanted");
        }
        cancelled
    }

    /// Resolve waiters for a block acquired by any means.
    ///
    /// Called by the block service after a successful `put`. Returns
    /// the number of waiters notified.
    pub fn found(&self, id: &Cid, block: &DataBlock) -> usize {
        let notified = self.registry.found(id, block);
        if notified > 0 {
            debug!(id = %id, notified, "wanted block found");
        }
        notified
    }

    /// All CIDs currently wanted.
    pub fn wants(&self) -> Vec<Cid> {
        self.registry.keys()
    }

    /// CIDs `peer` has expressed interest in.
    pub fn peer_wants(&self, peer: &PeerId) -> Vec<Cid> {
        self.registry.peer_wants(peer)
    }

    fn current_wants(&self) -> Vec<WantEntry> {
        self.registry.keys().into_iter().map(WantEntry::want).collect()
    }

    // -----------------------------------------------------------------------
    // Traffic accounting
    // -----------------------------------------------------------------------

    /// Account for a block pushed by `peer` and store it if new.
    ///
    /// Duplicates (already in the store) bump the `dup_*` counters and
    /// change no persistent state. New blocks flow through the block
    /// service, whose `put` resolves any waiters.
    pub async fn on_block_received(
        &self,
        peer: &PeerId,
        data: Bytes,
        content_type: &str,
        hash_algorithm: HashAlgorithm,
    ) -> SwapResult<Cid> {
        let codec = Codec::from_name(content_type)?;
        let block = DataBlock::from_content(codec, hash_algorithm, data);
        self.counters.note_received(block.size());
        self.ledgers.credit_received(peer, block.size());

        let depot = self.block_service()?;
        if depot.exists(block.id()).await? {
            self.counters.note_duplicate(block.size());
            debug!(id = %block.id(), peer = %peer, "duplicate block received");
            return Ok(block.id().clone());
        }
        let id = depot.put(block).await?;
        debug!(id = %id, peer = %peer, "block received");
        Ok(id)
    }

    /// Account for a block sent to `peer`.
    pub async fn on_block_sent(&self, peer: &PeerId, block: &DataBlock) {
        self.counters.note_sent(block.size());
        self.ledgers.credit_sent(peer, block.size());
    }

    pub fn ledger_for(&self, peer: &PeerId) -> Ledger {
        self.ledgers.ledger_for(peer)
    }

    pub fn statistics(&self) -> SwapStats {
        let mut wantlist = self.registry.keys();
        wantlist.sort();
        self.counters.snapshot(wantlist, self.ledgers.peers())
    }

    // -----------------------------------------------------------------------
    // Want-list broadcast
    // -----------------------------------------------------------------------

    /// Send `wants` to every known peer, one task per peer. Per-peer
    /// failures are logged and never abort the broadcast.
    pub async fn send_wantlist_to_all(self: &Arc<Self>, wants: Vec<WantEntry>, full: bool) {
        let Ok(swarm) = self.swarm() else {
            // Not started: nobody to talk to yet.
            return;
        };
        let peers = swarm.known_peers();
        let mut tasks = Vec::with_capacity(peers.len());
        for peer in peers {
            let engine = Arc::clone(self);
            let wants = wants.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = engine.send_wantlist_to_peer(&peer, &wants, full).await {
                    debug!(peer = %peer, error = %e, "want-list send failed");
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Send `wants` to one peer, trying protocols in preference order;
    /// the first successful dial terminates the attempt.
    pub async fn send_wantlist_to_peer(
        &self,
        peer: &PeerId,
        wants: &[WantEntry],
        full: bool,
    ) -> SwapResult<()> {
        let swarm = self.swarm()?;
        let stop = self.stop_token()?;
        let mut last_error = SwapError::Protocol("no wire protocols registered".into());
        for protocol in self.protocols() {
            match swarm
                .dial(peer, protocol.protocol_id(), stop.child_token())
                .await
            {
                Ok(mut stream) => {
                    protocol.send_wants(&mut stream, wants, full).await?;
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
