//! Per-peer accounting of blocks and bytes exchanged.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use weft_types::PeerId;

/// Counters for one peer ever interacted with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub peer: PeerId,
    /// Blocks moved in either direction.
    pub blocks_exchanged: u64,
    pub data_sent: u64,
    pub data_received: u64,
}

impl Ledger {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            blocks_exchanged: 0,
            data_sent: 0,
            data_received: 0,
        }
    }
}

/// The set of per-peer ledgers, updated by atomic upsert.
#[derive(Default)]
pub struct LedgerBook {
    ledgers: RwLock<HashMap<PeerId, Ledger>>,
}

impl LedgerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit_received(&self, peer: &PeerId, bytes: u64) {
        let mut ledgers = self.ledgers.write().expect("lock poisoned");
        let ledger = ledgers
            .entry(peer.clone())
            .or_insert_with(|| Ledger::new(peer.clone()));
        ledger.blocks_exchanged += 1;
        ledger.data_received += bytes;
    }

    pub fn credit_sent(&self, peer: &PeerId, bytes: u64) {
        let mut ledgers = self.ledgers.write().expect("lock poisoned");
        let ledger = ledgers
            .entry(peer.clone())
            .or_insert_with(|| Ledger::new(peer.clone()));
        ledger.blocks_exchanged += 1;
        ledger.data_sent += bytes;
    }

    /// The ledger for `peer`; zeroed if no traffic has occurred yet.
    pub fn ledger_for(&self, peer: &PeerId) -> Ledger {
        self.ledgers
            .read()
            .expect("lock poisoned")
            .get(peer)
            .cloned()
            .unwrap_or_else(|| Ledger::new(peer.clone()))
    }

    /// Every peer with a ledger.
    pub fn peers(&self) -> Vec<PeerId> {
        self.ledgers
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Forget all ledgers (engine start).
    pub fn clear(&self) {
        self.ledgers.write().expect("lock poisoned").clear();
    }
}
