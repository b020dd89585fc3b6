//! The want registry: CIDs the local node desires, and who is waiting.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use weft_types::{Cid, DataBlock, PeerId};

use crate::error::SwapError;

/// A pending claim on a wanted block.
///
/// Resolved with the block when the want is satisfied, or with
/// [`SwapError::Cancelled`] when the want is dropped.
pub struct WaitHandle {
    id: u64,
    rx: oneshot::Receiver<DataBlock>,
}

impl WaitHandle {
    /// Registry-unique id of this waiter; used to remove exactly this
    /// waiter on caller-side cancellation.
    pub fn waiter_id(&self) -> u64 {
        self.id
    }

    /// Suspend until the want resolves.
    pub async fn wait(self) -> Result<DataBlock, SwapError> {
        self.rx.await.map_err(|_| SwapError::Cancelled)
    }
}

struct WantedBlock {
    waiters: Vec<(u64, oneshot::Sender<DataBlock>)>,
    peers: HashSet<PeerId>,
}

/// Concurrency-safe map of wanted CIDs.
///
/// State transitions for one entry are totally ordered by the map
/// lock: once `found` or `unwant` removes an entry, no waiter can be
/// added to it; a later `want` for the same CID creates a fresh entry.
pub struct WantRegistry {
    entries: Mutex<HashMap<Cid, WantedBlock>>,
    next_waiter: AtomicU64,
}

impl WantRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_waiter: AtomicU64::new(1),
        }
    }

    /// Register interest in `id` on behalf of `peer`.
    ///
    /// Returns the waiter handle and whether the entry is newly
    /// created.
    pub fn want(&self, id: &Cid, peer: &PeerId) -> (WaitHandle, bool) {
        let waiter_id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().expect("lock poisoned");
        let created = !entries.contains_key(id);
        let entry = entries.entry(id.clone()).or_insert_with(|| WantedBlock {
            waiters: Vec::new(),
            peers: HashSet::new(),
        });
        entry.waiters.push((waiter_id, tx));
        entry.peers.insert(peer.clone());
        (
            WaitHandle {
                id: waiter_id,
                rx,
            },
            created,
        )
    }

    /// Remove a single waiter (caller-side cancellation).
    ///
    /// The entry itself is dropped when its last waiter leaves.
    /// Returns `true` if the entry was removed.
    pub fn remove_waiter(&self, id: &Cid, waiter_id: u64) -> bool {
        let mut entries = self.entries.lock().expect("lock poisoned");
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        entry.waiters.retain(|(w, _)| *w != waiter_id);
        if entry.waiters.is_empty() {
            entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Drop the whole entry, cancelling every waiter.
    ///
    /// Returns the number of waiters cancelled.
    pub fn unwant(&self, id: &Cid) -> usize {
        let entry = self.entries.lock().expect("lock poisoned").remove(id);
        match entry {
            // Dropping the senders resolves every receiver as cancelled.
            Some(entry) => entry.waiters.len(),
            None => 0,
        }
    }

    /// Resolve the entry with `block`.
    ///
    /// Returns the number of waiters notified.
    pub fn found(&self, id: &Cid, block: &DataBlock) -> usize {
        let entry = self.entries.lock().expect("lock poisoned").remove(id);
        let Some(entry) = entry else {
            return 0;
        };
        let count = entry.waiters.len();
        for (_, tx) in entry.waiters {
            // A waiter that stopped listening is not an error.
            let _ = tx.send(block.clone());
        }
        count
    }

    /// Snapshot of the CIDs `peer` has expressed interest in.
    pub fn peer_wants(&self, peer: &PeerId) -> Vec<Cid> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(_, e)| e.peers.contains(peer))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Snapshot of all wanted CIDs.
    pub fn keys(&self) -> Vec<Cid> {
        self.entries
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &Cid) -> bool {
        self.entries.lock().expect("lock poisoned").contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("lock poisoned").is_empty()
    }

    /// Drop every entry, cancelling all waiters. Returns the number of
    /// waiters cancelled.
    pub fn clear(&self) -> usize {
        let entries: Vec<WantedBlock> = {
            let mut map = self.entries.lock().expect("lock poisoned");
            map.drain().map(|(_, e)| e).collect()
        };
        entries.into_iter().map(|e| e.waiters.len()).sum()
    }
}

impl Default for WantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::{Codec, HashAlgorithm};

    fn cid(data: &[u8]) -> Cid {
        Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, data)
    }

    fn block(data: &'static [u8]) -> DataBlock {
        DataBlock::from_content(
            Codec::Raw,
            HashAlgorithm::Sha2_256,
            bytes::Bytes::from_static(data),
        )
    }

    fn peer(name: &str) -> PeerId {
        PeerId::new(name)
    }

    #[tokio::test]
    async fn found_resolves_every_waiter_once() {
        let registry = WantRegistry::new();
        let b = block(b"wanted");
        let (h1, created) = registry.want(b.id(), &peer("a"));
        assert!(created);
        let (h2, created) = registry.want(b.id(), &peer("b"));
        assert!(!created);

        let notified = registry.found(b.id(), &b);
        assert_eq!(notified, 2);
        assert!(!registry.contains(b.id()));

        assert_eq!(h1.wait().await.unwrap().data(), b.data());
        assert_eq!(h2.wait().await.unwrap().data(), b.data());
    }

    #[tokio::test]
    async fn unwant_cancels_every_waiter() {
        let registry = WantRegistry::new();
        let id = cid(b"dropped");
        let (h1, _) = registry.want(&id, &peer("a"));
        let (h2, _) = registry.want(&id, &peer("a"));

        assert_eq!(registry.unwant(&id), 2);
        assert!(matches!(h1.wait().await, Err(SwapError::Cancelled)));
        assert!(matches!(h2.wait().await, Err(SwapError::Cancelled)));
    }

    #[test]
    fn remove_waiter_keeps_other_waiters() {
        let registry = WantRegistry::new();
        let id = cid(b"partial");
        let (h1, _) = registry.want(&id, &peer("a"));
        let (_h2, _) = registry.want(&id, &peer("b"));

        let entry_removed = registry.remove_waiter(&id, h1.waiter_id());
        assert!(!entry_removed);
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_last_waiter_drops_entry() {
        let registry = WantRegistry::new();
        let id = cid(b"sole");
        let (h, _) = registry.want(&id, &peer("a"));
        assert!(registry.remove_waiter(&id, h.waiter_id()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn want_after_found_creates_fresh_entry() {
        let registry = WantRegistry::new();
        let b = block(b"again");
        let (h1, _) = registry.want(b.id(), &peer("a"));
        registry.found(b.id(), &b);
        h1.wait().await.unwrap();

        let (_h2, created) = registry.want(b.id(), &peer("a"));
        assert!(created);
        assert!(registry.contains(b.id()));
    }

    #[test]
    fn found_on_unknown_cid_notifies_nobody() {
        let registry = WantRegistry::new();
        let b = block(b"unknown");
        assert_eq!(registry.found(b.id(), &b), 0);
        assert_eq!(registry.unwant(b.id()), 0);
    }

    #[test]
    fn peer_wants_filters_by_peer() {
        let registry = WantRegistry::new();
        let id1 = cid(b"one");
        let id2 = cid(b"two");
        let alice = peer("alice");
        let bob = peer("bob");
        let (_h1, _) = registry.want(&id1, &alice);
        let (_h2, _) = registry.want(&id2, &alice);
        let (_h3, _) = registry.want(&id2, &bob);

        let mut alice_wants = registry.peer_wants(&alice);
        alice_wants.sort();
        let mut expected = vec![id1, id2.clone()];
        expected.sort();
        assert_eq!(alice_wants, expected);
        assert_eq!(registry.peer_wants(&bob), vec![id2]);
    }

    #[tokio::test]
    async fn clear_cancels_everything() {
        let registry = WantRegistry::new();
        let (h1, _) = registry.want(&cid(b"x"), &peer("a"));
        let (h2, _) = registry.want(&cid(b"y"), &peer("a"));
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(matches!(h1.wait().await, Err(SwapError::Cancelled)));
        assert!(matches!(h2.wait().await, Err(SwapError::Cancelled)));
    }
}
