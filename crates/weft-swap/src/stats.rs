//! Aggregate exchange counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use weft_types::{Cid, PeerId};

/// Monotonic counters for the engine lifetime; reset only on start.
#[derive(Default)]
pub struct SwapCounters {
    blocks_received: AtomicU64,
    blocks_sent: AtomicU64,
    data_received: AtomicU64,
    data_sent: AtomicU64,
    dup_blocks_received: AtomicU64,
    dup_data_received: AtomicU64,
}

impl SwapCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_received(&self, bytes: u64) {
        self.blocks_received.fetch_add(1, Ordering::Relaxed);
        self.data_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn note_duplicate(&self, bytes: u64) {
        self.dup_blocks_received.fetch_add(1, Ordering::Relaxed);
        self.dup_data_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn note_sent(&self, bytes: u64) {
        self.blocks_sent.fetch_add(1, Ordering::Relaxed);
        self.data_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.blocks_received.store(0, Ordering::Relaxed);
        self.blocks_sent.store(0, Ordering::Relaxed);
        self.data_received.store(0, Ordering::Relaxed);
        self.data_sent.store(0, Ordering::Relaxed);
        self.dup_blocks_received.store(0, Ordering::Relaxed);
        self.dup_data_received.store(0, Ordering::Relaxed);
    }

    /// Snapshot the counters together with the current want-list and
    /// peer set.
    pub fn snapshot(&self, wantlist: Vec<Cid>, peers: Vec<PeerId>) -> SwapStats {
        SwapStats {
            blocks_received: self.blocks_received.load(Ordering::Relaxed),
            blocks_sent: self.blocks_sent.load(Ordering::Relaxed),
            data_received: self.data_received.load(Ordering::Relaxed),
            data_sent: self.data_sent.load(Ordering::Relaxed),
            dup_blocks_received: self.dup_blocks_received.load(Ordering::Relaxed),
            dup_data_received: self.dup_data_received.load(Ordering::Relaxed),
            wantlist,
            peers,
        }
    }
}

/// A point-in-time view of exchange activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapStats {
    pub blocks_received: u64,
    pub blocks_sent: u64,
    pub data_received: u64,
    pub data_sent: u64,
    pub dup_blocks_received: u64,
    pub dup_data_received: u64,
    pub wantlist: Vec<Cid>,
    pub peers: Vec<PeerId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let counters = SwapCounters::new();
        counters.note_received(100);
        counters.note_received(20);
        counters.note_duplicate(20);
        counters.note_sent(5);

        let stats = counters.snapshot(Vec::new(), Vec::new());
        assert_eq!(stats.blocks_received, 2);
        assert_eq!(stats.data_received, 120);
        assert_eq!(stats.dup_blocks_received, 1);
        assert_eq!(stats.dup_data_received, 20);
        assert_eq!(stats.blocks_sent, 1);
        assert_eq!(stats.data_sent, 5);
    }

    #[test]
    fn reset_zeroes_everything() {
        let counters = SwapCounters::new();
        counters.note_received(10);
        counters.note_sent(10);
        counters.reset();
        let stats = counters.snapshot(Vec::new(), Vec::new());
        assert_eq!(stats.blocks_received, 0);
        assert_eq!(stats.data_sent, 0);
    }

    #[test]
    fn concurrent_fetch_adds() {
        use std::sync::Arc;
        use std::thread;

        let counters = Arc::new(SwapCounters::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..250 {
                        counters.note_received(2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = counters.snapshot(Vec::new(), Vec::new());
        assert_eq!(stats.blocks_received, 1000);
        assert_eq!(stats.data_received, 2000);
    }

    #[test]
    fn snapshot_serializes() {
        let counters = SwapCounters::new();
        let stats = counters.snapshot(Vec::new(), vec![PeerId::new("p")]);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"peers\":[\"p\"]"));
    }
}
