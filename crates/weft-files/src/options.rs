use serde::{Deserialize, Serialize};

use weft_types::HashAlgorithm;

/// Default chunking window: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Maximum children per interior DAG node.
pub const FANOUT: usize = 174;

/// Options for adding a stream to the file system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddOptions {
    /// Fixed window size for chunking.
    pub chunk_size: usize,
    /// Emit bare `raw` blocks as leaves instead of wrapped DAG nodes.
    pub raw_leaves: bool,
    /// Wrap the result in a directory carrying the supplied name.
    pub wrap: bool,
    /// Pin the root (and advertise it when the engine is running).
    pub pin: bool,
    /// Compute CIDs without persisting anything.
    pub only_hash: bool,
    /// Trickle-tree layout; not implemented.
    pub trickle: bool,
    /// Hash algorithm for every produced block.
    pub hash: HashAlgorithm,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            raw_leaves: false,
            wrap: false,
            pin: true,
            only_hash: false,
            trickle: false,
            hash: HashAlgorithm::Sha2_256,
        }
    }
}

impl AddOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn wrapped(mut self) -> Self {
        self.wrap = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = AddOptions::default();
        assert_eq!(opts.chunk_size, 256 * 1024);
        assert!(!opts.raw_leaves);
        assert!(!opts.wrap);
        assert!(opts.pin);
        assert!(!opts.only_hash);
        assert!(!opts.trickle);
        assert_eq!(opts.hash, HashAlgorithm::Sha2_256);
    }

    #[test]
    fn serde_uses_algorithm_names() {
        let opts = AddOptions::default();
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"hash\":\"sha2-256\""));
        let back: AddOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash, HashAlgorithm::Sha2_256);
    }
}
