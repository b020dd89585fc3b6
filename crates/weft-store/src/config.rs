use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cap for user-supplied blocks: 1 MiB.
pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 1024 * 1024;

/// Default cap for builder-constructed DAG nodes: 4 MiB.
pub const DEFAULT_MAX_DAG_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Default inline-CID threshold in bytes.
pub const DEFAULT_INLINE_CID_LIMIT: usize = 32;

/// Configuration for a block store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per block.
    pub root: PathBuf,
    /// Maximum accepted size for raw user blocks.
    pub max_block_size: u64,
    /// Maximum accepted size for dag-pb blocks.
    pub max_dag_block_size: u64,
    /// Blocks at or below this size may use identity CIDs.
    pub inline_cid_limit: usize,
    /// Whether the builder produces identity CIDs at all.
    pub allow_inline_cid: bool,
}

impl StoreConfig {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blocks"),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_dag_block_size: DEFAULT_MAX_DAG_BLOCK_SIZE,
            inline_cid_limit: DEFAULT_INLINE_CID_LIMIT,
            allow_inline_cid: false,
        }
    }
}
