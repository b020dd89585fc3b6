use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use weft_types::{Cid, DataBlock};

use crate::error::{StoreError, StoreResult};

/// Aggregate store statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStat {
    /// Number of blocks on disk (virtual blocks excluded).
    pub blocks: u64,
    /// Total payload bytes across those blocks.
    pub bytes: u64,
}

/// A content-addressed, hash-keyed persistent map.
///
/// All implementations must satisfy these invariants:
/// - Every block persisted is discoverable by its CID.
/// - `put` is fail-atomic: on error, no partial state remains.
/// - Any number of concurrent readers, or one writer.
/// - Identity-hashed CIDs and the empty-object sentinels are served
///   without touching storage and are never written.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Persist a block, replacing any existing block with the same key.
    async fn put(&self, block: &DataBlock) -> StoreResult<()>;

    /// Read a block. Returns `Ok(None)` if absent.
    async fn try_get(&self, id: &Cid) -> StoreResult<Option<DataBlock>>;

    /// Read a block, failing with [`StoreError::NotFound`] if absent.
    async fn get(&self, id: &Cid) -> StoreResult<DataBlock> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Whether a block with this key exists.
    async fn exists(&self, id: &Cid) -> StoreResult<bool>;

    /// Payload length of the block, or `None` if absent.
    async fn len_of(&self, id: &Cid) -> StoreResult<Option<u64>>;

    /// Remove a block. Returns `true` if one existed.
    async fn remove(&self, id: &Cid) -> StoreResult<bool>;

    /// Enumerate the keys currently stored.
    ///
    /// Keys are reconstructed from the stored multihashes; since CID
    /// equality is by multihash, they compare equal to the keys used
    /// at `put` time.
    async fn names(&self) -> StoreResult<Vec<Cid>>;

    /// Aggregate block count and byte usage.
    async fn stat(&self) -> StoreResult<StoreStat>;
}
