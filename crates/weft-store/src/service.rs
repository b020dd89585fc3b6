//! The seam between local storage and the block-exchange loop.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use weft_types::{Cid, DataBlock};

use crate::error::StoreResult;
use crate::traits::BlockStore;

/// Block access that may reach beyond the local store.
///
/// [`BlockService::get`] is allowed to suspend until the block arrives
/// from the network; the `try_get_local` and `exists` paths never do.
/// `put` is where a newly arrived block becomes visible: implementations
/// that participate in the exchange loop persist the block *and* resolve
/// any waiters registered for its CID.
#[async_trait]
pub trait BlockService: Send + Sync {
    /// Fetch a block, waiting on the exchange if it is not local.
    async fn get(&self, id: &Cid, cancel: CancellationToken) -> StoreResult<DataBlock>;

    /// Fetch a block only if it is locally available.
    async fn try_get_local(&self, id: &Cid) -> StoreResult<Option<DataBlock>>;

    /// Persist a block and make it visible to waiters.
    async fn put(&self, block: DataBlock) -> StoreResult<Cid>;

    /// Whether the block is locally available.
    async fn exists(&self, id: &Cid) -> StoreResult<bool>;
}

/// A [`BlockService`] backed only by a local store.
///
/// `get` never waits for the network; a miss is [`StoreError::NotFound`].
/// Used by the DAG builder (which only writes) and by hash-only import
/// together with [`NullBlockStore`].
///
/// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
/// [`NullBlockStore`]: crate::memory::NullBlockStore
pub struct StoreService {
    store: Arc<dyn BlockStore>,
}

impl StoreService {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }
}

#[async_trait]
impl BlockService for StoreService {
    async fn get(&self, id: &Cid, _cancel: CancellationToken) -> StoreResult<DataBlock> {
        self.store.get(id).await
    }

    async fn try_get_local(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
        self.store.try_get(id).await
    }

    async fn put(&self, block: DataBlock) -> StoreResult<Cid> {
        self.store.put(&block).await?;
        Ok(block.id().clone())
    }

    async fn exists(&self, id: &Cid) -> StoreResult<bool> {
        self.store.exists(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::{MemoryBlockStore, NullBlockStore};
    use bytes::Bytes;
    use weft_types::{Codec, HashAlgorithm};

    #[tokio::test]
    async fn store_service_roundtrip() {
        let service = StoreService::new(Arc::new(MemoryBlockStore::new()));
        let block = DataBlock::from_content(
            Codec::Raw,
            HashAlgorithm::Sha2_256,
            Bytes::from_static(b"via service"),
        );
        let id = service.put(block.clone()).await.unwrap();
        assert_eq!(&id, block.id());

        let back = service.get(&id, CancellationToken::new()).await.unwrap();
        assert_eq!(back.data(), block.data());
        assert!(service.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn store_service_miss_is_not_found() {
        let service = StoreService::new(Arc::new(MemoryBlockStore::new()));
        let id = Cid::for_content(Codec::Raw, HashAlgorithm::Sha2_256, b"absent");
        let err = service.get(&id, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(service.try_get_local(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hash_only_service_computes_without_persisting() {
        let service = StoreService::new(Arc::new(NullBlockStore::new()));
        let block = DataBlock::from_content(
            Codec::Raw,
            HashAlgorithm::Sha2_256,
            Bytes::from_static(b"ephemeral"),
        );
        let id = service.put(block).await.unwrap();
        assert!(!service.exists(&id).await.unwrap());
    }
}
