//! The exchange-aware block service.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use weft_store::{BlockService, BlockStore, StoreError, StoreResult};
use weft_swap::{Swarm, SwapEngine, SwapError};
use weft_types::{Cid, DataBlock, PeerId};

/// Closes the loop between the store and the exchange.
///
/// `get` serves store hits directly; a miss registers a want and
/// suspends until a peer pushes the block. `put` persists and then
/// resolves waiters — the atomic transition that keeps a CID from
/// being simultaneously wanted and stored.
pub struct ExchangeBlockService {
    store: Arc<dyn BlockStore>,
    swap: Arc<SwapEngine>,
}

impl ExchangeBlockService {
    pub fn new(store: Arc<dyn BlockStore>, swap: Arc<SwapEngine>) -> Self {
        Self { store, swap }
    }

    fn requester(&self) -> PeerId {
        self.swap
            .swarm()
            .map(|swarm| swarm.local_peer())
            .unwrap_or_else(|_| PeerId::new("local"))
    }
}

fn map_swap_error(err: SwapError) -> StoreError {
    match err {
        SwapError::Cancelled => StoreError::Cancelled,
        SwapError::Store(e) => e,
        other => StoreError::Exchange(other.to_string()),
    }
}

#[async_trait]
impl BlockService for ExchangeBlockService {
    async fn get(&self, id: &Cid, cancel: CancellationToken) -> StoreResult<DataBlock> {
        if let Some(block) = self.store.try_get(id).await? {
            return Ok(block);
        }
        self.swap
            .want_async(id, &self.requester(), cancel)
            .await
            .map_err(map_swap_error)
    }

    async fn try_get_local(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
        self.store.try_get(id).await
    }

    async fn put(&self, block: DataBlock) -> StoreResult<Cid> {
        self.store.put(&block).await?;
        self.swap.found(block.id(), &block);
        Ok(block.id().clone())
    }

    async fn exists(&self, id: &Cid) -> StoreResult<bool> {
        self.store.exists(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use weft_store::MemoryBlockStore;
    use weft_types::{Codec, HashAlgorithm};

    fn wired() -> (Arc<ExchangeBlockService>, Arc<SwapEngine>) {
        let swap = SwapEngine::new();
        let service = Arc::new(ExchangeBlockService::new(
            Arc::new(MemoryBlockStore::new()) as Arc<dyn BlockStore>,
            Arc::clone(&swap),
        ));
        swap.set_block_service(Arc::clone(&service) as Arc<dyn BlockService>);
        (service, swap)
    }

    fn raw_block(data: &'static [u8]) -> DataBlock {
        DataBlock::from_content(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(data))
    }

    #[tokio::test]
    async fn local_hit_skips_the_exchange() {
        let (service, swap) = wired();
        let block = raw_block(b"local");
        service.put(block.clone()).await.unwrap();

        let got = service
            .get(block.id(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got.data(), block.data());
        assert!(swap.wants().is_empty());
    }

    #[tokio::test]
    async fn miss_registers_a_want_until_put() {
        let (service, swap) = wired();
        let block = raw_block(b"late");
        let id = block.id().clone();

        let getter = {
            let service = Arc::clone(&service);
            let id = id.clone();
            tokio::spawn(async move { service.get(&id, CancellationToken::new()).await })
        };
        tokio::task::yield_now().await;
        assert!(swap.wants().contains(&id));

        // A put transitions the CID from wanted to stored atomically.
        service.put(block.clone()).await.unwrap();
        let got = getter.await.unwrap().unwrap();
        assert_eq!(got.data(), block.data());
        assert!(swap.wants().is_empty());
        assert!(service.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_miss_maps_to_store_cancelled() {
        let (service, _swap) = wired();
        let id = raw_block(b"never").id().clone();
        let token = CancellationToken::new();

        let getter = {
            let service = Arc::clone(&service);
            let id = id.clone();
            let token = token.clone();
            tokio::spawn(async move { service.get(&id, token).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        assert!(matches!(
            getter.await.unwrap(),
            Err(StoreError::Cancelled)
        ));
    }
}
