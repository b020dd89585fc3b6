//! In-memory block stores for tests, embedding, and hash-only import.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use weft_types::{Cid, DataBlock};

use crate::error::StoreResult;
use crate::fs::FsBlockStore;
use crate::traits::{BlockStore, StoreStat};

/// `HashMap`-based block store.
///
/// Intended for tests and embedding. Blocks are held behind a `RwLock`;
/// the virtual-block rules match [`FsBlockStore`].
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Cid, DataBlock>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put(&self, block: &DataBlock) -> StoreResult<()> {
        if block.id().is_identity() {
            return Ok(());
        }
        self.blocks
            .write()
            .expect("lock poisoned")
            .insert(block.id().clone(), block.clone());
        Ok(())
    }

    async fn try_get(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
        if let Some(block) = virtual_block(id) {
            return Ok(Some(block));
        }
        Ok(self.blocks.read().expect("lock poisoned").get(id).cloned())
    }

    async fn exists(&self, id: &Cid) -> StoreResult<bool> {
        if virtual_block(id).is_some() {
            return Ok(true);
        }
        Ok(self.blocks.read().expect("lock poisoned").contains_key(id))
    }

    async fn len_of(&self, id: &Cid) -> StoreResult<Option<u64>> {
        if let Some(block) = virtual_block(id) {
            return Ok(Some(block.size()));
        }
        Ok(self
            .blocks
            .read()
            .expect("lock poisoned")
            .get(id)
            .map(DataBlock::size))
    }

    async fn remove(&self, id: &Cid) -> StoreResult<bool> {
        if virtual_block(id).is_some() {
            return Ok(false);
        }
        Ok(self
            .blocks
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some())
    }

    async fn names(&self) -> StoreResult<Vec<Cid>> {
        let mut names: Vec<Cid> = self
            .blocks
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stat(&self) -> StoreResult<StoreStat> {
        let blocks = self.blocks.read().expect("lock poisoned");
        Ok(StoreStat {
            blocks: blocks.len() as u64,
            bytes: blocks.values().map(DataBlock::size).sum(),
        })
    }
}

fn virtual_block(id: &Cid) -> Option<DataBlock> {
    // Reuse the disk store's sentinel rules so backends agree.
    if id.is_identity() || id == weft_dag::empty_node_cid() || id == weft_dag::empty_directory_cid()
    {
        return FsBlockStore::virtual_block_for(id);
    }
    None
}

/// A store that accepts writes and forgets them.
///
/// Backs hash-only import: CIDs are computed, nothing is persisted.
#[derive(Default)]
pub struct NullBlockStore;

impl NullBlockStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlockStore for NullBlockStore {
    async fn put(&self, _block: &DataBlock) -> StoreResult<()> {
        Ok(())
    }

    async fn try_get(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
        Ok(virtual_block(id))
    }

    async fn exists(&self, id: &Cid) -> StoreResult<bool> {
        Ok(virtual_block(id).is_some())
    }

    async fn len_of(&self, id: &Cid) -> StoreResult<Option<u64>> {
        Ok(virtual_block(id).map(|b| b.size()))
    }

    async fn remove(&self, _id: &Cid) -> StoreResult<bool> {
        Ok(false)
    }

    async fn names(&self) -> StoreResult<Vec<Cid>> {
        Ok(Vec::new())
    }

    async fn stat(&self) -> StoreResult<StoreStat> {
        Ok(StoreStat::default())
    }
}
