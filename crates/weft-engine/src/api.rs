//! Grouped operation handles exposed by the facade.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use weft_files::{
    list, AddOptions, ChunkedReader, FileAdder, FileSystemEntry, FileSystemNode,
};
use weft_store::{BlockService, BlockStore, StoreStat};
use weft_swap::{Ledger, Router, SwapEngine, SwapStats};
use weft_types::{Cid, Codec, DataBlock, HashAlgorithm, PeerId};

use crate::engine::EngineRunning;
use crate::error::EngineResult;

/// Size and identity of a stored block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStat {
    pub id: Cid,
    pub size: u64,
}

/// Total bytes moved through the exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Block operations over the exchange-aware service.
#[derive(Clone)]
pub struct BlockApi {
    pub(crate) store: Arc<dyn BlockStore>,
    pub(crate) service: Arc<dyn BlockService>,
}

impl BlockApi {
    /// Fetch a block, waiting on the exchange if it is not local.
    pub async fn get(&self, id: &Cid, cancel: CancellationToken) -> EngineResult<DataBlock> {
        Ok(self.service.get(id, cancel).await?)
    }

    /// Store user bytes under their content address.
    pub async fn put(
        &self,
        data: Bytes,
        codec: Codec,
        hash: HashAlgorithm,
    ) -> EngineResult<Cid> {
        let block = DataBlock::from_content(codec, hash, data);
        Ok(self.service.put(block).await?)
    }

    /// Local-only size lookup; `None` if the block is absent.
    pub async fn stat(&self, id: &Cid) -> EngineResult<Option<BlockStat>> {
        Ok(self.store.len_of(id).await?.map(|size| BlockStat {
            id: id.clone(),
            size,
        }))
    }

    pub async fn remove(&self, id: &Cid) -> EngineResult<bool> {
        Ok(self.store.remove(id).await?)
    }

    pub async fn names(&self) -> EngineResult<Vec<Cid>> {
        Ok(self.store.names().await?)
    }
}

/// File-system operations.
#[derive(Clone)]
pub struct FilesApi {
    pub(crate) service: Arc<dyn BlockService>,
    pub(crate) adder: Arc<FileAdder>,
    pub(crate) pins: Arc<RwLock<HashSet<Cid>>>,
    pub(crate) state: Arc<Mutex<Option<EngineRunning>>>,
    pub(crate) defaults: AddOptions,
}

impl FilesApi {
    /// Chunk a stream into a DAG; pin and advertise the root when the
    /// options ask for it.
    pub async fn add_stream<R>(
        &self,
        reader: R,
        name: &str,
        options: &AddOptions,
    ) -> EngineResult<FileSystemNode>
    where
        R: tokio::io::AsyncRead + Unpin + Send,
    {
        let root = self.adder.add_stream(reader, name, options).await?;
        if options.pin && !options.only_hash {
            self.pin_and_advertise(&root.id);
        }
        Ok(root)
    }

    pub async fn add_data(&self, data: &[u8], name: &str) -> EngineResult<FileSystemNode> {
        let defaults = self.defaults.clone();
        self.add_stream(data, name, &defaults).await
    }

    pub async fn add_file(
        &self,
        path: impl AsRef<std::path::Path>,
        options: &AddOptions,
    ) -> EngineResult<FileSystemNode> {
        let root = self.adder.add_file(path, options).await?;
        if options.pin && !options.only_hash {
            self.pin_and_advertise(&root.id);
        }
        Ok(root)
    }

    pub async fn add_directory(
        &self,
        path: impl AsRef<std::path::Path>,
        recursive: bool,
        options: &AddOptions,
    ) -> EngineResult<FileSystemNode> {
        let root = self.adder.add_directory(path, recursive, options).await?;
        if options.pin && !options.only_hash {
            self.pin_and_advertise(&root.id);
        }
        Ok(root)
    }

    /// Open a random-access reader over a file DAG.
    pub async fn read(&self, id: &Cid, cancel: CancellationToken) -> EngineResult<ChunkedReader> {
        Ok(ChunkedReader::open(Arc::clone(&self.service), id, cancel).await?)
    }

    /// Convenience: read a whole file into memory.
    pub async fn read_to_vec(&self, id: &Cid, cancel: CancellationToken) -> EngineResult<Vec<u8>> {
        let mut reader = self.read(id, cancel).await?;
        Ok(reader.read_to_vec().await?)
    }

    /// Describe a file or directory.
    pub async fn list(&self, id: &Cid, cancel: CancellationToken) -> EngineResult<FileSystemEntry> {
        Ok(list(&self.service, id, cancel).await?)
    }

    /// Pin the root; advertise it via the router when the engine is
    /// running. Advertisement is fire-and-forget.
    fn pin_and_advertise(&self, id: &Cid) {
        self.pins
            .write()
            .expect("lock poisoned")
            .insert(id.clone());
        let running = self.state.lock().expect("lock poisoned");
        if let Some(running) = running.as_ref() {
            let router = Arc::clone(&running.router);
            let cancel = running.stop.child_token();
            let id = id.clone();
            tokio::spawn(async move {
                if let Err(e) = router.provide(&id, true, cancel).await {
                    warn!(id = %id, error = %e, "failed to advertise root");
                }
            });
        }
    }
}

/// Want-list and ledger views of the exchange engine.
#[derive(Clone)]
pub struct SwapApi {
    pub(crate) swap: Arc<SwapEngine>,
}

impl SwapApi {
    /// All CIDs currently wanted.
    pub fn wants(&self) -> Vec<Cid> {
        self.swap.wants()
    }

    /// CIDs a particular peer has expressed interest in.
    pub fn peer_wants(&self, peer: &PeerId) -> Vec<Cid> {
        self.swap.peer_wants(peer)
    }

    /// Drop a want entirely, cancelling its waiters.
    pub fn unwant(&self, id: &Cid) -> usize {
        self.swap.unwant(id)
    }

    pub fn ledger_for(&self, peer: &PeerId) -> Ledger {
        self.swap.ledger_for(peer)
    }

    pub fn statistics(&self) -> SwapStats {
        self.swap.statistics()
    }
}

/// Aggregated statistics views.
#[derive(Clone)]
pub struct StatsApi {
    pub(crate) store: Arc<dyn BlockStore>,
    pub(crate) swap: Arc<SwapEngine>,
}

impl StatsApi {
    pub fn bitswap(&self) -> SwapStats {
        self.swap.statistics()
    }

    pub async fn repository(&self) -> EngineResult<StoreStat> {
        Ok(self.store.stat().await?)
    }

    pub fn bandwidth(&self) -> BandwidthStats {
        let stats = self.swap.statistics();
        BandwidthStats {
            bytes_in: stats.data_received,
            bytes_out: stats.data_sent,
        }
    }
}
