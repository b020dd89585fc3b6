//! On-disk block store: one file per block, named by its multihash.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use async_trait::async_trait;
use weft_dag::{empty_directory, empty_directory_cid, empty_node_cid};
use weft_types::{Cid, Codec, DataBlock, Multihash};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlockStore, StoreStat};

const FILENAME_BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// A block store rooted at a directory.
///
/// Each block lives in a single file named by the unpadded base32 of
/// its multihash bytes (case-insensitive, collision-free under the
/// hash). Writes land in a temp sibling and are renamed into place, so
/// a failed write never leaves a partial block. A process-wide
/// reader/writer lock admits any number of readers or one writer.
pub struct FsBlockStore {
    config: StoreConfig,
    lock: RwLock<()>,
    tmp_seq: AtomicU64,
}

impl FsBlockStore {
    /// Open (creating if needed) a store at `config.root`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.root)?;
        Ok(Self {
            config,
            lock: RwLock::new(()),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The file name for a key: base32 of the multihash bytes.
    pub fn key_for(id: &Cid) -> String {
        base32::encode(FILENAME_BASE32, &id.hash().to_bytes())
    }

    fn path_for(&self, id: &Cid) -> PathBuf {
        self.config.root.join(Self::key_for(id))
    }

    /// Serve the fixed sentinels and identity CIDs without touching
    /// disk.
    pub(crate) fn virtual_block_for(id: &Cid) -> Option<DataBlock> {
        if id.is_identity() {
            return Some(DataBlock::new(id.clone(), id.hash().digest().clone()));
        }
        if id == empty_node_cid() {
            return Some(DataBlock::new(id.clone(), Bytes::new()));
        }
        if id == empty_directory_cid() {
            return Some(DataBlock::new(id.clone(), empty_directory().to_bytes()));
        }
        None
    }

    fn size_limit(&self, id: &Cid) -> u64 {
        match id.codec() {
            Codec::DagPb => self.config.max_dag_block_size,
            _ => self.config.max_block_size,
        }
    }

    fn decode_name(name: &str) -> Option<Cid> {
        if name.starts_with(".tmp-") {
            return None;
        }
        let bytes = base32::decode(FILENAME_BASE32, &name.to_uppercase())?;
        let mh = Multihash::from_bytes(&bytes).ok()?;
        Some(Cid::new_v1(Codec::Raw, mh))
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> StoreResult<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .config
            .root
            .join(format!(".tmp-{}-{seq}", std::process::id()));
        if let Err(e) = tokio::fs::write(&tmp, data).await {
            // Never leave a partial file behind.
            if let Err(rm) = tokio::fs::remove_file(&tmp).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(tmp = %tmp.display(), error = %rm, "failed to clean up temp block");
                }
            }
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl BlockStore for FsBlockStore {
    async fn put(&self, block: &DataBlock) -> StoreResult<()> {
        if Self::virtual_block_for(block.id()).is_some() {
            return Ok(());
        }
        let limit = self.size_limit(block.id());
        if block.size() > limit {
            return Err(StoreError::BlockTooLarge {
                size: block.size(),
                limit,
            });
        }
        let path = self.path_for(block.id());
        let _write = self.lock.write().await;
        self.write_atomic(&path, block.data()).await?;
        debug!(id = %block.id(), size = block.size(), "block stored");
        Ok(())
    }

    async fn try_get(&self, id: &Cid) -> StoreResult<Option<DataBlock>> {
        if let Some(block) = Self::virtual_block_for(id) {
            return Ok(Some(block));
        }
        let path = self.path_for(id);
        let _read = self.lock.read().await;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !id.hash().verify(&data) {
            return Err(StoreError::CorruptBlock(id.clone()));
        }
        Ok(Some(DataBlock::new(id.clone(), data)))
    }

    async fn exists(&self, id: &Cid) -> StoreResult<bool> {
        if Self::virtual_block_for(id).is_some() {
            return Ok(true);
        }
        let path = self.path_for(id);
        let _read = self.lock.read().await;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn len_of(&self, id: &Cid) -> StoreResult<Option<u64>> {
        if let Some(block) = Self::virtual_block_for(id) {
            return Ok(Some(block.size()));
        }
        let path = self.path_for(id);
        let _read = self.lock.read().await;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &Cid) -> StoreResult<bool> {
        if Self::virtual_block_for(id).is_some() {
            // Virtual blocks have no on-disk representation.
            return Ok(false);
        }
        let path = self.path_for(id);
        let _write = self.lock.write().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(id = %id, "block removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn names(&self) -> StoreResult<Vec<Cid>> {
        let _read = self.lock.read().await;
        let mut dir = tokio::fs::read_dir(&self.config.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(cid) = Self::decode_name(name) {
                names.push(cid);
            }
        }
        Ok(names)
    }

    async fn stat(&self) -> StoreResult<StoreStat> {
        let _read = self.lock.read().await;
        let mut dir = tokio::fs::read_dir(&self.config.root).await?;
        let mut stat = StoreStat::default();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if Self::decode_name(name).is_none() {
                continue;
            }
            stat.blocks += 1;
            stat.bytes += entry.metadata().await?.len();
        }
        Ok(stat)
    }
}
