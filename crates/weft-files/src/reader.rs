//! Random-access byte streams over file DAGs.

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use weft_dag::DagNode;
use weft_store::BlockService;
use weft_types::{Cid, Codec};

use crate::error::{FilesError, FilesResult};

struct BlockSlot {
    id: Cid,
    /// Absolute byte offset of this sub-DAG within the file.
    offset: u64,
}

enum Fetched {
    Leaf(Bytes),
    /// `(child id, child content size)` pairs, builder order.
    Interior(Vec<(Cid, u64)>),
}

/// A seekable, byte-accurate read stream over a file DAG.
///
/// The slot table starts as the root's children, located by the
/// prefix sums of its recorded block sizes. A slot that turns out to
/// be an interior node is expanded in place into its children, so
/// DAGs of any depth read with memory proportional to the expanded
/// spine. One leaf is cached at a time; every fetch is an independent
/// [`BlockService::get`] and may wait on the exchange.
pub struct ChunkedReader {
    service: Arc<dyn BlockService>,
    cancel: CancellationToken,
    slots: Vec<BlockSlot>,
    length: u64,
    position: u64,
    cache: Option<(Cid, Bytes)>,
}

impl std::fmt::Debug for ChunkedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedReader")
            .field("slot_count", &self.slots.len())
            .field("length", &self.length)
            .field("position", &self.position)
            .field("cache", &self.cache)
            .finish()
    }
}

impl ChunkedReader {
    /// Open a reader over the DAG rooted at `root`.
    pub async fn open(
        service: Arc<dyn BlockService>,
        root: &Cid,
        cancel: CancellationToken,
    ) -> FilesResult<Self> {
        let block = service.get(root, cancel.child_token()).await?;
        let mut reader = Self {
            service,
            cancel,
            slots: Vec::new(),
            length: 0,
            position: 0,
            cache: None,
        };

        if root.codec() == Codec::Raw {
            reader.length = block.size();
            reader.slots.push(BlockSlot {
                id: root.clone(),
                offset: 0,
            });
            reader.cache = Some((root.clone(), block.data().clone()));
            return Ok(reader);
        }

        let node = DagNode::from_bytes(block.data())?;
        let fs = node.unixfs()?;
        if fs.is_directory() {
            return Err(FilesError::NotAFile(root.clone()));
        }
        if node.links().is_empty() {
            let data = fs.data().cloned().unwrap_or_default();
            reader.length = fs.file_size().unwrap_or(data.len() as u64);
            reader.slots.push(BlockSlot {
                id: root.clone(),
                offset: 0,
            });
            reader.cache = Some((root.clone(), data));
            return Ok(reader);
        }

        if fs.block_sizes().len() != node.links().len() {
            return Err(FilesError::InvalidNode(format!(
                "{} links but {} block sizes",
                node.links().len(),
                fs.block_sizes().len()
            )));
        }
        let mut offset = 0;
        for (link, size) in node.links().iter().zip(fs.block_sizes()) {
            reader.slots.push(BlockSlot {
                id: link.id.clone(),
                offset,
            });
            offset += size;
        }
        reader.length = fs.file_size().unwrap_or(offset);
        Ok(reader)
    }

    /// Total file length in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the logical position. Seeking past the end is allowed;
    /// subsequent reads return no bytes.
    pub fn seek(&mut self, pos: SeekFrom) -> FilesResult<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(d) => self.position.checked_add_signed(d),
            SeekFrom::End(d) => self.length.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.position = p;
                Ok(p)
            }
            None => Err(FilesError::NegativeSeek),
        }
    }

    /// Read up to `buf.len()` bytes at the current position.
    pub async fn read(&mut self, buf: &mut [u8]) -> FilesResult<usize> {
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        let (offset, bytes) = self.leaf_at(self.position).await?;
        let intra = (self.position - offset) as usize;
        if intra >= bytes.len() {
            // Recorded sizes promised more bytes than the leaf holds.
            return Ok(0);
        }
        let n = buf.len().min(bytes.len() - intra);
        buf[..n].copy_from_slice(&bytes[intra..intra + n]);
        self.position += n as u64;
        Ok(n)
    }

    /// Read from the current position to the end of the file.
    pub async fn read_to_vec(&mut self) -> FilesResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.length.saturating_sub(self.position) as usize);
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    /// The reader is read-only.
    pub fn write(&mut self, _buf: &[u8]) -> FilesResult<usize> {
        Err(FilesError::Unsupported("write"))
    }

    /// The reader is read-only.
    pub fn set_len(&mut self, _len: u64) -> FilesResult<()> {
        Err(FilesError::Unsupported("set_len"))
    }

    /// Resolve the leaf covering `position`, expanding interior nodes
    /// in place as they are discovered.
    async fn leaf_at(&mut self, position: u64) -> FilesResult<(u64, Bytes)> {
        loop {
            let index = self.locate(position);
            let (id, offset) = {
                let slot = &self.slots[index];
                (slot.id.clone(), slot.offset)
            };
            if let Some((cached_id, bytes)) = &self.cache {
                if *cached_id == id {
                    return Ok((offset, bytes.clone()));
                }
            }
            match self.fetch(&id).await? {
                Fetched::Leaf(bytes) => {
                    self.cache = Some((id, bytes.clone()));
                    return Ok((offset, bytes));
                }
                Fetched::Interior(children) => {
                    let mut expansion = Vec::with_capacity(children.len());
                    let mut child_offset = offset;
                    for (child_id, size) in children {
                        expansion.push(BlockSlot {
                            id: child_id,
                            offset: child_offset,
                        });
                        child_offset += size;
                    }
                    self.slots.splice(index..=index, expansion);
                }
            }
        }
    }

    /// Index of the last slot whose offset is at or before `position`.
    fn locate(&self, position: u64) -> usize {
        self.slots
            .partition_point(|slot| slot.offset <= position)
            .saturating_sub(1)
    }

    async fn fetch(&self, id: &Cid) -> FilesResult<Fetched> {
        let block = self.service.get(id, self.cancel.child_token()).await?;
        if id.codec() == Codec::Raw {
            return Ok(Fetched::Leaf(block.data().clone()));
        }
        let node = DagNode::from_bytes(block.data())?;
        if node.links().is_empty() {
            let fs = node.unixfs()?;
            return Ok(Fetched::Leaf(fs.data().cloned().unwrap_or_default()));
        }
        let fs = node.unixfs()?;
        if fs.block_sizes().len() != node.links().len() {
            return Err(FilesError::InvalidNode(format!(
                "{} links but {} block sizes",
                node.links().len(),
                fs.block_sizes().len()
            )));
        }
        Ok(Fetched::Interior(
            node.links()
                .iter()
                .zip(fs.block_sizes())
                .map(|(link, size)| (link.id.clone(), *size))
                .collect(),
        ))
    }
}
