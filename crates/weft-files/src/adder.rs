//! Stream chunking and balanced DAG building.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use weft_dag::{DagLink, DagNode, UnixFsData};
use weft_store::{BlockService, NullBlockStore, StoreService};
use weft_types::{Cid, Codec, DataBlock, HashAlgorithm};

use crate::error::{FilesError, FilesResult};
use crate::options::{AddOptions, FANOUT};

/// A produced node: its identifier, the file bytes it covers, and the
/// serialized bytes of its sub-DAG.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemNode {
    pub id: Cid,
    /// Content bytes covered by this node.
    pub size: u64,
    /// Serialized bytes of this node plus everything below it.
    pub dag_size: u64,
}

/// Builds file and directory DAGs over a block service.
///
/// Inline-CID behavior follows the store configuration it is
/// constructed with: when enabled, windows at or below the limit get
/// identity CIDs and are never persisted.
pub struct FileAdder {
    service: Arc<dyn BlockService>,
    allow_inline: bool,
    inline_limit: usize,
}

impl FileAdder {
    pub fn new(service: Arc<dyn BlockService>) -> Self {
        Self {
            service,
            allow_inline: false,
            inline_limit: 0,
        }
    }

    pub fn with_inline(mut self, allow: bool, limit: usize) -> Self {
        self.allow_inline = allow;
        self.inline_limit = limit;
        self
    }

    /// Chunk `reader` into a balanced DAG and return its root.
    ///
    /// `name` is used only when `options.wrap` asks for a directory
    /// wrapper. Input I/O errors are fatal; leaves already written
    /// stay written.
    pub async fn add_stream<R>(
        &self,
        mut reader: R,
        name: &str,
        options: &AddOptions,
    ) -> FilesResult<FileSystemNode>
    where
        R: AsyncRead + Unpin + Send,
    {
        if options.trickle {
            return Err(FilesError::Unsupported("trickle"));
        }
        let service = self.effective_service(options);
        let chunk_size = options.chunk_size.max(1);

        let mut leaves = Vec::new();
        let mut window = vec![0u8; chunk_size];
        loop {
            let mut filled = 0;
            while filled < chunk_size {
                let n = reader.read(&mut window[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            let leaf = self
                .make_leaf(Bytes::copy_from_slice(&window[..filled]), options, &service)
                .await?;
            leaves.push(leaf);
            if filled < chunk_size {
                break;
            }
        }
        // An empty stream still yields one (empty) leaf.
        if leaves.is_empty() {
            leaves.push(self.make_leaf(Bytes::new(), options, &service).await?);
        }

        let mut level = leaves;
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(FANOUT));
            for group in level.chunks(FANOUT) {
                next.push(self.make_interior(group, options, &service).await?);
            }
            level = next;
        }
        let root = level
            .pop()
            .expect("chunking produces at least one node");
        debug!(id = %root.id, size = root.size, "stream added");

        if options.wrap {
            return self
                .make_directory(vec![(name.to_string(), root)], options)
                .await;
        }
        Ok(root)
    }

    /// Add an in-memory byte string.
    pub async fn add_data(
        &self,
        data: &[u8],
        name: &str,
        options: &AddOptions,
    ) -> FilesResult<FileSystemNode> {
        self.add_stream(data, name, options).await
    }

    /// Add a file from the local file system.
    pub async fn add_file(
        &self,
        path: impl AsRef<Path>,
        options: &AddOptions,
    ) -> FilesResult<FileSystemNode> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = tokio::fs::File::open(path).await?;
        self.add_stream(file, &name, options).await
    }

    /// Add a local directory: one named, sized link per entry, sorted
    /// by name. Sub-directories are descended when `recursive`.
    pub async fn add_directory(
        &self,
        path: impl AsRef<Path>,
        recursive: bool,
        options: &AddOptions,
    ) -> FilesResult<FileSystemNode> {
        // Recursion through an async fn needs an explicit box.
        self.add_directory_inner(path.as_ref(), recursive, options)
            .await
    }

    fn add_directory_inner<'a>(
        &'a self,
        path: &'a Path,
        recursive: bool,
        options: &'a AddOptions,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = FilesResult<FileSystemNode>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut dir = tokio::fs::read_dir(path).await?;
            let mut entries = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if recursive {
                        let node = self
                            .add_directory_inner(&entry.path(), recursive, options)
                            .await?;
                        entries.push((name, node));
                    }
                } else if file_type.is_file() {
                    let node = self.add_file(entry.path(), options).await?;
                    entries.push((name, node));
                }
            }
            self.make_directory(entries, options).await
        })
    }

    /// Build a directory node over named children.
    pub async fn make_directory(
        &self,
        mut entries: Vec<(String, FileSystemNode)>,
        options: &AddOptions,
    ) -> FilesResult<FileSystemNode> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let links = entries
            .iter()
            .map(|(name, node)| DagLink::new(name.clone(), node.id.clone(), node.size))
            .collect();
        let node = DagNode::with_unixfs(&UnixFsData::directory(), links);
        let bytes = node.to_bytes();
        let id = Cid::for_content(Codec::DagPb, options.hash, &bytes);
        let service = self.effective_service(options);
        service
            .put(DataBlock::new(id.clone(), bytes.clone()))
            .await?;
        Ok(FileSystemNode {
            id,
            size: entries.iter().map(|(_, n)| n.size).sum(),
            dag_size: bytes.len() as u64 + entries.iter().map(|(_, n)| n.dag_size).sum::<u64>(),
        })
    }

    fn effective_service(&self, options: &AddOptions) -> Arc<dyn BlockService> {
        if options.only_hash {
            // Stub service: CIDs are computed, nothing lands anywhere.
            Arc::new(StoreService::new(Arc::new(NullBlockStore::new())))
        } else {
            Arc::clone(&self.service)
        }
    }

    async fn make_leaf(
        &self,
        window: Bytes,
        options: &AddOptions,
        service: &Arc<dyn BlockService>,
    ) -> FilesResult<FileSystemNode> {
        let window_len = window.len() as u64;
        let inline = self.allow_inline && window.len() <= self.inline_limit;

        if options.raw_leaves {
            let algorithm = if inline {
                HashAlgorithm::Identity
            } else {
                options.hash
            };
            let block = DataBlock::from_content(Codec::Raw, algorithm, window);
            let id = service.put(block).await?;
            return Ok(FileSystemNode {
                id,
                size: window_len,
                dag_size: window_len,
            });
        }

        let payload = if inline {
            UnixFsData::raw(window)
        } else {
            UnixFsData::file_leaf(window)
        };
        let node = DagNode::with_unixfs(&payload, Vec::new());
        let bytes = node.to_bytes();
        let algorithm = if inline {
            HashAlgorithm::Identity
        } else {
            options.hash
        };
        let id = Cid::for_content(Codec::DagPb, algorithm, &bytes);
        service
            .put(DataBlock::new(id.clone(), bytes.clone()))
            .await?;
        Ok(FileSystemNode {
            id,
            size: window_len,
            dag_size: bytes.len() as u64,
        })
    }

    async fn make_interior(
        &self,
        children: &[FileSystemNode],
        options: &AddOptions,
        service: &Arc<dyn BlockService>,
    ) -> FilesResult<FileSystemNode> {
        let payload = UnixFsData::file_interior(children.iter().map(|c| c.size).collect());
        let links = children
            .iter()
            .map(|c| DagLink::new("", c.id.clone(), c.size))
            .collect();
        let node = DagNode::with_unixfs(&payload, links);
        let bytes = node.to_bytes();
        let id = Cid::for_content(Codec::DagPb, options.hash, &bytes);
        service
            .put(DataBlock::new(id.clone(), bytes.clone()))
            .await?;
        Ok(FileSystemNode {
            id,
            size: children.iter().map(|c| c.size).sum(),
            dag_size: bytes.len() as u64 + children.iter().map(|c| c.dag_size).sum::<u64>(),
        })
    }
}
