//! Listing file-system entries.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use weft_dag::DagNode;
use weft_store::BlockService;
use weft_types::{Cid, Codec};

use crate::error::FilesResult;

/// One link out of a listed entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemLink {
    pub name: String,
    pub id: Cid,
    pub size: u64,
}

/// A listed file or directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemEntry {
    pub id: Cid,
    pub is_directory: bool,
    /// Content size in bytes (sum of children for directories).
    pub size: u64,
    pub links: Vec<FileSystemLink>,
}

/// Describe the object behind `id`.
pub async fn list(
    service: &Arc<dyn BlockService>,
    id: &Cid,
    cancel: CancellationToken,
) -> FilesResult<FileSystemEntry> {
    let block = service.get(id, cancel).await?;
    if id.codec() == Codec::Raw {
        return Ok(FileSystemEntry {
            id: id.clone(),
            is_directory: false,
            size: block.size(),
            links: Vec::new(),
        });
    }
    let node = DagNode::from_bytes(block.data())?;
    let fs = node.unixfs()?;
    let links = node
        .links()
        .iter()
        .map(|l| FileSystemLink {
            name: l.name.clone(),
            id: l.id.clone(),
            size: l.size,
        })
        .collect::<Vec<_>>();
    let size = match fs.file_size() {
        Some(size) => size,
        None => links.iter().map(|l| l.size).sum(),
    };
    Ok(FileSystemEntry {
        id: id.clone(),
        is_directory: fs.is_directory(),
        size,
        links,
    })
}
