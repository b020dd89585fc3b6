//! File-system structure over content-addressed blocks.
//!
//! The [`FileAdder`] turns byte streams into balanced Merkle DAGs:
//! fixed-size windows become leaves, bundles of up to [`FANOUT`]
//! children become interior nodes, and a single root identifies the
//! whole file. Directories are nodes whose links carry entry names.
//!
//! The [`ChunkedReader`] walks the other way: a seekable, byte-accurate
//! read stream over any DAG the builder produced, fetching blocks
//! through a [`BlockService`] (which may pull them from the network).
//!
//! [`BlockService`]: weft_store::BlockService

pub mod adder;
pub mod entry;
pub mod error;
pub mod options;
pub mod reader;

pub use adder::{FileAdder, FileSystemNode};
pub use entry::{list, FileSystemEntry, FileSystemLink};
pub use error::{FilesError, FilesResult};
pub use options::{AddOptions, DEFAULT_CHUNK_SIZE, FANOUT};
pub use reader::ChunkedReader;
