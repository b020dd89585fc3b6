//! Content-addressed block storage for weft.
//!
//! This crate implements a hash-keyed block store. Every block is an
//! immutable byte string identified by its CID; the store never
//! interprets block contents.
//!
//! # Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`FsBlockStore`] — one file per block under a root directory,
//!   fail-atomic writes, digest verification on read
//! - [`MemoryBlockStore`] — `HashMap`-based store for tests and
//!   embedding
//! - [`NullBlockStore`] — accepts writes and forgets them; backs
//!   hash-only imports
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing).
//! 2. Writes are fail-atomic: a failed write leaves no partial file.
//! 3. Any number of concurrent readers, or one writer.
//! 4. The identity-hash and empty-object sentinels are virtual: they
//!    are synthesized on read and never touch disk.
//! 5. All I/O errors are propagated, never silently ignored.
//!
//! The [`BlockService`] trait is the seam between local storage and
//! the block-exchange loop: `get` through a service may wait for the
//! network, while [`BlockStore`] is always local.

pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod service;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use fs::FsBlockStore;
pub use memory::{MemoryBlockStore, NullBlockStore};
pub use service::{BlockService, StoreService};
pub use traits::{BlockStore, StoreStat};
