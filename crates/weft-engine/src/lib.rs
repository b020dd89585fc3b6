//! The weft engine facade.
//!
//! [`WeftEngine`] wires the block store, the exchange engine, the wire
//! protocols, and the file layer into one embedded unit and owns their
//! lifecycle. After [`WeftEngine::start`] the facade exposes grouped
//! handles:
//!
//! - [`BlockApi`] — get/put/stat/remove over the exchange-aware block
//!   service (a `get` miss registers a want and waits for a peer)
//! - [`FilesApi`] — add streams/files/directories, list, read
//! - [`SwapApi`] — want-list, ledgers, exchange statistics
//! - [`StatsApi`] — bitswap, repository, and bandwidth views
//!
//! The swarm and router are consumed contracts; [`MemorySwarm`] is an
//! in-process swarm for tests and embedding, and
//! [`weft_swap::NullRouter`] stands in when no provider lookup exists.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod service;

pub use api::{BandwidthStats, BlockApi, BlockStat, FilesApi, StatsApi, SwapApi};
pub use config::EngineConfig;
pub use engine::WeftEngine;
pub use error::{EngineError, EngineResult};
pub use memory::{MemoryNetwork, MemorySwarm};
pub use service::ExchangeBlockService;

pub use weft_swap::{NullRouter, Router, RouterError, Swarm};
