//! The weft block-exchange engine.
//!
//! This crate owns the want-list: the set of CIDs the local node
//! desires. A caller registers interest with
//! [`SwapEngine::want_async`] and suspends; the engine publishes the
//! want to connected peers, and when a block arrives (or is produced
//! locally) every waiter for its CID is resolved. Per-peer [`Ledger`]s
//! and aggregate [`SwapStats`] account for the traffic.
//!
//! The engine speaks to the outside world through contracts defined in
//! [`net`]: a [`Swarm`] that dials peers and reports connections, the
//! [`WireProtocol`]s that frame messages on a stream, and a [`Router`]
//! used upstream for provider discovery. Wire implementations live in
//! `weft-wire`; the facade in `weft-engine` does the wiring.

pub mod engine;
pub mod error;
pub mod ledger;
pub mod net;
pub mod stats;
pub mod wantlist;

pub use engine::SwapEngine;
pub use error::{SwapError, SwapResult};
pub use ledger::{Ledger, LedgerBook};
pub use net::{
    BoxStream, IdentityGate, NullRouter, PeerConnection, Router, RouterError, Swarm, SwarmEvent,
    WantEntry, WireProtocol, WireStream,
};
pub use stats::{SwapCounters, SwapStats};
pub use wantlist::{WaitHandle, WantRegistry};
