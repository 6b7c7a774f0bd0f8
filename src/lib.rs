//! # parwave
//!
//! A partial-wave analysis toolkit built around a process-pool calculation
//! core: event data is split into per-worker shards, each worker owns a
//! long-lived calculation kernel, and a minimizer drives the pool by
//! broadcasting a parameter vector every iteration and summing the partial
//! likelihoods that come back.
//!
//! ## Architecture
//!
//! ```text
//!                  parameters (fan-out)
//! ┌──────────────┐ ─────────────────────> ┌────────────┐
//! │  Controller  │                        │  Worker i  │
//! │ (DuplexPool) │ <───────────────────── │ (Kernel +  │
//! └──────────────┘  partial value (fan-in)│   shard)   │
//!        │                                └────────────┘
//!        ▼
//!    sum-reduce -> scalar back to the minimizer
//! ```
//!
//! Each worker is fully isolated: its kernel and event shard are moved into
//! the worker at spawn time and the only communication path is the duplex
//! channel. The heartbeat monitor is a controller-side display task and
//! never touches the numeric path.

#![warn(missing_docs, rust_2018_idioms)]

pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod kernel;
pub mod logging;
pub mod message;
pub mod pool;
pub mod shard;
pub mod table;
pub mod worker;

// Re-exports
pub use channel::{duplex, Channel, ChannelConfig, ControllerEnd, WorkerEnd};
pub use error::{Error, Result};
pub use kernel::{Kernel, Parameters, SingleKernel};
pub use message::{Envelope, Message, Request};
pub use pool::{run_once, run_once_reduced, DuplexPool, PoolConfig};
pub use table::EventTable;
pub use worker::{WorkerConfig, WorkerId, WorkerState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::channel::{Channel, ChannelConfig};
    pub use crate::error::{Error, Result};
    pub use crate::kernel::{Kernel, Parameters, SingleKernel};
    pub use crate::message::{Envelope, Request};
    pub use crate::pool::{DuplexPool, PoolConfig};
    pub use crate::table::EventTable;
    pub use crate::worker::{WorkerConfig, WorkerId, WorkerState};
}
