//! Kernel contracts: the user-supplied unit of work bound to one worker
//!
//! A kernel owns its private shard of the event set and any precomputed
//! normalization terms. `setup` runs exactly once, inside the worker's own
//! execution context, before the first `process` call; anything process-local
//! (open handles, native buffers, normalization integrals) is built there
//! rather than inherited from the spawning side.

use crate::error::Result;
use crate::message::Message;

/// A parameter vector as produced by a minimizer iteration
pub type Parameters = Vec<f64>;

/// Looping kernel: computes one partial result per received input, for the
/// pool's lifetime
///
/// `process` must be a pure function of (private shard, current input); no
/// side effects visible outside the owning worker.
pub trait Kernel: Send + 'static {
    /// The per-round input, typically a [`Parameters`] vector. Broadcast is
    /// by copy, so every worker sees its own clone.
    type Input: Clone + Message;

    /// One-time, possibly expensive initialization
    fn setup(&mut self) -> Result<()>;

    /// Compute one partial result from the private shard and this input
    fn process(&mut self, input: &Self::Input) -> Result<f64>;
}

/// Single-shot kernel: runs once and terminates
pub trait SingleKernel: Send + 'static {
    /// The one result this kernel produces
    type Output: Message;

    /// One-time, possibly expensive initialization
    fn setup(&mut self) -> Result<()>;

    /// Compute the single result from the private shard
    fn process(&mut self) -> Result<Self::Output>;
}
