//! Sharding strategies for splitting an event set across workers
//!
//! Every worker owns a private, disjoint partition of the event set. A
//! strategy maps (total rows, shard count) to row ranges; every row must
//! land in exactly one shard.

use std::ops::Range;

/// Trait for sharding strategies
pub trait Sharder: Send + Sync {
    /// Row ranges for `shards` shards over `total` rows
    ///
    /// The returned ranges must be disjoint and cover `0..total` in order.
    fn bounds(&self, total: usize, shards: usize) -> Vec<Range<usize>>;
}

/// Contiguous near-even chunking: shard sizes differ by at most one, with
/// the remainder spread over the leading shards
#[derive(Debug, Clone, Default)]
pub struct ChunkSharder;

impl ChunkSharder {
    /// Create a new chunk sharder
    pub fn new() -> Self {
        Self
    }
}

impl Sharder for ChunkSharder {
    fn bounds(&self, total: usize, shards: usize) -> Vec<Range<usize>> {
        if shards == 0 {
            return Vec::new();
        }

        let base = total / shards;
        let remainder = total % shards;

        let mut ranges = Vec::with_capacity(shards);
        let mut start = 0;
        for index in 0..shards {
            let len = base + usize::from(index < remainder);
            ranges.push(start..start + len);
            start += len;
        }
        ranges
    }
}

/// Custom sharder that allows user-defined logic
pub struct CustomSharder<F> {
    func: F,
}

impl<F> CustomSharder<F>
where
    F: Fn(usize, usize) -> Vec<Range<usize>> + Send + Sync,
{
    /// Create a new custom sharder with the given function
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Sharder for CustomSharder<F>
where
    F: Fn(usize, usize) -> Vec<Range<usize>> + Send + Sync,
{
    fn bounds(&self, total: usize, shards: usize) -> Vec<Range<usize>> {
        (self.func)(total, shards)
    }
}

/// Contiguous near-even row ranges, the default strategy
pub fn even_chunks(total: usize, shards: usize) -> Vec<Range<usize>> {
    ChunkSharder::new().bounds(total, shards)
}
