//! Thread/core-sharded front-end cache for a segregated-size-class allocator
//! backed by a relocatable arena (e.g. a memory-mapped persistent heap).
//!
//! The cache absorbs small-object allocate/free traffic in per-shard FIFO
//! queues of *relative offsets*, touching the globally-synchronized backing
//! allocator only in amortized batches: a `block_size` refill when a bin runs
//! dry, a `block_size` flush when a bin exceeds its per-shard byte budget.
//! Offsets rather than addresses are cached so that entries stay valid when
//! the arena is remapped at a different base address.
//!
//! The cache holds no global state: construct an [`ObjectCache`], share it by
//! reference (or `Arc`) with the allocator's hot paths, and supply the
//! backing allocator through the [`BackingAllocator`] trait on each call.

pub(crate) mod sync;

// public module: contains implementation details (hidden via pub(crate))
pub mod cache;

// core cache + configuration
pub use cache::object_cache::{ObjectCache, ObjectCacheConfig};

// collaborator boundaries
pub use cache::backing::{BackingAllocator, CacheError};
pub use cache::bin_policy::{BinPolicy, SegregatedPolicy};

// diagnostics
pub use cache::stats::CacheStatsSnapshot;

// fundamental types
pub use cache::{BinNo, Offset, NO_OFFSET};
