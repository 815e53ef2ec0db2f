use super::backing::{BackingAllocator, CacheError};
use super::bin_policy::BinPolicy;
use super::proc::{PlatformProbe, SysProbe};
use super::router::ShardRouter;
use super::shard::Shard;
use super::stats::{CacheStats, CacheStatsSnapshot};
use super::{BinNo, Offset, NO_OFFSET};
use crate::sync::{Mutex, MutexGuard};
use std::marker::PhantomData;
use tracing::{debug, trace};

pub(crate) const DEFAULT_SHARDS_PER_CORE: u32 = 4;
pub(crate) const DEFAULT_BLOCK_SIZE: usize = 8;
pub(crate) const DEFAULT_MAX_CACHED_BYTES_PER_BIN: usize = 1 << 20;
pub(crate) const DEFAULT_CORE_REFRESH_INTERVAL: u32 = 4;

/// Configuration for [`ObjectCache`]. All fields have sensible defaults.
/// Zero values resolve to their defaults at construction.
#[derive(Clone, Debug)]
pub struct ObjectCacheConfig {
    /// Shards created per detected hardware thread. More shards trade
    /// memory for lower lock contention; they do not eliminate collisions.
    /// Default: 4.
    pub shards_per_core: u32,

    /// Batch unit for both refill (empty bin on `get`) and flush (byte
    /// budget reached on `insert`). Default: 8.
    pub block_size: usize,

    /// Per-shard, per-bin byte budget. Reaching it on `insert` flushes the
    /// oldest `block_size` offsets back to the backing allocator. Also
    /// bounds the largest cacheable object:
    /// `max_cached_bytes_per_bin / block_size / 2`. Default: 1 MiB.
    pub max_cached_bytes_per_bin: usize,

    /// Router re-samples the calling thread's CPU core id every this many
    /// routing decisions. Lower values track OS thread migration more
    /// closely (better core affinity) at the price of more core-id
    /// syscalls; higher values amortize the syscall but route a migrated
    /// thread to its old core's shards for longer. Default: 4.
    pub core_refresh_interval: u32,
}

impl Default for ObjectCacheConfig {
    fn default() -> Self {
        Self {
            shards_per_core: DEFAULT_SHARDS_PER_CORE,
            block_size: DEFAULT_BLOCK_SIZE,
            max_cached_bytes_per_bin: DEFAULT_MAX_CACHED_BYTES_PER_BIN,
            core_refresh_interval: DEFAULT_CORE_REFRESH_INTERVAL,
        }
    }
}

impl ObjectCacheConfig {
    fn resolved(mut self) -> Self {
        if self.shards_per_core == 0 {
            self.shards_per_core = DEFAULT_SHARDS_PER_CORE;
        }
        if self.block_size == 0 {
            self.block_size = DEFAULT_BLOCK_SIZE;
        }
        if self.max_cached_bytes_per_bin == 0 {
            self.max_cached_bytes_per_bin = DEFAULT_MAX_CACHED_BYTES_PER_BIN;
        }
        if self.core_refresh_interval == 0 {
            self.core_refresh_interval = DEFAULT_CORE_REFRESH_INTERVAL;
        }
        self
    }
}

/// Thread/core-sharded cache of free relative offsets, one FIFO queue per
/// (shard, bin).
///
/// `get` and `insert` route the calling thread to a shard, take that shard's
/// lock for the remainder of the call, and fall through to the backing
/// allocator only on underflow (batch refill) or byte-budget overflow
/// (batch flush). The backing callback runs *under the shard lock*: this
/// keeps every refill/flush atomic with respect to other operations on the
/// shard, at the cost of blocking threads mapped to the same shard while
/// the backing allocator executes.
///
/// The shard table is sized `max(1, hardware threads) × shards_per_core` at
/// construction and never resized. The cache is cold after construction;
/// nothing is persisted.
pub struct ObjectCache<P: BinPolicy> {
    shards: Vec<Mutex<Shard>>,
    router: ShardRouter,
    config: ObjectCacheConfig,
    max_bin_no: BinNo,
    stats: CacheStats,
    _policy: PhantomData<P>,
}

impl<P: BinPolicy> ObjectCache<P> {
    /// Create a cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(ObjectCacheConfig::default())
    }

    /// Create a cache with custom configuration.
    pub fn with_config(config: ObjectCacheConfig) -> Self {
        let config = config.resolved();

        let num_shards =
            PlatformProbe::hardware_parallelism().max(1) * config.shards_per_core as usize;
        let mut shards = Vec::with_capacity(num_shards);
        for _ in 0..num_shards {
            shards.push(Mutex::new(Shard::new(P::num_bins())));
        }

        // Bound the worst case a single (shard, bin) pair can pin: the
        // largest cacheable object fits block_size/2 times into the byte
        // budget. Budgets below the policy's largest class clamp the
        // cacheable range; budgets above it leave every bin cacheable.
        let max_object_size = config.max_cached_bytes_per_bin / config.block_size / 2;
        let max_bin_no =
            P::bin_of(max_object_size).unwrap_or_else(|| P::num_bins().saturating_sub(1));

        let router = ShardRouter::new(
            num_shards,
            config.shards_per_core,
            config.core_refresh_interval,
        );

        debug!(
            num_shards,
            num_bins = P::num_bins(),
            max_bin_no,
            block_size = config.block_size,
            max_cached_bytes_per_bin = config.max_cached_bytes_per_bin,
            "object cache constructed"
        );

        Self {
            shards,
            router,
            config,
            max_bin_no,
            stats: CacheStats::new(),
            _policy: PhantomData,
        }
    }

    /// Pop a cached offset for `bin_no`, refilling the shard's queue with a
    /// `block_size` batch from `backing` if it is empty.
    ///
    /// Returns [`NO_OFFSET`] when `bin_no` is above [`max_bin_no`](Self::max_bin_no);
    /// no shard state is touched and the caller must allocate directly from
    /// the backing allocator.
    ///
    /// # Errors
    ///
    /// Propagates a refill failure from [`BackingAllocator::allocate_batch`];
    /// the shard's queue is left unchanged in that case.
    pub fn get<A: BackingAllocator>(
        &self,
        bin_no: BinNo,
        backing: &A,
    ) -> Result<Offset, CacheError> {
        if bin_no > self.max_bin_no {
            return Ok(NO_OFFSET);
        }
        self.get_in_shard(self.router.route(), bin_no, backing)
    }

    pub(crate) fn get_in_shard<A: BackingAllocator>(
        &self,
        cache_no: usize,
        bin_no: BinNo,
        backing: &A,
    ) -> Result<Offset, CacheError> {
        debug_assert!(bin_no < P::num_bins());

        let mut shard = self.lock_shard(cache_no);
        if shard.is_empty(bin_no) {
            let mut batch = vec![NO_OFFSET; self.config.block_size];
            backing.allocate_batch(bin_no, &mut batch)?;
            for &offset in &batch {
                shard.insert(bin_no, offset);
            }
            self.stats.record_refill(batch.len());
            trace!(cache_no, bin_no, batch = batch.len(), "refilled bin");
        }

        // A successful refill leaves at least one queued offset (block_size
        // is clamped to >= 1), so an empty pop here can only mean a violated
        // allocate_batch contract.
        shard.pop(bin_no).ok_or(CacheError::ShortBatch {
            bin_no,
            requested: self.config.block_size,
            produced: 0,
        })
    }

    /// Hand a previously-obtained `offset` back to the cache. If the bin's
    /// byte footprint reaches `max_cached_bytes_per_bin`, the oldest
    /// `block_size` offsets are flushed to `backing` in insertion order.
    ///
    /// Returns `false` when `bin_no` is above [`max_bin_no`](Self::max_bin_no);
    /// no shard state changes and the caller must free directly via the
    /// backing allocator. Returns `true` once the offset is accepted,
    /// whether or not a flush occurred.
    ///
    /// `offset` must be non-negative and must not already be cached; this is
    /// asserted in debug builds only.
    pub fn insert<A: BackingAllocator>(&self, bin_no: BinNo, offset: Offset, backing: &A) -> bool {
        debug_assert!(offset >= 0, "insert of negative offset {offset}");
        if bin_no > self.max_bin_no {
            return false;
        }
        self.insert_in_shard(self.router.route(), bin_no, offset, backing);
        true
    }

    pub(crate) fn insert_in_shard<A: BackingAllocator>(
        &self,
        cache_no: usize,
        bin_no: BinNo,
        offset: Offset,
        backing: &A,
    ) {
        debug_assert!(bin_no < P::num_bins());

        let mut shard = self.lock_shard(cache_no);
        shard.insert(bin_no, offset);

        let object_size = P::object_size_of(bin_no);
        if shard.len(bin_no) * object_size >= self.config.max_cached_bytes_per_bin {
            debug_assert!(shard.len(bin_no) >= self.config.block_size);
            let mut batch = Vec::with_capacity(self.config.block_size);
            while batch.len() < self.config.block_size {
                match shard.pop(bin_no) {
                    Some(oldest) => batch.push(oldest),
                    None => break,
                }
            }
            backing.deallocate_batch(bin_no, &batch);
            self.stats.record_flush(batch.len());
            trace!(cache_no, bin_no, batch = batch.len(), "flushed bin");
        }
    }

    /// Empty every bin of every shard **without** returning the cached
    /// offsets to the backing allocator.
    ///
    /// The discarded offsets are forgotten by the cache's bookkeeping only;
    /// unless the caller is about to reset the whole arena, they are leaked.
    /// Use [`flush_all`](Self::flush_all) to drain the cache safely instead.
    pub fn clear(&self) {
        for cache_no in 0..self.shards.len() {
            self.lock_shard(cache_no).clear();
        }
    }

    /// Drain every bin of every shard, returning all cached offsets to
    /// `backing` in `block_size`-sized batches (plus one final partial batch
    /// per bin). Holds one shard lock at a time.
    ///
    /// This is the safe alternative to [`clear`](Self::clear).
    pub fn flush_all<A: BackingAllocator>(&self, backing: &A) {
        for cache_no in 0..self.shards.len() {
            let mut shard = self.lock_shard(cache_no);
            for bin_no in 0..P::num_bins() {
                while !shard.is_empty(bin_no) {
                    let mut batch = Vec::with_capacity(self.config.block_size);
                    while batch.len() < self.config.block_size {
                        match shard.pop(bin_no) {
                            Some(oldest) => batch.push(oldest),
                            None => break,
                        }
                    }
                    backing.deallocate_batch(bin_no, &batch);
                    self.stats.record_flush(batch.len());
                }
            }
        }
    }

    /// Number of shards. Immutable for the cache's lifetime; always >= 1.
    pub fn num_caches(&self) -> usize {
        self.shards.len()
    }

    /// Largest cacheable bin. Calls with a larger bin fall back to the
    /// backing allocator via the sentinel returns of `get`/`insert`.
    pub fn max_bin_no(&self) -> BinNo {
        self.max_bin_no
    }

    /// Snapshot of the cache's batch traffic with the backing allocator.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Oldest-first traversal of one shard's queue for `bin_no`.
    ///
    /// Exclusive access (`&mut self`) stands in for the "no concurrent
    /// mutation" requirement: the shard's lock is bypassed, not taken.
    ///
    /// # Panics
    ///
    /// Panics if `cache_no >= num_caches()` or `bin_no` is not a bin of the
    /// policy.
    #[cfg(not(loom))]
    pub fn iter_bin(&mut self, cache_no: usize, bin_no: BinNo) -> impl Iterator<Item = Offset> + '_ {
        self.shards[cache_no]
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter(bin_no)
    }

    #[cfg(any(test, loom))]
    pub(crate) fn cached_count(&self, cache_no: usize, bin_no: BinNo) -> usize {
        self.lock_shard(cache_no).len(bin_no)
    }

    fn lock_shard(&self, cache_no: usize) -> MutexGuard<'_, Shard> {
        // Recover from poisoning: a shard is a plain queue with no panic
        // point between mutations, so it cannot be observed torn.
        self.shards[cache_no]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<P: BinPolicy> Default for ObjectCache<P> {
    fn default() -> Self {
        Self::new()
    }
}
