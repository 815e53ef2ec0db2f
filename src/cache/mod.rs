pub(crate) mod backing;
pub(crate) mod bin_policy;
pub(crate) mod object_cache;
pub(crate) mod proc;
pub(crate) mod router;
pub(crate) mod shard;
pub(crate) mod stats;

/// Position of a storage unit relative to the arena base.
///
/// Cached as an offset, not an address, so entries survive the arena being
/// remapped at a different base across executions. Signed so that
/// [`NO_OFFSET`] is representable.
pub type Offset = i64;

/// Sentinel: "no cached/cacheable offset". Returned by
/// [`ObjectCache::get`](crate::ObjectCache::get) for bins above
/// [`max_bin_no`](crate::ObjectCache::max_bin_no); never a valid offset.
pub const NO_OFFSET: Offset = -1;

/// Size-class index. All objects mapped to the same bin are interchangeable
/// for reuse purposes.
pub type BinNo = usize;
