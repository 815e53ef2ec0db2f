use super::{BinNo, Offset};
use std::fmt;

/// Boundary to the globally-synchronized backing allocator that this cache
/// shields from high-frequency small allocate/free traffic.
///
/// Both operations are invoked while the target shard's lock is held:
/// implementations must not block indefinitely and must not re-enter the
/// cache for the same shard. The backing allocator is assumed independently
/// safe to call concurrently from different shards.
pub trait BackingAllocator {
    /// Produce `out.len()` distinct, valid, currently-unused relative
    /// offsets sized for `bin_no`, writing one into each slot of `out`.
    ///
    /// # Errors
    ///
    /// Returns an error when the batch cannot be produced (e.g. the arena is
    /// exhausted); partially filling `out` and returning `Ok` is a contract
    /// violation.
    fn allocate_batch(&self, bin_no: BinNo, out: &mut [Offset]) -> Result<(), CacheError>;

    /// Accept `offsets` back and mark every one of them reusable.
    ///
    /// Implementations must not retain references to the slice beyond the
    /// call.
    fn deallocate_batch(&self, bin_no: BinNo, offsets: &[Offset]);
}

/// Failures surfaced through the cache.
///
/// Out-of-range bins are *not* errors — they are signalled by sentinel
/// returns (`NO_OFFSET` from `get`, `false` from `insert`) and the caller
/// falls back to the backing allocator directly. This type only carries
/// backing-allocator failures propagated out of a refill.
#[derive(Debug)]
pub enum CacheError {
    /// The backing allocator could not produce the requested batch.
    ArenaExhausted { bin_no: BinNo, requested: usize },
    /// A self-validating backing allocator produced fewer offsets than
    /// requested.
    ShortBatch {
        bin_no: BinNo,
        requested: usize,
        produced: usize,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::ArenaExhausted { bin_no, requested } => write!(
                f,
                "backing allocator exhausted: could not produce {requested} offsets for bin {bin_no}"
            ),
            CacheError::ShortBatch {
                bin_no,
                requested,
                produced,
            } => write!(
                f,
                "backing allocator produced {produced} of {requested} offsets for bin {bin_no}"
            ),
        }
    }
}

impl std::error::Error for CacheError {}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::ArenaExhausted {
            bin_no: 3,
            requested: 8,
        };
        assert_eq!(
            err.to_string(),
            "backing allocator exhausted: could not produce 8 offsets for bin 3"
        );

        let err = CacheError::ShortBatch {
            bin_no: 1,
            requested: 8,
            produced: 5,
        };
        assert_eq!(
            err.to_string(),
            "backing allocator produced 5 of 8 offsets for bin 1"
        );
    }
}
