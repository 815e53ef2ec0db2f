//! All counters use `Relaxed` ordering. Individual counter values are
//! eventually consistent, and cross-counter snapshots may be transiently
//! inconsistent. This is acceptable for diagnostic display. Do NOT use
//! these values for cache decisions.

use crate::sync::atomic::{AtomicU64, Ordering};

/// Batch-granularity event counters owned by one cache instance.
pub(crate) struct CacheStats {
    refills: AtomicU64,
    refilled_offsets: AtomicU64,
    flushes: AtomicU64,
    flushed_offsets: AtomicU64,
}

impl CacheStats {
    pub(crate) fn new() -> Self {
        Self {
            refills: AtomicU64::new(0),
            refilled_offsets: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flushed_offsets: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_refill(&self, batch: usize) {
        self.refills.fetch_add(1, Ordering::Relaxed);
        self.refilled_offsets
            .fetch_add(batch as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flush(&self, batch: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_offsets
            .fetch_add(batch as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            refills: self.refills.load(Ordering::Relaxed),
            refilled_offsets: self.refilled_offsets.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_offsets: self.flushed_offsets.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a cache's batch traffic with the backing allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Refill batches pulled from the backing allocator.
    pub refills: u64,
    /// Offsets received across all refills.
    pub refilled_offsets: u64,
    /// Flush batches pushed back to the backing allocator.
    pub flushes: u64,
    /// Offsets returned across all flushes.
    pub flushed_offsets: u64,
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = CacheStats::new();
        stats.record_refill(8);
        stats.record_refill(8);
        stats.record_flush(8);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.refills, 2);
        assert_eq!(snapshot.refilled_offsets, 16);
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.flushed_offsets, 8);
    }
}
