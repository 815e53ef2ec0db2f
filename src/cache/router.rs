use super::proc::{PlatformProbe, SysProbe};
use std::cell::Cell;
use std::hash::{Hash, Hasher};

// Router TLS deliberately uses std primitives instead of the crate sync
// shim: loom models pin shards explicitly and never call route(), so this
// state is outside the model-checked surface.

/// Deterministically selects a shard for the calling thread.
///
/// Primary strategy: combine the CPU core id with a per-thread sub-index in
/// `[0, shards_per_core)`, run the pair through a full-avalanche mix, and
/// reduce modulo the shard count. Threads on the same core spread across
/// that core's `shards_per_core` shards; collisions are accepted — the shard
/// count scales with hardware parallelism, trading memory for contention.
///
/// Fallback (core id unavailable): hashed thread identity modulo shard
/// count.
pub(crate) struct ShardRouter {
    num_shards: usize,
    shards_per_core: u32,
    core_refresh_interval: u32,
}

#[derive(Clone, Copy)]
struct CoreState {
    core_id: u32,
    /// Calls remaining before the core id is sampled again.
    remaining: u32,
}

thread_local! {
    /// Hashed identity of this thread, computed once per thread.
    static THREAD_TOKEN: u64 = hashed_thread_id();

    /// Cached core id. `remaining == 0` forces a (re-)sample on next use.
    static CORE_STATE: Cell<CoreState> = const {
        Cell::new(CoreState { core_id: 0, remaining: 0 })
    };
}

impl ShardRouter {
    pub(crate) fn new(num_shards: usize, shards_per_core: u32, core_refresh_interval: u32) -> Self {
        debug_assert!(num_shards > 0);
        debug_assert!(shards_per_core > 0);
        debug_assert!(core_refresh_interval > 0);
        Self {
            num_shards,
            shards_per_core,
            core_refresh_interval,
        }
    }

    /// Shard index for the calling thread, in `[0, num_shards)`.
    pub(crate) fn route(&self) -> usize {
        let token = THREAD_TOKEN.with(|token| *token);
        let index = match self.cached_core_id() {
            Some(core_id) => {
                let sub_index = token % u64::from(self.shards_per_core);
                mix64(u64::from(core_id) * u64::from(self.shards_per_core) + sub_index)
            }
            // token is already hasher output; no further mixing needed.
            None => token,
        };
        (index % self.num_shards as u64) as usize
    }

    /// Core id lookups are a syscall; re-sample only every
    /// `core_refresh_interval` calls to tolerate OS-level thread migration
    /// without paying the detection cost on each routing decision.
    fn cached_core_id(&self) -> Option<u32> {
        CORE_STATE.with(|state| {
            let mut cached = state.get();
            if cached.remaining == 0 {
                cached = CoreState {
                    core_id: PlatformProbe::cpu_core_id()?,
                    remaining: self.core_refresh_interval,
                };
            }
            cached.remaining -= 1;
            state.set(cached);
            Some(cached.core_id)
        })
    }
}

fn hashed_thread_id() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// 64-bit finalizer (MurmurHash3 `fmix64`): full-avalanche bijective mix so
/// that adjacent `(core, sub-index)` pairs land on unrelated shards.
#[inline]
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_route_stays_in_range() {
        for num_shards in [1, 3, 4, 7, 16, 64] {
            let router = ShardRouter::new(num_shards, 4, 4);
            for _ in 0..64 {
                assert!(router.route() < num_shards);
            }
        }
    }

    #[test]
    fn test_route_in_range_across_threads() {
        let num_shards = 8;
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(std::thread::spawn(move || {
                let router = ShardRouter::new(num_shards, 4, 4);
                for _ in 0..32 {
                    assert!(router.route() < num_shards);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_mix64_is_injective_on_small_keys() {
        // fmix64 is a bijection (xor-shifts and odd multiplications are
        // invertible), so distinct keys must produce distinct mixes.
        let mut outputs = std::collections::HashSet::new();
        for key in 0u64..1024 {
            assert!(outputs.insert(mix64(key)));
        }
    }

    #[test]
    fn test_thread_tokens_differ_across_threads() {
        let local = THREAD_TOKEN.with(|token| *token);
        let remote = std::thread::spawn(|| THREAD_TOKEN.with(|token| *token))
            .join()
            .unwrap();
        assert_ne!(local, remote);
    }

    #[test]
    fn test_thread_token_stable_within_thread() {
        let first = THREAD_TOKEN.with(|token| *token);
        let second = THREAD_TOKEN.with(|token| *token);
        assert_eq!(first, second);
    }
}
