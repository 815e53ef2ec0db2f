use criterion::{criterion_group, criterion_main, Criterion};
use obcache::{BackingAllocator, BinNo, CacheError, ObjectCache, Offset, SegregatedPolicy};
use std::hint::black_box;

/// Monotonic offset source with negligible overhead; the benchmark measures
/// the cache's hot path, not the backing allocator.
struct CounterBacking {
    next: std::sync::Mutex<Offset>,
}

impl BackingAllocator for CounterBacking {
    fn allocate_batch(&self, _bin_no: BinNo, out: &mut [Offset]) -> Result<(), CacheError> {
        let mut next = self.next.lock().unwrap();
        for slot in out.iter_mut() {
            *slot = *next;
            *next += 1;
        }
        Ok(())
    }

    fn deallocate_batch(&self, _bin_no: BinNo, _offsets: &[Offset]) {}
}

fn bench_hot_round_trip(c: &mut Criterion) {
    let cache = ObjectCache::<SegregatedPolicy>::new();
    let backing = CounterBacking {
        next: std::sync::Mutex::new(0),
    };

    // Pre-warm bin 3 so the measured loop stays on the hit path.
    let warm = cache.get(3, &backing).unwrap();
    cache.insert(3, warm, &backing);

    c.bench_function("get_insert_round_trip_bin3", |b| {
        b.iter(|| {
            let offset = cache.get(black_box(3), &backing).unwrap();
            cache.insert(3, black_box(offset), &backing);
        })
    });
}

fn bench_out_of_range_rejection(c: &mut Criterion) {
    let cache = ObjectCache::<SegregatedPolicy>::new();
    let backing = CounterBacking {
        next: std::sync::Mutex::new(0),
    };
    let too_large = cache.max_bin_no() + 1;

    c.bench_function("get_out_of_range", |b| {
        b.iter(|| cache.get(black_box(too_large), &backing).unwrap())
    });
}

criterion_group!(benches, bench_hot_round_trip, bench_out_of_range_rejection);
criterion_main!(benches);
