use std::sync::Arc;
use std::thread;

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use mimalloc::MiMalloc;
use urchin_core::data_structures::{
    CoarseList, FineList, LazyList, LockFreeList, OptimisticList, OrderedSet,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const KEY_RANGE: u64 = 512;

// 80% contains / 10% add / 10% remove, the usual read-heavy set mix.
fn mixed_workload<S>(set: Arc<S>, num_threads: u64, ops_per_thread: u64) -> u64
where
    S: OrderedSet<u64> + Send + Sync + 'static,
{
    for key in (0..KEY_RANGE).step_by(2) {
        set.add(key);
    }

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                let mut hits = 0u64;
                for i in 0..ops_per_thread {
                    let key = (t * 31 + i * 17) % KEY_RANGE;
                    match i % 10 {
                        0 => {
                            set.add(key);
                        }
                        1 => {
                            set.remove(&key);
                        }
                        _ => {
                            if set.contains(&key) {
                                hits += 1;
                            }
                        }
                    }
                }
                hits
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).sum()
}

fn read_heavy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_set_read_heavy_4_threads");
    group.sample_size(15);

    group.bench_function("coarse_4x5000", |b| {
        b.iter(|| black_box(mixed_workload(Arc::new(CoarseList::new()), 4, 5_000)))
    });
    group.bench_function("fine_4x5000", |b| {
        b.iter(|| black_box(mixed_workload(Arc::new(FineList::new()), 4, 5_000)))
    });
    group.bench_function("optimistic_4x5000", |b| {
        b.iter(|| black_box(mixed_workload(Arc::new(OptimisticList::new()), 4, 5_000)))
    });
    group.bench_function("lazy_4x5000", |b| {
        b.iter(|| black_box(mixed_workload(Arc::new(LazyList::new()), 4, 5_000)))
    });
    group.bench_function("lock_free_4x5000", |b| {
        b.iter(|| black_box(mixed_workload(Arc::new(LockFreeList::new()), 4, 5_000)))
    });

    group.finish();
}

criterion_group!(benches, read_heavy_benchmark);
criterion_main!(benches);
