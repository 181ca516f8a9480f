use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use mimalloc::MiMalloc;
use urchin_core::backoff::Micros;
use urchin_core::preemptive_synchronization::{
    ArrayLock, BackoffLock, ClhLock, McsLock, RawMutex, TasLock, TicketLock, TtasLock,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn uncontended_iterations<L: RawMutex>(lock: &L, iterations: u64) -> u64 {
    let counter = AtomicU64::new(0);
    for _ in 0..iterations {
        lock.lock();
        counter.fetch_add(1, Ordering::Relaxed);
        lock.unlock();
    }
    counter.load(Ordering::Relaxed)
}

fn contended_iterations<L>(lock: Arc<L>, num_threads: usize, per_thread: u64) -> u64
where
    L: RawMutex + 'static,
{
    let counter = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..per_thread {
                    lock.lock();
                    counter.fetch_add(1, Ordering::Relaxed);
                    lock.unlock();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    counter.load(Ordering::Relaxed)
}

// =============================================================================
// Uncontended acquire/release cost
// =============================================================================

fn uncontended_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_uncontended");

    group.bench_function("tas_10000", |b| {
        let lock = TasLock::new();
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });
    group.bench_function("ttas_10000", |b| {
        let lock = TtasLock::new();
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });
    group.bench_function("ticket_10000", |b| {
        let lock = TicketLock::new();
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });
    group.bench_function("array_10000", |b| {
        let lock = ArrayLock::new(8);
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });
    group.bench_function("mcs_10000", |b| {
        let lock = McsLock::new();
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });
    group.bench_function("clh_10000", |b| {
        let lock = ClhLock::new();
        b.iter(|| black_box(uncontended_iterations(&lock, 10_000)))
    });

    group.finish();
}

// =============================================================================
// Contended handoff, 4 threads
// =============================================================================

fn contended_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_contended_4_threads");
    group.sample_size(20);

    group.bench_function("ttas_4x2500", |b| {
        b.iter(|| black_box(contended_iterations(Arc::new(TtasLock::new()), 4, 2_500)))
    });
    group.bench_function("backoff_4x2500", |b| {
        b.iter(|| {
            black_box(contended_iterations(
                Arc::new(BackoffLock::<Micros>::new(5, 25)),
                4,
                2_500,
            ))
        })
    });
    group.bench_function("ticket_4x2500", |b| {
        b.iter(|| black_box(contended_iterations(Arc::new(TicketLock::new()), 4, 2_500)))
    });
    group.bench_function("array_4x2500", |b| {
        b.iter(|| black_box(contended_iterations(Arc::new(ArrayLock::new(4)), 4, 2_500)))
    });
    group.bench_function("mcs_4x2500", |b| {
        b.iter(|| black_box(contended_iterations(Arc::new(McsLock::new()), 4, 2_500)))
    });
    group.bench_function("clh_4x2500", |b| {
        b.iter(|| black_box(contended_iterations(Arc::new(ClhLock::new()), 4, 2_500)))
    });

    group.finish();
}

// =============================================================================
// std::sync::Mutex baseline
// =============================================================================

fn baseline_benchmark(c: &mut Criterion) {
    use std::sync::Mutex;

    let mut group = c.benchmark_group("lock_baseline");
    group.sample_size(20);

    group.bench_function("std_mutex_4x2500", |b| {
        b.iter(|| {
            let mutex = Arc::new(Mutex::new(0u64));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let mutex = Arc::clone(&mutex);
                    thread::spawn(move || {
                        for _ in 0..2_500 {
                            *mutex.lock().unwrap() += 1;
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(*mutex.lock().unwrap())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    uncontended_benchmark,
    contended_benchmark,
    baseline_benchmark,
);
criterion_main!(benches);
