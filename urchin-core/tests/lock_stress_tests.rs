#[cfg(test)]
mod lock_stress_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use rstest::rstest;
    use urchin_core::backoff::Micros;
    use urchin_core::common_tests::mutex_core_tests;
    use urchin_core::preemptive_synchronization::{
        ArrayLock, BackoffLock, ClhLock, FilterLock, McsLock, RawMutex, TasLock, TicketLock,
        TimeoutLock, TtasLock,
    };

    #[rstest]
    #[case(2, 10_000)]
    #[case(4, 10_000)]
    #[case(8, 10_000)]
    fn mcs_contended_counter(#[case] num_threads: usize, #[case] iterations: usize) {
        mutex_core_tests::counter_stress(McsLock::new(), num_threads, iterations);
    }

    #[rstest]
    #[case(2, 10_000)]
    #[case(8, 10_000)]
    fn clh_contended_counter(#[case] num_threads: usize, #[case] iterations: usize) {
        mutex_core_tests::counter_stress(ClhLock::new(), num_threads, iterations);
    }

    #[rstest]
    #[case(4, 5_000)]
    fn ticket_contended_counter(#[case] num_threads: usize, #[case] iterations: usize) {
        mutex_core_tests::counter_stress(TicketLock::new(), num_threads, iterations);
    }

    #[rstest]
    #[case(4, 5_000)]
    fn array_contended_counter(#[case] num_threads: usize, #[case] iterations: usize) {
        mutex_core_tests::counter_stress(ArrayLock::new(num_threads), num_threads, iterations);
    }

    #[test]
    fn tas_family_contended_counters() {
        mutex_core_tests::counter_stress(TasLock::new(), 4, 5_000);
        mutex_core_tests::counter_stress(TtasLock::new(), 4, 5_000);
        mutex_core_tests::counter_stress(BackoffLock::<Micros>::new(5, 25), 4, 5_000);
    }

    // Starvation-freedom: with a fair share of 1000 sections per thread,
    // every thread finishes its full quota.
    #[test]
    fn filter_lock_every_thread_gets_through() {
        let num_threads = 8;
        let iterations = 1_000u64;
        let lock = Arc::new(FilterLock::new(num_threads));
        let per_thread: Arc<Vec<AtomicU64>> =
            Arc::new((0..num_threads).map(|_| AtomicU64::new(0)).collect());
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|me| {
                let lock = Arc::clone(&lock);
                let per_thread = Arc::clone(&per_thread);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..iterations {
                        lock.lock(me);
                        per_thread[me].fetch_add(1, Ordering::Relaxed);
                        lock.unlock(me);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        for (me, entries) in per_thread.iter().enumerate() {
            assert_eq!(entries.load(Ordering::Relaxed), iterations, "thread {me} starved");
        }
    }

    // FIFO: waiters that arrive well apart must enter in arrival order.
    #[test]
    fn ticket_lock_serves_in_arrival_order() {
        let lock = Arc::new(TicketLock::new());
        let entry_order = Arc::new(Mutex::new(Vec::new()));

        lock.lock();
        let handles: Vec<_> = (0..4)
            .map(|waiter| {
                let lock = Arc::clone(&lock);
                let entry_order = Arc::clone(&entry_order);
                let handle = thread::spawn(move || {
                    lock.lock();
                    entry_order.lock().unwrap().push(waiter);
                    lock.unlock();
                });
                // Stagger arrivals so ticket order is deterministic.
                thread::sleep(Duration::from_millis(30));
                handle
            })
            .collect();

        lock.unlock();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*entry_order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    // A timed-out waiter must not corrupt the queue for later arrivals.
    #[test]
    fn timeout_lock_survives_waves_of_abandonment() {
        let lock = Arc::new(TimeoutLock::new());
        let acquired = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let acquired = Arc::clone(&acquired);
                thread::spawn(move || {
                    for _ in 0..200 {
                        if lock.try_lock(Duration::from_micros(50)) {
                            acquired.fetch_add(1, Ordering::Relaxed);
                            lock.unlock();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        // The lock must still be acquirable after the storm.
        assert!(lock.try_lock(Duration::from_secs(1)));
        lock.unlock();
        assert!(acquired.load(Ordering::Relaxed) > 0);
    }
}
