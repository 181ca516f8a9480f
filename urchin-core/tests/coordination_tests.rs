#[cfg(test)]
mod coordination_tests {
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use urchin_core::preemptive_synchronization::{
        ConditionVariable, CountdownEvent, FifoReadWriteLock, RawMutex, ReentrantLock, Semaphore,
        TtasLock,
    };

    struct FlaggedState {
        mutex: TtasLock,
        cv: ConditionVariable,
        flag: Cell<bool>,
    }
    unsafe impl Send for FlaggedState {}
    unsafe impl Sync for FlaggedState {}

    // The no-lost-wakeup law: however the waiter's predicate check and
    // the notifier's state change interleave, the waiter must come back.
    // Run many rounds so both sides of the race get exercised.
    #[test]
    fn condition_variable_never_loses_a_wakeup() {
        for _ in 0..300 {
            let state = Arc::new(FlaggedState {
                mutex: TtasLock::new(),
                cv: ConditionVariable::new(),
                flag: Cell::new(false),
            });

            let waiter = {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    state.mutex.lock();
                    state.cv.wait_while(&state.mutex, || !state.flag.get());
                    state.mutex.unlock();
                })
            };

            state.mutex.lock();
            state.flag.set(true);
            state.mutex.unlock();
            state.cv.notify_all();

            waiter.join().unwrap();
        }
    }

    #[test]
    fn semaphore_count_equals_initial_plus_releases_minus_acquires() {
        let initial = 3i64;
        let sem = Arc::new(Semaphore::new(initial));
        let successful_acquires = Arc::new(AtomicU64::new(0));
        let releases = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..6)
            .map(|t| {
                let sem = Arc::clone(&sem);
                let successful_acquires = Arc::clone(&successful_acquires);
                let releases = Arc::clone(&releases);
                thread::spawn(move || {
                    for i in 0..400u64 {
                        if (t + i) % 3 == 0 {
                            sem.acquire();
                            successful_acquires.fetch_add(1, Ordering::Relaxed);
                        } else {
                            sem.release();
                            releases.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let expected = initial + releases.load(Ordering::Relaxed) as i64
            - successful_acquires.load(Ordering::Relaxed) as i64;
        assert_eq!(sem.value(), expected);
        assert!(sem.value() >= 0);
    }

    #[test]
    fn reentrant_lock_holds_across_recursion_against_a_rival() {
        let lock = Arc::new(ReentrantLock::new());
        let counter = Arc::new(AtomicU64::new(0));

        let recursing = {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                fn level(lock: &ReentrantLock, counter: &AtomicU64, depth: u32) {
                    if depth == 0 {
                        return;
                    }
                    lock.lock();
                    counter.fetch_add(1, Ordering::Relaxed);
                    level(lock, counter, depth - 1);
                    lock.unlock().unwrap();
                }
                level(&lock, &counter, 5);
            })
        };

        let rival = {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                while counter.load(Ordering::Relaxed) == 0 {
                    thread::yield_now();
                }
                lock.lock();
                let seen = counter.load(Ordering::Relaxed);
                lock.unlock().unwrap();
                seen
            })
        };

        recursing.join().unwrap();
        // The rival cannot enter mid-recursion, so it sees all five
        // increments.
        assert_eq!(rival.join().unwrap(), 5);
    }

    // A writer announcing itself blocks new readers, so it gets in even
    // under a continuous reader stream.
    #[test]
    fn fifo_rwlock_writer_is_not_starved_by_readers() {
        let lock = Arc::new(FifoReadWriteLock::new());
        let writer_done = Arc::new(AtomicU64::new(0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let writer_done = Arc::clone(&writer_done);
                thread::spawn(move || {
                    while writer_done.load(Ordering::Relaxed) == 0 {
                        lock.read_lock();
                        thread::sleep(Duration::from_micros(50));
                        lock.read_unlock();
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        let writer = {
            let lock = Arc::clone(&lock);
            let writer_done = Arc::clone(&writer_done);
            thread::spawn(move || {
                lock.write_lock();
                writer_done.store(1, Ordering::Relaxed);
                lock.write_unlock();
            })
        };

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(writer_done.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn countdown_event_joins_a_phase() {
        let event = Arc::new(CountdownEvent::new(3));
        let completed = Arc::new(AtomicU64::new(0));

        let workers: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                let completed = Arc::clone(&completed);
                thread::spawn(move || {
                    completed.fetch_add(1, Ordering::Release);
                    event.signal();
                })
            })
            .collect();

        event.wait();
        assert_eq!(completed.load(Ordering::Acquire), 3);
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
