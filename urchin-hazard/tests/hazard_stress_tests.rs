#[cfg(test)]
mod hazard_stress_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use urchin_hazard::{HazardDomain, HazardStack, ReservationError};

    // Readers keep reserving and validating the published pointer while a
    // writer keeps swapping and retiring it; no reader may ever observe a
    // freed value. Any use-after-free here is loud under sanitizers.
    #[test]
    fn readers_never_observe_a_reclaimed_node() {
        use std::sync::atomic::AtomicPtr;

        let domain = HazardDomain::new();
        let published = AtomicPtr::new(Box::into_raw(Box::new(0u64)));
        let rounds = 5_000u64;

        unsafe fn dealloc_box(ptr: *mut u64) {
            drop(unsafe { Box::from_raw(ptr) });
        }

        thread::scope(|scope| {
            // Writer: replace the published node, retire the old one.
            scope.spawn(|| {
                let writer = domain.register(1);
                for round in 1..=rounds {
                    let fresh = Box::into_raw(Box::new(round));
                    let old = published.swap(fresh, Ordering::AcqRel);
                    writer.op_begin();
                    unsafe { writer.schedule_for_reclaim(old, dealloc_box) };
                    writer.op_end();
                }
            });

            for _ in 0..3 {
                scope.spawn(|| {
                    let reader = domain.register(1);
                    let mut last_seen = 0u64;
                    while last_seen < rounds {
                        reader.op_begin();
                        let ptr = published.load(Ordering::Acquire);
                        if reader.try_reserve(ptr).is_ok() {
                            // The reservation only protects ptr if it is
                            // still published.
                            if published.load(Ordering::Acquire) == ptr {
                                let value = unsafe { *ptr };
                                assert!(value >= last_seen, "stale or freed value");
                                last_seen = value;
                            }
                            reader.unreserve(ptr);
                        }
                        reader.op_end();
                    }
                });
            }
        });

        // The final published node was never retired.
        drop(unsafe { Box::from_raw(published.load(Ordering::Relaxed)) });
    }

    #[test]
    fn reservation_slots_are_per_thread() {
        let domain = HazardDomain::new();
        let thread_a = domain.register(1);
        let thread_b = domain.register(1);

        let mut x = 5u64;
        assert!(thread_a.try_reserve(&mut x as *mut u64).is_ok());
        // A full slot on one thread does not consume the other's.
        assert!(thread_b.try_reserve(&mut x as *mut u64).is_ok());
        assert_eq!(
            thread_a.try_reserve(&mut x as *mut u64),
            Err(ReservationError)
        );
    }

    #[test]
    fn hazard_stack_mpmc_conserves_values() {
        let stack = HazardStack::new();
        let num_threads = 8u64;
        let per_thread = 2_000u64;
        let popped_sum = AtomicU64::new(0);
        let barrier = Barrier::new(num_threads as usize);

        thread::scope(|scope| {
            for t in 0..num_threads {
                let stack = &stack;
                let popped_sum = &popped_sum;
                let barrier = &barrier;
                scope.spawn(move || {
                    let handle = stack.handle();
                    barrier.wait();
                    for i in 0..per_thread {
                        handle.push(t * per_thread + i);
                        let value = handle.pop().expect("own push precedes pop");
                        popped_sum.fetch_add(value, Ordering::Relaxed);
                    }
                });
            }
        });

        let expected: u64 = (0..num_threads * per_thread).sum();
        assert_eq!(popped_sum.load(Ordering::Relaxed), expected);
        assert_eq!(stack.handle().pop(), Err(urchin_core::EmptyError));
    }
}
