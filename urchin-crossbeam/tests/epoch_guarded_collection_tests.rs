#[cfg(test)]
mod epoch_guarded_collection_tests {
    use std::collections::hash_map::RandomState;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use urchin_core::common_tests::ordered_set_core_tests;
    use urchin_core::data_structures::{
        LazyList, LockFreeList, LockFreeQueue, LockFreeStack, OptimisticList, OrderedSet,
    };
    use urchin_crossbeam::EpochGuard;

    fn epoch_list<T>() -> LockFreeList<T, EpochGuard, RandomState> {
        LockFreeList::with_hasher(RandomState::new())
    }

    #[test]
    fn lock_free_list_basic_under_epochs() {
        let list = epoch_list::<u64>();
        ordered_set_core_tests::test_basic_operations(&list);
    }

    #[test]
    fn lock_free_list_mixed_accounting_under_epochs() {
        ordered_set_core_tests::test_mixed_operation_accounting(Arc::new(epoch_list()), 4, 1_000);
    }

    #[test]
    fn optimistic_and_lazy_lists_under_epochs() {
        let optimistic: OptimisticList<u64, EpochGuard, RandomState> =
            OptimisticList::with_hasher(RandomState::new());
        ordered_set_core_tests::test_basic_operations(&optimistic);

        let lazy: LazyList<u64, EpochGuard, RandomState> = LazyList::with_hasher(RandomState::new());
        ordered_set_core_tests::test_basic_operations(&lazy);
        ordered_set_core_tests::test_mixed_operation_accounting(
            Arc::new(LazyList::<u64, EpochGuard, RandomState>::with_hasher(
                RandomState::new(),
            )),
            4,
            1_000,
        );
    }

    // Long-running churn: with epoch reclamation the footprint stays
    // bounded while removals keep linearizing correctly.
    #[test]
    fn sustained_churn_reclaims_as_it_goes() {
        let list = Arc::new(epoch_list::<u64>());
        let num_threads = 8;
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads as u64)
            .map(|t| {
                let list = Arc::clone(&list);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for round in 0..5_000u64 {
                        let key = (t * 13 + round) % 32;
                        if round % 2 == 0 {
                            list.add(key);
                        } else {
                            list.remove(&key);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(list.len() <= 32);
    }

    #[test]
    fn lock_free_queue_under_epochs() {
        let queue: Arc<LockFreeQueue<u64, EpochGuard>> = Arc::new(LockFreeQueue::with_guard());
        let num_threads = 4u64;
        let per_thread = 2_000u64;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        queue.enqueue(t * per_thread + i);
                        queue.dequeue().expect("own enqueue precedes dequeue");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.dequeue().is_err());
    }

    #[test]
    fn treiber_stack_under_epochs() {
        let stack: Arc<LockFreeStack<u64, EpochGuard>> =
            Arc::new(LockFreeStack::with_backoff(1, 20));
        let num_threads = 4u64;
        let per_thread = 2_000u64;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        stack.push(t * per_thread + i);
                        stack.pop().expect("own push precedes pop");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(stack.pop().is_err());
    }
}
