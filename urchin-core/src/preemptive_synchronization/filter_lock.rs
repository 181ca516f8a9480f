//! The Filter lock, Peterson's algorithm generalized to n threads.

use std::hint;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Starvation-free n-thread lock with `n - 1` elimination levels.
///
/// A thread at level `i` may advance when no other thread sits at level
/// `>= i`, or when it is no longer level `i`'s victim. At most `n - k`
/// threads pass level `k`, so exactly one reaches the top.
///
/// Thread identity is an explicit index in `0..num_threads`, passed to
/// every call, so this lock does not implement
/// [`RawMutex`](super::RawMutex). Like the Peterson lock it is built on,
/// the level/victim protocol requires sequentially consistent atomics.
pub struct FilterLock {
    level: Box<[AtomicUsize]>,
    victim: Box<[AtomicUsize]>,
    num_threads: usize,
}

impl FilterLock {
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads >= 1, "FilterLock needs at least one thread");
        FilterLock {
            level: (0..num_threads).map(|_| AtomicUsize::new(0)).collect(),
            victim: (0..num_threads).map(|_| AtomicUsize::new(0)).collect(),
            num_threads,
        }
    }

    pub fn lock(&self, me: usize) {
        assert!(me < self.num_threads, "thread index out of range");
        for i in 1..self.num_threads {
            self.level[me].store(i, Ordering::SeqCst);
            self.victim[i].store(me, Ordering::SeqCst);

            // Spin while some other thread is at our level or above and we
            // are still this level's victim.
            loop {
                let conflict = (0..self.num_threads).any(|k| {
                    k != me
                        && self.level[k].load(Ordering::SeqCst) >= i
                        && self.victim[i].load(Ordering::SeqCst) == me
                });
                if !conflict {
                    break;
                }
                hint::spin_loop();
            }
        }
    }

    pub fn unlock(&self, me: usize) {
        assert!(me < self.num_threads, "thread index out of range");
        self.level[me].store(0, Ordering::SeqCst);
    }
}
