//! Peterson's two-thread lock.

use std::hint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Starvation-free mutual exclusion for exactly two participants.
///
/// The participants identify themselves by slot `0` or `1` on every call,
/// so this lock does not implement [`RawMutex`](super::RawMutex). All
/// accesses are sequentially consistent: the algorithm's correctness
/// argument interleaves the `flag` and `victim` writes of both threads in
/// one total order, and weaker orderings break it.
pub struct PetersonLock {
    flag: [AtomicBool; 2],
    victim: AtomicUsize,
}

impl PetersonLock {
    pub const fn new() -> Self {
        PetersonLock {
            flag: [AtomicBool::new(false), AtomicBool::new(false)],
            victim: AtomicUsize::new(0),
        }
    }

    pub fn lock(&self, me: usize) {
        assert!(me < 2, "PetersonLock slots are 0 and 1");
        let other = 1 - me;
        self.flag[me].store(true, Ordering::SeqCst); // I'm interested.
        self.victim.store(me, Ordering::SeqCst); // You go first.
        while self.flag[other].load(Ordering::SeqCst) && self.victim.load(Ordering::SeqCst) == me {
            hint::spin_loop();
        }
    }

    pub fn unlock(&self, me: usize) {
        assert!(me < 2, "PetersonLock slots are 0 and 1");
        self.flag[me].store(false, Ordering::SeqCst);
    }
}

impl Default for PetersonLock {
    fn default() -> Self {
        Self::new()
    }
}
