//! Array-based queue lock.

use std::cell::Cell;
use std::hint;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use super::RawMutex;

thread_local! {
    // Slot taken by this thread's most recent lock(); read back by unlock().
    static MY_SLOT: Cell<usize> = Cell::new(0);
}

/// FIFO lock over a ring of per-waiter flags.
///
/// `lock` claims the next ring slot with one `fetch_add` and spins on that
/// slot's flag alone; `unlock` clears its own flag and sets the successor's.
/// Each flag sits on its own cache line, so waiters do not share lines
/// while spinning.
///
/// `capacity` must be at least the maximum number of threads that can
/// contend for the lock at once; with more, two waiters would wrap onto the
/// same slot. The slot index is kept in thread-local storage between `lock`
/// and `unlock`, so a thread can hold at most one `ArrayLock` at a time.
pub struct ArrayLock {
    flags: Box<[CachePadded<AtomicBool>]>,
    tail: AtomicU64,
    capacity: usize,
}

impl ArrayLock {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ArrayLock needs at least one slot");
        let flags: Box<[CachePadded<AtomicBool>]> = (0..capacity)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect();
        // Slot 0 starts "go" so the first acquirer enters immediately.
        flags[0].store(true, Ordering::Relaxed);
        ArrayLock {
            flags,
            tail: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RawMutex for ArrayLock {
    fn lock(&self) {
        let slot = (self.tail.fetch_add(1, Ordering::Relaxed) as usize) % self.capacity;
        MY_SLOT.with(|s| s.set(slot));
        while !self.flags[slot].load(Ordering::Acquire) {
            hint::spin_loop();
        }
    }

    fn unlock(&self) {
        let slot = MY_SLOT.with(|s| s.get());
        self.flags[slot].store(false, Ordering::Relaxed);
        self.flags[(slot + 1) % self.capacity].store(true, Ordering::Release);
    }
}
