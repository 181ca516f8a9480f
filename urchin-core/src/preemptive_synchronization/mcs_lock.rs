//! MCS queue lock.

use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::backoff::{Backoff, Micros};

use super::RawMutex;

// Spin-wait backoff window while watching the local `locked` flag.
const SPIN_MIN_DELAY_MICROS: u64 = 5;
const SPIN_MAX_DELAY_MICROS: u64 = 25;

struct McsNode {
    locked: AtomicBool,
    next: AtomicPtr<McsNode>,
}

impl McsNode {
    const fn new() -> Self {
        McsNode {
            locked: AtomicBool::new(false),
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

thread_local! {
    // One queue node per thread. The node's address must stay stable while
    // the thread sits in some lock's queue, hence the Box.
    static MY_NODE: Box<McsNode> = Box::new(McsNode::new());
}

fn my_node() -> *mut McsNode {
    MY_NODE.with(|node| &**node as *const McsNode as *mut McsNode)
}

/// FIFO queue lock; each waiter spins on a flag in its own node.
///
/// `lock` swaps itself to the queue tail and, if there was a predecessor,
/// links itself behind it and spins locally until woken. `unlock` hands the
/// critical section to the successor, or CASes the tail back to empty when
/// there is none.
///
/// The queue node lives in thread-local storage, one per thread for all
/// `McsLock` instances: a thread may hold at most one `McsLock` at a time,
/// and must not exit while queued.
pub struct McsLock {
    tail: AtomicPtr<McsNode>,
}

impl McsLock {
    pub const fn new() -> Self {
        McsLock {
            tail: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl Default for McsLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex for McsLock {
    fn lock(&self) {
        let qnode = my_node();
        let pred = self.tail.swap(qnode, Ordering::AcqRel);
        if !pred.is_null() {
            let node = unsafe { &*qnode };
            node.locked.store(true, Ordering::Relaxed);
            // Release so the predecessor's wake-up load sees an initialized
            // node behind the pointer.
            unsafe { &*pred }.next.store(qnode, Ordering::Release);

            let mut backoff =
                Backoff::<Micros>::new(SPIN_MIN_DELAY_MICROS, SPIN_MAX_DELAY_MICROS);
            while node.locked.load(Ordering::Acquire) {
                backoff.backoff();
            }
        }
    }

    fn unlock(&self) {
        let qnode = my_node();
        let node = unsafe { &*qnode };
        let mut succ = node.next.load(Ordering::Acquire);
        if succ.is_null() {
            // No visible successor: try to close the queue.
            if self
                .tail
                .compare_exchange(qnode, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            // A successor swapped the tail but has not linked in yet.
            while succ.is_null() {
                hint::spin_loop();
                succ = node.next.load(Ordering::Acquire);
            }
        }
        unsafe { &*succ }.locked.store(false, Ordering::Release);
        node.next.store(ptr::null_mut(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_tests::mutex_core_tests;

    #[test]
    fn mcs_counter_stress() {
        mutex_core_tests::counter_stress(McsLock::new(), 8, 10_000);
    }

    #[test]
    fn mcs_exclusion_invariant() {
        mutex_core_tests::mutual_exclusion_invariant(McsLock::new(), 4, 2_000);
    }

    #[test]
    fn uncontended_lock_unlock() {
        let lock = McsLock::new();
        lock.lock();
        lock.unlock();
        lock.lock();
        lock.unlock();
    }
}
