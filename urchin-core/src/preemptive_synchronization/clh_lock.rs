//! CLH queue lock.

use std::cell::Cell;
use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use super::RawMutex;

struct ClhNode {
    // True while the owning thread holds or waits for the lock; false once
    // it has released.
    locked: AtomicBool,
}

impl ClhNode {
    fn alloc() -> *mut ClhNode {
        Box::into_raw(Box::new(ClhNode {
            locked: AtomicBool::new(false),
        }))
    }
}

// Per-thread node slot. `node` is the thread's current queue node; `pred`
// is only meaningful between lock() and unlock(). After unlock the thread
// repurposes its predecessor's node as its own, and ownership of the
// released node passes to the queue (ultimately to the successor, or to the
// lock's destructor if there is none).
struct ClhThreadSlot {
    node: Cell<*mut ClhNode>,
    pred: Cell<*mut ClhNode>,
}

impl ClhThreadSlot {
    fn new() -> Self {
        ClhThreadSlot {
            node: Cell::new(ClhNode::alloc()),
            pred: Cell::new(ptr::null_mut()),
        }
    }
}

impl Drop for ClhThreadSlot {
    fn drop(&mut self) {
        // At thread exit the slot's node is not linked into any queue (the
        // thread is not inside lock/unlock), so it can be freed here.
        let node = self.node.get();
        if !node.is_null() {
            drop(unsafe { Box::from_raw(node) });
        }
    }
}

thread_local! {
    static MY_SLOT: ClhThreadSlot = ClhThreadSlot::new();
}

/// FIFO queue lock; each waiter spins on its predecessor's node.
///
/// `lock` marks its own node held, swaps it into the tail, and spins until
/// the previous tail's `locked` flag clears. `unlock` clears the flag and
/// then inherits the predecessor's node as the thread's next queue node,
/// which is what reclaims released nodes without any free list.
///
/// The node slot is thread-local and shared by all `ClhLock` instances: a
/// thread may hold at most one `ClhLock` at a time, and must not exit while
/// queued.
pub struct ClhLock {
    tail: AtomicPtr<ClhNode>,
}

impl ClhLock {
    pub fn new() -> Self {
        ClhLock {
            // The initial node reads as a released predecessor.
            tail: AtomicPtr::new(ClhNode::alloc()),
        }
    }
}

impl Default for ClhLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClhLock {
    fn drop(&mut self) {
        // The resting tail node is owned by the lock: the last unlocker
        // took its predecessor's node and left its own behind.
        drop(unsafe { Box::from_raw(self.tail.load(Ordering::Relaxed)) });
    }
}

impl RawMutex for ClhLock {
    fn lock(&self) {
        MY_SLOT.with(|slot| {
            let qnode = slot.node.get();
            unsafe { &*qnode }.locked.store(true, Ordering::Release);
            let pred = self.tail.swap(qnode, Ordering::AcqRel);
            slot.pred.set(pred);
            while unsafe { &*pred }.locked.load(Ordering::Acquire) {
                hint::spin_loop();
            }
        });
    }

    fn unlock(&self) {
        MY_SLOT.with(|slot| {
            let qnode = slot.node.get();
            unsafe { &*qnode }.locked.store(false, Ordering::Release);
            // Reuse the predecessor's node as our own next node.
            slot.node.set(slot.pred.get());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_tests::mutex_core_tests;

    #[test]
    fn clh_counter_stress() {
        mutex_core_tests::counter_stress(ClhLock::new(), 8, 10_000);
    }

    #[test]
    fn clh_exclusion_invariant() {
        mutex_core_tests::mutual_exclusion_invariant(ClhLock::new(), 4, 2_000);
    }

    #[test]
    fn node_inheritance_across_repeated_acquires() {
        let lock = ClhLock::new();
        for _ in 0..100 {
            lock.lock();
            lock.unlock();
        }
    }
}
