//! CLH-style queue lock with timeout.

use std::cell::Cell;
use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::time::{Duration, Instant};

/// Queue node. The `pred` pointer is tri-state:
/// - null: the owning thread is waiting for the lock;
/// - the `AVAILABLE` sentinel: the owner released the lock;
/// - any other non-null node: the owner abandoned its attempt, and
///   successors should wait on that predecessor instead.
struct TimeoutNode {
    pred: AtomicPtr<TimeoutNode>,
    // Intrusive chain of every node this lock ever allocated; freed when
    // the lock drops.
    next_allocated: AtomicPtr<TimeoutNode>,
}

impl TimeoutNode {
    fn alloc() -> *mut TimeoutNode {
        Box::into_raw(Box::new(TimeoutNode {
            pred: AtomicPtr::new(ptr::null_mut()),
            next_allocated: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

// Sentinel meaning "released". Only its address is ever used.
static AVAILABLE: TimeoutNode = TimeoutNode {
    pred: AtomicPtr::new(ptr::null_mut()),
    next_allocated: AtomicPtr::new(ptr::null_mut()),
};

fn available() -> *mut TimeoutNode {
    &AVAILABLE as *const TimeoutNode as *mut TimeoutNode
}

thread_local! {
    // Node of this thread's most recent successful try_lock, for unlock().
    static MY_NODE: Cell<*mut TimeoutNode> = Cell::new(ptr::null_mut());
}

/// A CLH variant whose waiters can give up.
///
/// A thread that times out either CASes itself off the tail (if it is
/// last) or leaves its node in the queue marked abandoned, pointing at its
/// own predecessor so that successors skip over it without ever blocking
/// on the dead node. Wait-free timeout, FIFO among threads that stay.
///
/// Each `try_lock` attempt allocates a fresh node; abandoned and released
/// nodes stay allocated (successors may still be reading them) and are
/// reclaimed in bulk when the lock is dropped. One acquisition per thread
/// at a time, as with the other queue locks.
pub struct TimeoutLock {
    tail: AtomicPtr<TimeoutNode>,
    allocated: AtomicPtr<TimeoutNode>,
}

impl TimeoutLock {
    pub fn new() -> Self {
        TimeoutLock {
            tail: AtomicPtr::new(ptr::null_mut()),
            allocated: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Try to acquire the lock, giving up after `timeout`.
    ///
    /// Returns `true` on acquisition. On `false` the attempt left no
    /// observable state except possibly an abandoned queue node.
    pub fn try_lock(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let qnode = TimeoutNode::alloc();
        self.register_allocation(qnode);
        MY_NODE.with(|node| node.set(qnode));

        let mut my_pred = self.tail.swap(qnode, Ordering::AcqRel);
        if my_pred.is_null() || unsafe { &*my_pred }.pred.load(Ordering::Acquire) == available() {
            // Queue was empty, or the predecessor already released.
            return true;
        }

        while start.elapsed() < timeout {
            let pred_pred = unsafe { &*my_pred }.pred.load(Ordering::Acquire);
            if pred_pred == available() {
                return true;
            }
            if !pred_pred.is_null() {
                // Predecessor abandoned; skip to its predecessor.
                my_pred = pred_pred;
            }
            hint::spin_loop();
        }

        // Timed out. If we are the tail, unlink ourselves entirely;
        // otherwise mark the node abandoned for successors to skip.
        if self
            .tail
            .compare_exchange(qnode, my_pred, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            unsafe { &*qnode }.pred.store(my_pred, Ordering::Release);
        }
        false
    }

    /// Release the lock acquired by this thread's last `try_lock`.
    pub fn unlock(&self) {
        let qnode = MY_NODE.with(|node| node.replace(ptr::null_mut()));
        debug_assert!(!qnode.is_null(), "unlock without a held TimeoutLock");
        // With no successor, close the queue; otherwise signal release
        // through the pred pointer.
        if self
            .tail
            .compare_exchange(qnode, ptr::null_mut(), Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            unsafe { &*qnode }.pred.store(available(), Ordering::Release);
        }
    }

    fn register_allocation(&self, node: *mut TimeoutNode) {
        let mut head = self.allocated.load(Ordering::Relaxed);
        loop {
            unsafe { &*node }.next_allocated.store(head, Ordering::Relaxed);
            match self
                .allocated
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }
}

impl Default for TimeoutLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutLock {
    fn drop(&mut self) {
        let mut curr = self.allocated.load(Ordering::Relaxed);
        while !curr.is_null() {
            let next = unsafe { &*curr }.next_allocated.load(Ordering::Relaxed);
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
