//! Zero-capacity rendezvous queue.

use std::cell::{Cell, UnsafeCell};

use crate::preemptive_synchronization::{ConditionVariable, RawMutex, TtasLock};

/// A queue with no buffer at all: every enqueue waits for the dequeue that
/// consumes its item, and vice versa.
///
/// At most one enqueuer is publishing at any time (the `enqueuing` flag);
/// at most one item is resident. Both sides share one mutex and one
/// condition variable, so each state change simply wakes everyone and the
/// predicates sort out who proceeds.
pub struct SynchronousQueue<T> {
    mutex: TtasLock,
    cv: ConditionVariable,
    item: UnsafeCell<Option<T>>,
    enqueuing: Cell<bool>,
}

// item/enqueuing are only touched under `mutex`.
unsafe impl<T: Send> Send for SynchronousQueue<T> {}
unsafe impl<T: Send> Sync for SynchronousQueue<T> {}

impl<T> SynchronousQueue<T> {
    pub fn new() -> Self {
        SynchronousQueue {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            item: UnsafeCell::new(None),
            enqueuing: Cell::new(false),
        }
    }

    /// Publish `value` and block until a dequeuer takes it.
    pub fn enqueue(&self, value: T) {
        self.mutex.lock();
        // Wait for the slot: only one enqueuer publishes at a time.
        self.cv.wait_while(&self.mutex, || self.enqueuing.get());
        self.enqueuing.set(true);
        unsafe { *self.item.get() = Some(value) };
        self.cv.notify_all();
        // Wait for a dequeuer to consume the item.
        self.cv
            .wait_while(&self.mutex, || unsafe { (*self.item.get()).is_some() });
        self.enqueuing.set(false);
        self.cv.notify_all();
        self.mutex.unlock();
    }

    /// Block until an item is published, take it, and release the
    /// enqueuer.
    pub fn dequeue(&self) -> T {
        self.mutex.lock();
        self.cv
            .wait_while(&self.mutex, || unsafe { (*self.item.get()).is_none() });
        let value = unsafe { (*self.item.get()).take() }.expect("rendezvous item present");
        self.cv.notify_all();
        self.mutex.unlock();
        value
    }
}

impl<T> Default for SynchronousQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
