//! Bounded blocking queue.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::preemptive_synchronization::{ConditionVariable, RawMutex, TtasLock};

struct Node<T> {
    value: UnsafeCell<Option<T>>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// The two-lock queue with a capacity; both ends block.
///
/// `enqueue` waits on `not_full` while the queue is at capacity, `dequeue`
/// waits on `not_empty` while it is empty. The waker that observes the
/// emptying or filling transition acquires the *opposite* end's mutex
/// before notifying: without it, the notification could land between the
/// sleeper's final state check and its enqueue onto the condition
/// variable, and be lost. The live size never exceeds `capacity`.
pub struct BoundedQueue<T> {
    capacity: usize,
    size: AtomicUsize,
    head: UnsafeCell<*mut Node<T>>,
    tail: UnsafeCell<*mut Node<T>>,
    enq_mutex: TtasLock,
    not_full: ConditionVariable,
    deq_mutex: TtasLock,
    not_empty: ConditionVariable,
}

// head is only touched under deq_mutex, tail only under enq_mutex.
unsafe impl<T: Send> Send for BoundedQueue<T> {}
unsafe impl<T: Send> Sync for BoundedQueue<T> {}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "BoundedQueue needs capacity of at least one");
        let dummy = Node::alloc(None);
        BoundedQueue {
            capacity,
            size: AtomicUsize::new(0),
            head: UnsafeCell::new(dummy),
            tail: UnsafeCell::new(dummy),
            enq_mutex: TtasLock::new(),
            not_full: ConditionVariable::new(),
            deq_mutex: TtasLock::new(),
            not_empty: ConditionVariable::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current element count; racy outside the locks, exact at quiescence.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `value`, blocking while the queue is full.
    pub fn enqueue(&self, value: T) {
        let node = Node::alloc(Some(value));
        let mut must_wake_dequeuers = false;

        self.enq_mutex.lock();
        self.not_full.wait_while(&self.enq_mutex, || {
            self.size.load(Ordering::Relaxed) == self.capacity
        });
        unsafe {
            let tail = *self.tail.get();
            (*tail).next.store(node, Ordering::Release);
            *self.tail.get() = node;
        }
        if self.size.fetch_add(1, Ordering::Relaxed) == 0 {
            must_wake_dequeuers = true;
        }
        self.enq_mutex.unlock();

        if must_wake_dequeuers {
            // Taking deq_mutex serializes this notify against any dequeuer
            // between its emptiness check and its sleep.
            self.deq_mutex.lock();
            self.not_empty.notify_all();
            self.deq_mutex.unlock();
        }
    }

    /// Remove the oldest element, blocking while the queue is empty.
    pub fn dequeue(&self) -> T {
        let mut must_wake_enqueuers = false;

        self.deq_mutex.lock();
        self.not_empty.wait_while(&self.deq_mutex, || unsafe {
            (*(*self.head.get())).next.load(Ordering::Acquire).is_null()
        });
        let value = unsafe {
            let head = *self.head.get();
            let next = (*head).next.load(Ordering::Acquire);
            let value = (*(*next).value.get())
                .take()
                .expect("non-dummy queue node holds a value");
            *self.head.get() = next;
            drop(Box::from_raw(head));
            value
        };
        if self.size.fetch_sub(1, Ordering::Relaxed) == self.capacity {
            must_wake_enqueuers = true;
        }
        self.deq_mutex.unlock();

        if must_wake_enqueuers {
            // Mirror image of the enqueue-side rule.
            self.enq_mutex.lock();
            self.not_full.notify_all();
            self.enq_mutex.unlock();
        }
        value
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        let mut curr = unsafe { *self.head.get() };
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
