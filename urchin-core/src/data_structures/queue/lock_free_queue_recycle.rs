//! Michael-Scott queue with node recycling.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::Ordering;

use crate::atomic_ptr::AtomicStampedPtr;
use crate::error::EmptyError;

struct Node<T> {
    value: UnsafeCell<Option<T>>,
    next: AtomicStampedPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(value),
            next: AtomicStampedPtr::default(),
        }))
    }
}

/// Treiber free-list of retired nodes.
///
/// Pops and pushes go through stamped CAS so that a node that cycles out
/// of the pool and back cannot satisfy a stale observation. Operations are
/// relaxed: the enqueue/dequeue protocol that hands nodes in and out
/// carries the publication ordering.
struct NodePool<T> {
    unused: AtomicStampedPtr<Node<T>>,
}

impl<T> NodePool<T> {
    fn new() -> Self {
        NodePool {
            unused: AtomicStampedPtr::default(),
        }
    }

    fn allocate(&self, value: Option<T>) -> *mut Node<T> {
        loop {
            let (head, stamp) = self.unused.get(Ordering::Relaxed);
            if head.is_null() {
                return Node::alloc(value);
            }
            let next = unsafe { &*head }.next.ptr(Ordering::Relaxed);
            if self.unused.compare_and_swap(
                head,
                next,
                stamp,
                stamp + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                // The node is privately owned from here on.
                unsafe { *(*head).value.get() = value };
                unsafe { &*head }.next.set(ptr::null_mut(), 0, Ordering::Relaxed);
                return head;
            }
        }
    }

    fn free(&self, node: *mut Node<T>) {
        loop {
            let (head, stamp) = self.unused.get(Ordering::Relaxed);
            unsafe { &*node }.next.set(head, 0, Ordering::Relaxed);
            if self.unused.compare_and_swap(
                head,
                node,
                stamp,
                stamp + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                return;
            }
        }
    }
}

impl<T> Drop for NodePool<T> {
    fn drop(&mut self) {
        let mut curr = self.unused.ptr(Ordering::Relaxed);
        while !curr.is_null() {
            let next = unsafe { (*curr).next.ptr(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}

/// Michael-Scott queue whose retired dummies are recycled immediately.
///
/// Because a dequeued dummy can be reused as a brand-new node while some
/// straggler still holds its address, every shared pointer (`head`,
/// `tail`, each `next`, and the pool's free list) is an
/// [`AtomicStampedPtr`] and every update bumps the stamp. A stale
/// `(pointer, stamp)` observation then fails its CAS no matter how the
/// addresses have been recycled in between.
pub struct LockFreeQueueRecycle<T> {
    head: AtomicStampedPtr<Node<T>>,
    tail: AtomicStampedPtr<Node<T>>,
    pool: NodePool<T>,
}

unsafe impl<T: Send> Send for LockFreeQueueRecycle<T> {}
unsafe impl<T: Send> Sync for LockFreeQueueRecycle<T> {}

impl<T> LockFreeQueueRecycle<T> {
    pub fn new() -> Self {
        let pool = NodePool::new();
        let dummy = pool.allocate(None);
        let queue = LockFreeQueueRecycle {
            head: AtomicStampedPtr::new(dummy, 0),
            tail: AtomicStampedPtr::new(dummy, 0),
            pool,
        };
        queue
    }

    pub fn enqueue(&self, value: T) {
        let node = self.pool.allocate(Some(value));
        loop {
            let (last, last_stamp) = self.tail.get(Ordering::Acquire);
            let (next, next_stamp) = unsafe { &*last }.next.get(Ordering::Acquire);
            if last_stamp != self.tail.stamp(Ordering::Relaxed) {
                continue;
            }
            if next.is_null() {
                if unsafe { &*last }.next.compare_and_swap(
                    next,
                    node,
                    next_stamp,
                    next_stamp + 1,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    // Swing the tail; losing to a helper is fine.
                    self.tail.compare_and_swap(
                        last,
                        node,
                        last_stamp,
                        last_stamp + 1,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    return;
                }
            } else {
                self.tail.compare_and_swap(
                    last,
                    next,
                    last_stamp,
                    last_stamp + 1,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
            }
        }
    }

    pub fn dequeue(&self) -> Result<T, EmptyError> {
        loop {
            let (first, first_stamp) = self.head.get(Ordering::Relaxed);
            let (last, last_stamp) = self.tail.get(Ordering::Acquire);
            let (next, _) = unsafe { &*first }.next.get(Ordering::Acquire);
            if first_stamp != self.head.stamp(Ordering::Relaxed) {
                continue;
            }
            if first == last {
                if next.is_null() {
                    return Err(EmptyError);
                }
                self.tail.compare_and_swap(
                    last,
                    next,
                    last_stamp,
                    last_stamp + 1,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
            } else if self.head.compare_and_swap(
                first,
                next,
                first_stamp,
                first_stamp + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                let value = unsafe { (*(*next).value.get()).take() }
                    .expect("non-dummy queue node holds a value");
                self.pool.free(first);
                return Ok(value);
            }
        }
    }
}

impl<T> Default for LockFreeQueueRecycle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueueRecycle<T> {
    fn drop(&mut self) {
        // Main chain first; the pool drops its free list afterwards.
        let mut curr = self.head.ptr(Ordering::Relaxed);
        while !curr.is_null() {
            let next = unsafe { (*curr).next.ptr(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_single_thread() {
        let queue = LockFreeQueueRecycle::new();
        assert_eq!(queue.dequeue(), Err(EmptyError));
        queue.enqueue(1);
        queue.enqueue(2);
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Ok(2));
        assert_eq!(queue.dequeue(), Err(EmptyError));
    }

    #[test]
    fn nodes_are_recycled_through_the_pool() {
        let queue = LockFreeQueueRecycle::new();
        // Each dequeue retires a dummy that the next enqueue reuses, so
        // churning the queue keeps it correct through heavy recycling.
        for round in 0..10_000u64 {
            queue.enqueue(round);
            assert_eq!(queue.dequeue(), Ok(round));
        }
    }

    #[test]
    fn mpmc_transfers_every_value_once() {
        let queue = Arc::new(LockFreeQueueRecycle::new());
        let num_threads = 4u64;
        let per_thread = 2_500u64;
        let consumed_sum = Arc::new(AtomicU64::new(0));
        let consumed_count = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let queue = Arc::clone(&queue);
                let consumed_sum = Arc::clone(&consumed_sum);
                let consumed_count = Arc::clone(&consumed_count);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        queue.enqueue(t * per_thread + i);
                        if let Ok(value) = queue.dequeue() {
                            consumed_sum.fetch_add(value, AtomicOrdering::Relaxed);
                            consumed_count.fetch_add(1, AtomicOrdering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Every interleaved dequeue found a value (each thread enqueues
        // before it dequeues), so all values transferred exactly once.
        assert_eq!(
            consumed_count.load(AtomicOrdering::Relaxed),
            num_threads * per_thread
        );
        let expected: u64 = (0..num_threads * per_thread).sum();
        assert_eq!(consumed_sum.load(AtomicOrdering::Relaxed), expected);
    }
}
