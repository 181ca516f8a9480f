//! Two-lock unbounded queue.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::EmptyError;
use crate::preemptive_synchronization::{ScopedLock, TtasLock};

struct Node<T> {
    // Written by the enqueuer before publication, taken by the one
    // dequeuer that advances head past this node.
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

/// Unbounded FIFO queue with one mutex per end.
///
/// The dummy head keeps the ends disjoint: enqueuers touch only `tail`,
/// dequeuers only `head`, so an enqueue and a dequeue never contend with
/// each other (the link pointer they can share when the queue is empty is
/// atomic). `dequeue` on an empty queue returns [`EmptyError`] rather than
/// blocking.
pub struct UnboundedQueue<T> {
    head: UnsafeCell<*mut Node<T>>,
    tail: UnsafeCell<*mut Node<T>>,
    enq_mutex: TtasLock,
    deq_mutex: TtasLock,
}

// head is only touched under deq_mutex, tail only under enq_mutex.
unsafe impl<T: Send> Send for UnboundedQueue<T> {}
unsafe impl<T: Send> Sync for UnboundedQueue<T> {}

impl<T> UnboundedQueue<T> {
    pub fn new() -> Self {
        let dummy = Node::alloc(None);
        UnboundedQueue {
            head: UnsafeCell::new(dummy),
            tail: UnsafeCell::new(dummy),
            enq_mutex: TtasLock::new(),
            deq_mutex: TtasLock::new(),
        }
    }

    pub fn enqueue(&self, value: T) {
        let node = Node::alloc(Some(value));
        let _guard = ScopedLock::new(&self.enq_mutex);
        unsafe {
            let tail = *self.tail.get();
            (*tail).next.store(node, Ordering::Release);
            *self.tail.get() = node;
        }
    }

    pub fn dequeue(&self) -> Result<T, EmptyError> {
        let _guard = ScopedLock::new(&self.deq_mutex);
        unsafe {
            let head = *self.head.get();
            let next = (*head).next.load(Ordering::Acquire);
            if next.is_null() {
                return Err(EmptyError);
            }
            let value = (*(*next).value.get())
                .take()
                .expect("non-dummy queue node holds a value");
            // next becomes the new dummy; the old one is ours to free.
            *self.head.get() = next;
            drop(Box::from_raw(head));
            Ok(value)
        }
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for UnboundedQueue<T> {
    fn drop(&mut self) {
        let mut curr = unsafe { *self.head.get() };
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_single_thread() {
        let queue = UnboundedQueue::new();
        assert_eq!(queue.dequeue(), Err(EmptyError));
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Ok(2));
        assert_eq!(queue.dequeue(), Ok(3));
        assert_eq!(queue.dequeue(), Err(EmptyError));
    }

    #[test]
    fn per_producer_order_is_preserved() {
        let queue = Arc::new(UnboundedQueue::new());
        let num_producers = 4u64;
        let per_producer = 1_000u64;

        let producers: Vec<_> = (0..num_producers)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.enqueue(p * per_producer + i);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last_seen = vec![None::<u64>; num_producers as usize];
        let mut count = 0;
        while let Ok(value) = queue.dequeue() {
            let producer = (value / per_producer) as usize;
            if let Some(previous) = last_seen[producer] {
                assert!(previous < value, "producer {producer} order violated");
            }
            last_seen[producer] = Some(value);
            count += 1;
        }
        assert_eq!(count, num_producers * per_producer);
    }
}
