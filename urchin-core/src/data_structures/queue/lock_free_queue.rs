//! Michael-Scott lock-free queue.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::EmptyError;
use crate::guard::{DeferredGuard, Guard};

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

    unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Lock-free FIFO queue with a lagging tail.
///
/// Enqueue links the new node onto `tail.next` and then swings `tail`
/// forward; since any thread can observe a half-finished enqueue, every
/// operation that finds `tail.next` non-null helps by swinging the tail
/// itself before retrying. Dequeue swings `head` to the next node, whose
/// value it takes; the old dummy is handed to the guard.
///
/// Dequeued dummies are only reclaimed when the guard decides it is safe
/// (at drop for the default [`DeferredGuard`]), which is also what makes
/// the bare pointer CASes immune to ABA here.
pub struct LockFreeQueue<T, G = DeferredGuard> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    guard: G,
}

unsafe impl<T: Send, G: Send> Send for LockFreeQueue<T, G> {}
unsafe impl<T: Send, G: Sync> Sync for LockFreeQueue<T, G> {}

impl<T> LockFreeQueue<T, DeferredGuard> {
    pub fn new() -> Self {
        Self::with_guard()
    }
}

impl<T, G: Guard> LockFreeQueue<T, G> {
    pub fn with_guard() -> Self {
        let dummy = Node::alloc(None);
        LockFreeQueue {
            head: AtomicPtr::new(dummy),
            tail: AtomicPtr::new(dummy),
            guard: G::default(),
        }
    }

    pub fn enqueue(&self, value: T) {
        let node = Node::alloc(Some(value));
        loop {
            let last = self.tail.load(Ordering::Acquire);
            let next = unsafe { &*last }.next.load(Ordering::Acquire);
            if last != self.tail.load(Ordering::Relaxed) {
                continue;
            }
            if next.is_null() {
                // Link, then swing the tail; the swing may lose to a
                // helper, which is fine.
                if unsafe { &*last }
                    .next
                    .compare_exchange(ptr::null_mut(), node, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
                {
                    let _ = self.tail.compare_exchange(
                        last,
                        node,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    return;
                }
            } else {
                // Tail lags behind a finished link: help it forward.
                let _ =
                    self.tail
                        .compare_exchange(last, next, Ordering::Release, Ordering::Relaxed);
            }
        }
    }

    pub fn dequeue(&self) -> Result<T, EmptyError> {
        loop {
            let first = self.head.load(Ordering::Acquire);
            let last = self.tail.load(Ordering::Acquire);
            let next = unsafe { &*first }.next.load(Ordering::Acquire);
            if first != self.head.load(Ordering::Relaxed) {
                continue;
            }
            if first == last {
                if next.is_null() {
                    return Err(EmptyError);
                }
                // An enqueue is mid-flight: help the tail along.
                let _ =
                    self.tail
                        .compare_exchange(last, next, Ordering::Release, Ordering::Relaxed);
            } else if self
                .head
                .compare_exchange(first, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // next is the new dummy; only this thread reads its value.
                let value = unsafe { (*(*next).value.get()).take() }
                    .expect("non-dummy queue node holds a value");
                unsafe { self.guard.defer_destroy(first, Node::dealloc) };
                return Ok(value);
            }
        }
    }
}

impl<T> Default for LockFreeQueue<T, DeferredGuard> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G> Drop for LockFreeQueue<T, G> {
    fn drop(&mut self) {
        let mut curr = self.head.load(Ordering::Relaxed);
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
