//! Treiber stack.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::backoff::{Backoff, Micros};
use crate::error::EmptyError;
use crate::guard::{DeferredGuard, Guard};

// Backoff window on CAS failure, in microseconds.
const DEFAULT_MIN_DELAY: u64 = 5;
const DEFAULT_MAX_DELAY: u64 = 25;

pub(super) struct Node<T> {
    pub(super) value: UnsafeCell<Option<T>>,
    pub(super) next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    pub(super) fn alloc(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(Some(value)),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    pub(super) unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Lock-free LIFO stack.
///
/// `push` links the new node above the observed top and CASes `top`;
/// `pop` CASes `top` down to the observed successor. Either CAS failing
/// means another thread won; the loser backs off for a randomized delay
/// and retries. `pop` of an empty stack returns [`EmptyError`].
///
/// Popped nodes go to the guard, which both defers their reclamation past
/// any concurrent `pop` still holding the address and rules out ABA on
/// the `top` CAS.
pub struct LockFreeStack<T, G = DeferredGuard> {
    top: AtomicPtr<Node<T>>,
    guard: G,
    min_delay: u64,
    max_delay: u64,
}

unsafe impl<T: Send, G: Send> Send for LockFreeStack<T, G> {}
unsafe impl<T: Send, G: Sync> Sync for LockFreeStack<T, G> {}

impl<T> LockFreeStack<T, DeferredGuard> {
    pub fn new() -> Self {
        Self::with_backoff(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl<T, G: Guard> LockFreeStack<T, G> {
    /// Backoff window in microseconds.
    pub fn with_backoff(min_delay: u64, max_delay: u64) -> Self {
        LockFreeStack {
            top: AtomicPtr::new(ptr::null_mut()),
            guard: G::default(),
            min_delay,
            max_delay,
        }
    }

    pub fn push(&self, value: T) {
        let node = Node::alloc(value);
        let mut backoff = Backoff::<Micros>::new(self.min_delay, self.max_delay);
        loop {
            if self.try_push(node) {
                return;
            }
            backoff.backoff();
        }
    }

    pub fn pop(&self) -> Result<T, EmptyError> {
        let mut backoff = Backoff::<Micros>::new(self.min_delay, self.max_delay);
        loop {
            match self.try_pop()? {
                Some(node) => {
                    let value = unsafe { (*(*node).value.get()).take() }
                        .expect("stack node holds a value");
                    unsafe { self.guard.defer_destroy(node, Node::dealloc) };
                    return Ok(value);
                }
                None => backoff.backoff(),
            }
        }
    }

    fn try_push(&self, node: *mut Node<T>) -> bool {
        let old_top = self.top.load(Ordering::Acquire);
        unsafe { &*node }.next.store(old_top, Ordering::Relaxed);
        self.top
            .compare_exchange(old_top, node, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// `Ok(Some(node))` on a won pop, `Ok(None)` on a lost CAS,
    /// `Err(EmptyError)` when the stack was observed empty.
    fn try_pop(&self) -> Result<Option<*mut Node<T>>, EmptyError> {
        let old_top = self.top.load(Ordering::Acquire);
        if old_top.is_null() {
            return Err(EmptyError);
        }
        let new_top = unsafe { &*old_top }.next.load(Ordering::Relaxed);
        if self
            .top
            .compare_exchange(old_top, new_top, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(Some(old_top))
        } else {
            Ok(None)
        }
    }
}

impl<T> Default for LockFreeStack<T, DeferredGuard> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G> Drop for LockFreeStack<T, G> {
    fn drop(&mut self) {
        let mut curr = self.top.load(Ordering::Relaxed);
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
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lifo_order_single_thread() {
        let stack = LockFreeStack::new();
        assert_eq!(stack.pop(), Err(EmptyError));
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Ok(3));
        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Err(EmptyError));
    }

    #[test]
    fn concurrent_push_pop_conserves_values() {
        let stack = Arc::new(LockFreeStack::new());
        let num_threads = 4u64;
        let per_thread = 2_000u64;
        let popped_sum = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let stack = Arc::clone(&stack);
                let popped_sum = Arc::clone(&popped_sum);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        stack.push(t * per_thread + i);
                        let value = stack.pop().expect("just pushed");
                        popped_sum.fetch_add(value, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Every pushed value was popped exactly once, whoever got it.
        let expected: u64 = (0..num_threads * per_thread).sum();
        assert_eq!(popped_sum.load(Ordering::Relaxed), expected);
        assert_eq!(stack.pop(), Err(EmptyError));
    }
}
