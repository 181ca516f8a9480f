//! Hazard-protected Treiber stack.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use urchin_core::backoff::{Backoff, Micros};
use urchin_core::error::EmptyError;

use crate::domain::{HazardDomain, HazardThread};

// Backoff window on CAS failure, in microseconds.
const MIN_DELAY: u64 = 1;
const MAX_DELAY: u64 = 20;

// One reservation is enough: pop protects only the observed top.
const SLOTS_PER_THREAD: usize = 1;

struct Node<T> {
    value: UnsafeCell<Option<T>>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: UnsafeCell::new(Some(value)),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Treiber stack whose pops reclaim through hazard pointers.
///
/// Unlike the deferred-guard stack in urchin-core, popped nodes are freed
/// while the stack is still live — as soon as no reservation covers them
/// — so sustained use does not accumulate garbage. The price is the
/// reserve/re-validate handshake on the pop path:
///
/// 1. read `top`;
/// 2. reserve it;
/// 3. read `top` again — if it changed, the node may already be retired,
///    so unreserve and start over;
/// 4. only then dereference.
///
/// Threads interact through a per-thread [`handle`](HazardStack::handle).
pub struct HazardStack<T> {
    top: AtomicPtr<Node<T>>,
    domain: HazardDomain,
}

unsafe impl<T: Send> Send for HazardStack<T> {}
unsafe impl<T: Send> Sync for HazardStack<T> {}

impl<T> HazardStack<T> {
    pub fn new() -> Self {
        HazardStack {
            top: AtomicPtr::new(ptr::null_mut()),
            domain: HazardDomain::new(),
        }
    }

    /// Register the calling thread; one handle per thread.
    pub fn handle(&self) -> HazardStackHandle<'_, T> {
        HazardStackHandle {
            stack: self,
            thread: self.domain.register(SLOTS_PER_THREAD),
        }
    }
}

impl<T> Default for HazardStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for HazardStack<T> {
    fn drop(&mut self) {
        // Nodes still stacked; retired ones are freed by the domain.
        let mut curr = *self.top.get_mut();
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}

/// A thread's view of a [`HazardStack`].
pub struct HazardStackHandle<'s, T> {
    stack: &'s HazardStack<T>,
    thread: HazardThread<'s>,
}

impl<T> HazardStackHandle<'_, T> {
    pub fn push(&self, value: T) {
        let node = Node::alloc(value);
        let mut backoff = Backoff::<Micros>::new(MIN_DELAY, MAX_DELAY);
        loop {
            let old_top = self.stack.top.load(Ordering::Acquire);
            unsafe { &*node }.next.store(old_top, Ordering::Relaxed);
            if self
                .stack
                .top
                .compare_exchange(old_top, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            backoff.backoff();
        }
    }

    pub fn pop(&self) -> Result<T, EmptyError> {
        self.thread.op_begin();
        let result = self.pop_inner();
        self.thread.op_end();
        result
    }

    fn pop_inner(&self) -> Result<T, EmptyError> {
        let mut backoff = Backoff::<Micros>::new(MIN_DELAY, MAX_DELAY);
        loop {
            let old_top = self.stack.top.load(Ordering::Acquire);
            if old_top.is_null() {
                return Err(EmptyError);
            }

            self.thread
                .try_reserve(old_top)
                .expect("pop uses a single reservation slot");
            // Re-validate: if top moved, old_top may already be retired
            // and must not be dereferenced.
            if self.stack.top.load(Ordering::Acquire) != old_top {
                self.thread.unreserve(old_top);
                continue;
            }

            let new_top = unsafe { &*old_top }.next.load(Ordering::Relaxed);
            if self
                .stack
                .top
                .compare_exchange(old_top, new_top, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                let value = unsafe { (*(*old_top).value.get()).take() }
                    .expect("stack node holds a value");
                self.thread.unreserve(old_top);
                // Safety: old_top is unlinked and this is its only
                // retirement.
                unsafe { self.thread.schedule_for_reclaim(old_top, Node::dealloc) };
                return Ok(value);
            }

            self.thread.unreserve(old_top);
            backoff.backoff();
        }
    }
}
