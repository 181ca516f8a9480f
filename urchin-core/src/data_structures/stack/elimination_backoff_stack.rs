//! Elimination-backoff stack.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::atomic_ptr::AtomicStampedPtr;
use crate::error::{EmptyError, TimeoutError};
use crate::guard::{DeferredGuard, Guard};

use super::lock_free_stack::Node;

// Exchanger slot states, carried in the stamp half of the slot.
const EMPTY: u64 = 0;
const WAITING: u64 = 1;
const BUSY: u64 = 2;

// How long a thread lingers at an exchanger before going back to the
// central stack.
const EXCHANGE_DURATION: Duration = Duration::from_micros(50);

/// Single-slot rendezvous point.
///
/// State machine, kept in the stamp of one [`AtomicStampedPtr`]:
///
/// ```text
/// EMPTY   --offer-->   WAITING   first arrival publishes its item
/// WAITING --accept-->  BUSY      second arrival swaps in its own item
/// BUSY    --consume--> EMPTY     first arrival takes the item, resets
/// ```
///
/// The delicate case is the publisher timing out: it times out if and
/// only if it wins the `WAITING -> EMPTY` CAS withdrawing its offer. If it
/// loses that CAS, a partner already matched with it, and it must accept
/// the exchange.
pub(super) struct LockFreeExchanger<T> {
    slot: AtomicStampedPtr<T>,
}

impl<T> LockFreeExchanger<T> {
    fn new() -> Self {
        LockFreeExchanger {
            slot: AtomicStampedPtr::default(),
        }
    }

    /// Offer `my_item` (null for a pop) and wait up to `timeout` for a
    /// partner's item.
    pub(super) fn exchange(&self, my_item: *mut T, timeout: Duration) -> Result<*mut T, TimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                return Err(TimeoutError);
            }

            let (your_item, stamp) = self.slot.get(Ordering::Acquire);
            match stamp {
                EMPTY => {
                    if self.slot.compare_and_swap(
                        your_item,
                        my_item,
                        EMPTY,
                        WAITING,
                        Ordering::Release,
                        Ordering::Relaxed,
                    ) {
                        // Published; wait for a partner to set BUSY.
                        while Instant::now() < deadline {
                            let (item, stamp) = self.slot.get(Ordering::Acquire);
                            if stamp == BUSY {
                                // Only we can reset BUSY, so a plain store
                                // suffices.
                                self.slot.set(ptr::null_mut(), EMPTY, Ordering::Release);
                                return Ok(item);
                            }
                        }
                        // Withdraw the offer. Winning this CAS is the only
                        // way to time out; losing it means a partner got
                        // here first and its item is ours.
                        if self.slot.compare_and_swap(
                            my_item,
                            ptr::null_mut(),
                            WAITING,
                            EMPTY,
                            Ordering::Release,
                            Ordering::Relaxed,
                        ) {
                            return Err(TimeoutError);
                        }
                        let item = self.slot.ptr(Ordering::Acquire);
                        self.slot.set(ptr::null_mut(), EMPTY, Ordering::Release);
                        return Ok(item);
                    }
                }
                WAITING => {
                    // Someone is waiting: deliver our item and take theirs.
                    if self.slot.compare_and_swap(
                        your_item,
                        my_item,
                        WAITING,
                        BUSY,
                        Ordering::Release,
                        Ordering::Relaxed,
                    ) {
                        return Ok(your_item);
                    }
                }
                // BUSY: a pair is mid-exchange here; spin for EMPTY.
                _ => {}
            }
        }
    }
}

/// Fixed array of exchangers; a visit picks one slot at random from the
/// caller's sub-range.
pub(super) struct EliminationArray<T> {
    exchangers: Box<[LockFreeExchanger<T>]>,
    duration: Duration,
}

impl<T> EliminationArray<T> {
    fn new(capacity: usize) -> Self {
        EliminationArray {
            exchangers: (0..capacity).map(|_| LockFreeExchanger::new()).collect(),
            duration: EXCHANGE_DURATION,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.exchangers.len()
    }

    pub(super) fn visit(
        &self,
        item: *mut T,
        lower: usize,
        upper: usize,
    ) -> Result<*mut T, TimeoutError> {
        let slot = rand::thread_rng().gen_range(lower..=upper);
        self.exchangers[slot].exchange(item, self.duration)
    }
}

/// Treiber stack that converts contention into elimination.
///
/// On a failed `top` CAS the thread visits a random exchanger instead of
/// retrying immediately. A push meeting a pop there hands its node over
/// directly; both finish without touching the stack, and the pair is
/// observationally a push immediately followed by a pop of the same
/// value. Pairings of like operations and timeouts fall back to the
/// central loop.
pub struct EliminationBackoffStack<T, G = DeferredGuard> {
    top: AtomicPtr<Node<T>>,
    elimination_array: EliminationArray<Node<T>>,
    guard: G,
}

unsafe impl<T: Send, G: Send> Send for EliminationBackoffStack<T, G> {}
unsafe impl<T: Send, G: Sync> Sync for EliminationBackoffStack<T, G> {}

impl<T> EliminationBackoffStack<T, DeferredGuard> {
    pub fn new(exchanger_capacity: usize) -> Self {
        Self::with_guard(exchanger_capacity)
    }
}

impl<T, G: Guard> EliminationBackoffStack<T, G> {
    pub fn with_guard(exchanger_capacity: usize) -> Self {
        assert!(exchanger_capacity >= 1, "need at least one exchanger");
        EliminationBackoffStack {
            top: AtomicPtr::new(ptr::null_mut()),
            elimination_array: EliminationArray::new(exchanger_capacity),
            guard: G::default(),
        }
    }

    pub fn push(&self, value: T) {
        let node = Node::alloc(value);
        loop {
            if self.try_push(node) {
                return;
            }
            let (lower, upper) = self.random_range();
            if let Ok(other) = self.elimination_array.visit(node, lower, upper) {
                if other.is_null() {
                    // Met a pop; it took our node.
                    return;
                }
                // Met another push: no progress, back to the stack.
            }
        }
    }

    pub fn pop(&self) -> Result<T, EmptyError> {
        loop {
            if let Some(node) = self.try_pop()? {
                return Ok(self.consume(node));
            }
            let (lower, upper) = self.random_range();
            if let Ok(other) = self.elimination_array.visit(ptr::null_mut(), lower, upper) {
                if !other.is_null() {
                    // Met a push; its node is ours.
                    return Ok(self.consume(other));
                }
                // Met another pop: no progress, back to the stack.
            }
        }
    }

    fn random_range(&self) -> (usize, usize) {
        let max_index = self.elimination_array.len() - 1;
        let lower = rand::thread_rng().gen_range(0..=max_index);
        let upper = rand::thread_rng().gen_range(lower..=max_index);
        (lower, upper)
    }

    fn try_push(&self, node: *mut Node<T>) -> bool {
        let old_top = self.top.load(Ordering::Acquire);
        unsafe { &*node }.next.store(old_top, Ordering::Relaxed);
        self.top
            .compare_exchange(old_top, node, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

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

    /// Take the node's value and retire the node, whether it came off the
    /// stack or straight from an exchanger.
    fn consume(&self, node: *mut Node<T>) -> T {
        let value =
            unsafe { (*(*node).value.get()).take() }.expect("stack node holds a value");
        unsafe { self.guard.defer_destroy(node, Node::dealloc) };
        value
    }
}

impl<T, G> Drop for EliminationBackoffStack<T, G> {
    fn drop(&mut self) {
        let mut curr = self.top.load(Ordering::Relaxed);
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
