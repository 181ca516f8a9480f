//! The hazard-pointer domain and per-thread contexts.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use thiserror::Error;

/// Every reservation slot of the calling thread was already occupied.
///
/// The slot count is fixed at registration, so running out is a
/// programming error (an algorithm reserving more pointers than it
/// declared), not a runtime condition to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no free hazard reservation slot")]
pub struct ReservationError;

/// A retired allocation waiting for no reservation to cover it.
struct Retired {
    ptr: *mut u8,
    drop_fn: unsafe fn(*mut u8),
}

/// One thread's registration: its reservation slots and its private list
/// of retired nodes.
struct ThreadContext {
    reservations: Box<[AtomicPtr<u8>]>,
    // Only the owning thread touches the pending list.
    pending: UnsafeCell<Vec<Retired>>,
    next: *mut ThreadContext,
}

/// Registry of all thread contexts.
///
/// Contexts are published with a lock-free CAS onto an intrusive list and
/// are never unlinked; a thread that goes away leaves empty reservation
/// slots behind, which only costs scanners a few loads. The domain frees
/// the contexts, and every still-pending retired node, when it drops —
/// the borrow on [`register`](HazardDomain::register) guarantees no
/// handles outlive it.
pub struct HazardDomain {
    head: AtomicPtr<ThreadContext>,
}

unsafe impl Send for HazardDomain {}
unsafe impl Sync for HazardDomain {}

impl HazardDomain {
    pub fn new() -> Self {
        HazardDomain {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Register the calling thread with `slots` reservation slots.
    ///
    /// Called once per thread per domain, before the thread's first
    /// operation.
    pub fn register(&self, slots: usize) -> HazardThread<'_> {
        assert!(slots >= 1, "a hazard thread needs at least one slot");
        let context = Box::into_raw(Box::new(ThreadContext {
            reservations: (0..slots).map(|_| AtomicPtr::new(ptr::null_mut())).collect(),
            pending: UnsafeCell::new(Vec::new()),
            next: ptr::null_mut(),
        }));

        // Publish onto the global list.
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe { &mut *context }.next = head;
            match self
                .head
                .compare_exchange_weak(head, context, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }

        HazardThread {
            domain: self,
            context,
        }
    }

    /// Whether any registered thread currently reserves `ptr`.
    fn is_reserved(&self, ptr: *mut u8) -> bool {
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            let context = unsafe { &*curr };
            for reservation in context.reservations.iter() {
                if reservation.load(Ordering::Acquire) == ptr {
                    return true;
                }
            }
            curr = context.next;
        }
        false
    }
}

impl Default for HazardDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HazardDomain {
    fn drop(&mut self) {
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            let mut context = unsafe { Box::from_raw(curr) };
            for retired in context.pending.get_mut().drain(..) {
                unsafe { (retired.drop_fn)(retired.ptr) };
            }
            curr = context.next;
        }
    }
}

/// A thread's handle into a [`HazardDomain`].
///
/// Not `Send`: the reservation slots and pending list belong to the
/// registering thread alone.
pub struct HazardThread<'d> {
    domain: &'d HazardDomain,
    context: *mut ThreadContext,
}

impl HazardThread<'_> {
    fn context(&self) -> &ThreadContext {
        unsafe { &*self.context }
    }

    /// Marks the start of a concurrent operation. Currently a no-op; the
    /// protocol needs only the end-of-operation scan.
    pub fn op_begin(&self) {}

    /// Publish `ptr` in a free reservation slot.
    ///
    /// The caller must re-check that `ptr` is still reachable *after*
    /// this returns; only then is the dereference safe (a remover may
    /// have retired the node before the reservation became visible).
    pub fn try_reserve<T>(&self, ptr: *mut T) -> Result<(), ReservationError> {
        for reservation in self.context().reservations.iter() {
            if reservation.load(Ordering::Relaxed).is_null() {
                reservation.store(ptr.cast(), Ordering::Release);
                return Ok(());
            }
        }
        Err(ReservationError)
    }

    /// Clear every slot holding `ptr`.
    pub fn unreserve<T>(&self, ptr: *mut T) {
        for reservation in self.context().reservations.iter() {
            if reservation.load(Ordering::Relaxed) == ptr.cast() {
                reservation.store(ptr::null_mut(), Ordering::Release);
            }
        }
    }

    /// Hand an unlinked node to the domain for eventual deallocation.
    ///
    /// # Safety
    ///
    /// `ptr` must be unreachable from the shared structure (no new
    /// reservation can be taken on it) and must not be retired twice.
    pub unsafe fn schedule_for_reclaim<T>(&self, ptr: *mut T, drop_fn: unsafe fn(*mut T)) {
        let pending = unsafe { &mut *self.context().pending.get() };
        pending.push(Retired {
            ptr: ptr.cast(),
            drop_fn: unsafe {
                std::mem::transmute::<unsafe fn(*mut T), unsafe fn(*mut u8)>(drop_fn)
            },
        });
    }

    /// Marks the end of a concurrent operation: clears this thread's
    /// reservations, then frees every pending node no thread reserves.
    ///
    /// The scan walks all threads' slots per candidate, so the cost is
    /// O(slots x threads), amortized over the batch retired since the
    /// last call.
    pub fn op_end(&self) {
        for reservation in self.context().reservations.iter() {
            reservation.store(ptr::null_mut(), Ordering::Release);
        }

        let pending = unsafe { &mut *self.context().pending.get() };
        pending.retain(|retired| {
            if self.domain.is_reserved(retired.ptr) {
                true
            } else {
                unsafe { (retired.drop_fn)(retired.ptr) };
                false
            }
        });
    }

    /// Number of nodes still awaiting reclamation (tests/debugging).
    pub fn pending_reclaims(&self) -> usize {
        unsafe { &*self.context().pending.get() }.len()
    }
}
