use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering;

use portable_atomic::AtomicU128;

/// An atomic `(pointer, stamp)` pair in one 128-bit location.
///
/// The stamp is a caller-managed 64-bit counter; the convention throughout
/// this crate is `new_stamp = expected_stamp + 1` on every successful
/// update, which makes a recycled address distinguishable from the
/// original observation. A 64-bit stamp does not wrap in any realistic
/// execution.
///
/// Requires lock-free 128-bit compare-exchange on the target
/// (`cmpxchg16b` / `casp`); `portable-atomic` falls back to a locked
/// implementation elsewhere, which preserves correctness but not the
/// lock-freedom guarantee.
pub struct AtomicStampedPtr<T> {
    state: AtomicU128,
    _marker: PhantomData<*mut T>,
}

// The cell stores a raw address, never a T; synchronization is carried by
// the atomic operations themselves.
unsafe impl<T> Send for AtomicStampedPtr<T> {}
unsafe impl<T> Sync for AtomicStampedPtr<T> {}

impl<T> AtomicStampedPtr<T> {
    pub fn new(ptr: *mut T, stamp: u64) -> Self {
        AtomicStampedPtr {
            state: AtomicU128::new(Self::pack(ptr, stamp)),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn pack(ptr: *mut T, stamp: u64) -> u128 {
        ((stamp as u128) << 64) | (ptr as usize as u64 as u128)
    }

    #[inline]
    fn unpack(raw: u128) -> (*mut T, u64) {
        ((raw as u64) as usize as *mut T, (raw >> 64) as u64)
    }

    /// Load the pair.
    #[inline]
    pub fn get(&self, order: Ordering) -> (*mut T, u64) {
        Self::unpack(self.state.load(order))
    }

    /// Load only the pointer half.
    #[inline]
    pub fn ptr(&self, order: Ordering) -> *mut T {
        self.get(order).0
    }

    /// Load only the stamp half.
    #[inline]
    pub fn stamp(&self, order: Ordering) -> u64 {
        self.get(order).1
    }

    /// Store the pair unconditionally.
    #[inline]
    pub fn set(&self, ptr: *mut T, stamp: u64, order: Ordering) {
        self.state.store(Self::pack(ptr, stamp), order);
    }

    /// Compare-and-swap on the pair.
    ///
    /// Succeeds iff both the pointer and the stamp match their expected
    /// values; on failure nothing is written. The swap is one atomic event:
    /// no observer can see the new pointer with the old stamp or vice
    /// versa.
    #[inline]
    pub fn compare_and_swap(
        &self,
        expected_ptr: *mut T,
        new_ptr: *mut T,
        expected_stamp: u64,
        new_stamp: u64,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.state
            .compare_exchange(
                Self::pack(expected_ptr, expected_stamp),
                Self::pack(new_ptr, new_stamp),
                success,
                failure,
            )
            .is_ok()
    }
}

impl<T> Default for AtomicStampedPtr<T> {
    fn default() -> Self {
        Self::new(ptr::null_mut(), 0)
    }
}
