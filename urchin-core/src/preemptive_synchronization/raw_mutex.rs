//! The mutual-exclusion capability.

/// A mutual exclusion primitive: `lock` blocks until the calling thread
/// owns the critical section, `unlock` releases it.
///
/// Generic consumers (condition variable, semaphore, read/write locks,
/// containers) take a `RawMutex` type parameter, so the choice of lock is
/// resolved at compile time; there is no trait-object dispatch anywhere in
/// the crate.
///
/// Every implementation guarantees that an `unlock` happens-before any
/// subsequent `lock` of the same mutex by any thread. Implementations
/// differ only in progress, fairness, and space (see the module docs).
pub trait RawMutex: Send + Sync {
    /// Block until the calling thread holds the mutex.
    fn lock(&self);

    /// Release the mutex. Callers must currently hold it.
    fn unlock(&self);
}

/// RAII critical section over any [`RawMutex`].
///
/// Locks on construction, unlocks on drop.
pub struct ScopedLock<'a, L: RawMutex> {
    lock: &'a L,
}

impl<'a, L: RawMutex> ScopedLock<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        ScopedLock { lock }
    }
}

impl<L: RawMutex> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
