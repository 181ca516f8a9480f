//! Counting semaphore.

use std::cell::Cell;
use std::time::{Duration, Instant};

use super::{ConditionVariable, RawMutex, TtasLock};

/// Counting semaphore with timed and multi-unit acquire.
///
/// The count never goes negative: `acquire` blocks while it is zero.
/// Releases of `k <= 0` permits are ignored, and `try_acquire_many` with
/// `k <= 0` trivially succeeds, mirroring the blocking API's "nothing to
/// do" cases.
pub struct Semaphore {
    mutex: TtasLock,
    cv: ConditionVariable,
    count: Cell<i64>,
}

// count is only touched under `mutex`.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub fn new(initial_count: i64) -> Self {
        assert!(initial_count >= 0, "semaphore count cannot start negative");
        Semaphore {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            count: Cell::new(initial_count),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || self.count.get() == 0);
        self.count.set(self.count.get() - 1);
        self.mutex.unlock();
    }

    /// Return one permit.
    pub fn release(&self) {
        self.release_many(1);
    }

    /// Return `permits` permits; non-positive counts are ignored.
    pub fn release_many(&self, permits: i64) {
        if permits <= 0 {
            return;
        }
        self.mutex.lock();
        self.count.set(self.count.get() + permits);
        self.mutex.unlock();
        self.cv.notify_all();
    }

    /// Take one permit without blocking; returns whether it succeeded.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_many(1)
    }

    /// Take `permits` permits without blocking, all or nothing.
    pub fn try_acquire_many(&self, permits: i64) -> bool {
        if permits <= 0 {
            return true;
        }
        self.mutex.lock();
        let acquired = self.count.get() >= permits;
        if acquired {
            self.count.set(self.count.get() - permits);
        }
        self.mutex.unlock();
        acquired
    }

    /// Take one permit, waiting at most `timeout`.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.mutex.lock();
        while self.count.get() == 0 {
            if Instant::now() >= deadline {
                self.mutex.unlock();
                return false;
            }
            let _ = self.cv.wait_until(&self.mutex, deadline);
        }
        self.count.set(self.count.get() - 1);
        self.mutex.unlock();
        true
    }

    /// Snapshot of the current count, for tests and debugging only.
    pub fn value(&self) -> i64 {
        self.mutex.lock();
        let value = self.count.get();
        self.mutex.unlock();
        value
    }
}
