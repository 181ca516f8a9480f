//! Thread-identity-owned recursive mutex.

use std::cell::Cell;
use std::thread::{self, ThreadId};

use crate::error::PreconditionError;

use super::{ConditionVariable, RawMutex, TtasLock};

/// A mutex the owning thread may re-acquire.
///
/// State is `{owner, hold_count}` behind an internal spin mutex; each
/// nested `lock` by the owner bumps the count, and the mutex is released
/// when the count returns to zero. `unlock` by a non-owner, or with
/// nothing held, is a contract violation and returns
/// [`PreconditionError`].
pub struct ReentrantLock {
    mutex: TtasLock,
    cv: ConditionVariable,
    owner: Cell<Option<ThreadId>>,
    hold_count: Cell<u64>,
}

// owner/hold_count are only touched under `mutex`.
unsafe impl Send for ReentrantLock {}
unsafe impl Sync for ReentrantLock {}

impl ReentrantLock {
    pub fn new() -> Self {
        ReentrantLock {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            owner: Cell::new(None),
            hold_count: Cell::new(0),
        }
    }

    pub fn lock(&self) {
        let me = thread::current().id();
        self.mutex.lock();
        if self.owner.get() == Some(me) {
            self.hold_count.set(self.hold_count.get() + 1);
            self.mutex.unlock();
            return;
        }
        self.cv.wait_while(&self.mutex, || self.hold_count.get() != 0);
        self.owner.set(Some(me));
        self.hold_count.set(1);
        self.mutex.unlock();
    }

    pub fn unlock(&self) -> Result<(), PreconditionError> {
        let me = thread::current().id();
        self.mutex.lock();
        if self.hold_count.get() == 0 || self.owner.get() != Some(me) {
            self.mutex.unlock();
            return Err(PreconditionError);
        }
        self.hold_count.set(self.hold_count.get() - 1);
        let fully_released = self.hold_count.get() == 0;
        if fully_released {
            self.owner.set(None);
        }
        self.mutex.unlock();
        if fully_released {
            self.cv.notify_all();
        }
        Ok(())
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}
