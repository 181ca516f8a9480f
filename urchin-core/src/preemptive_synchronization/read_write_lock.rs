//! Reader/writer locks.
//!
//! Two variants with the same shared state `{num_readers, has_writer}`
//! behind an internal mutex and condition variable:
//!
//! - [`SimpleReadWriteLock`] admits readers whenever no writer holds the
//!   lock. A steady stream of readers can therefore starve writers.
//! - [`FifoReadWriteLock`] lets a writer announce itself by setting
//!   `has_writer` before the readers have drained; new readers block from
//!   that moment on, so writers cannot starve. This is the variant to
//!   reach for unless reader throughput is all that matters.
//!
//! Both maintain the exclusion invariant: while a write lock is held, no
//! reader and no other writer holds the lock.

use std::cell::Cell;

use super::{ConditionVariable, RawMutex, TtasLock};

/// Reader-preference read/write lock.
pub struct SimpleReadWriteLock {
    mutex: TtasLock,
    cv: ConditionVariable,
    num_readers: Cell<u64>,
    has_writer: Cell<bool>,
}

// State is only touched under `mutex`.
unsafe impl Send for SimpleReadWriteLock {}
unsafe impl Sync for SimpleReadWriteLock {}

impl SimpleReadWriteLock {
    pub fn new() -> Self {
        SimpleReadWriteLock {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            num_readers: Cell::new(0),
            has_writer: Cell::new(false),
        }
    }

    pub fn read_lock(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || self.has_writer.get());
        self.num_readers.set(self.num_readers.get() + 1);
        self.mutex.unlock();
    }

    pub fn read_unlock(&self) {
        self.mutex.lock();
        self.num_readers.set(self.num_readers.get() - 1);
        let notify = self.num_readers.get() == 0;
        self.mutex.unlock();
        // Wake writers outside the mutex to cut handoff contention.
        if notify {
            self.cv.notify_all();
        }
    }

    pub fn write_lock(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || {
            self.num_readers.get() > 0 || self.has_writer.get()
        });
        self.has_writer.set(true);
        self.mutex.unlock();
    }

    pub fn write_unlock(&self) {
        self.mutex.lock();
        self.has_writer.set(false);
        self.mutex.unlock();
        self.cv.notify_all();
    }
}

impl Default for SimpleReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer-preference read/write lock.
///
/// `write_lock` claims `has_writer` as soon as no other writer holds it,
/// then waits for the readers already inside to drain. Readers arriving
/// after the claim block, which bounds writer wait by the readers present
/// at announcement time.
pub struct FifoReadWriteLock {
    mutex: TtasLock,
    cv: ConditionVariable,
    num_readers: Cell<u64>,
    has_writer: Cell<bool>,
}

// State is only touched under `mutex`.
unsafe impl Send for FifoReadWriteLock {}
unsafe impl Sync for FifoReadWriteLock {}

impl FifoReadWriteLock {
    pub fn new() -> Self {
        FifoReadWriteLock {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            num_readers: Cell::new(0),
            has_writer: Cell::new(false),
        }
    }

    pub fn read_lock(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || self.has_writer.get());
        self.num_readers.set(self.num_readers.get() + 1);
        self.mutex.unlock();
    }

    pub fn read_unlock(&self) {
        self.mutex.lock();
        self.num_readers.set(self.num_readers.get() - 1);
        let notify = self.num_readers.get() == 0;
        self.mutex.unlock();
        if notify {
            self.cv.notify_all();
        }
    }

    pub fn write_lock(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || self.has_writer.get());
        // Announce before the readers drain: newly arriving readers now
        // block, so we only wait for the ones already inside.
        self.has_writer.set(true);
        self.cv.wait_while(&self.mutex, || self.num_readers.get() > 0);
        self.mutex.unlock();
    }

    pub fn write_unlock(&self) {
        self.mutex.lock();
        self.has_writer.set(false);
        self.mutex.unlock();
        self.cv.notify_all();
    }
}

impl Default for FifoReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}
