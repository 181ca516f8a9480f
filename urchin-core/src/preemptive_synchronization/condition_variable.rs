//! Condition variable over any [`RawMutex`].

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::{RawMutex, TtasLock};

/// Result of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvStatus {
    NoTimeout,
    Timeout,
}

/// A condition variable usable with every mutex in this crate.
///
/// Each waiter allocates a one-shot signal flag and appends it to a FIFO
/// list guarded by an internal spin mutex; notification pops waiters in
/// arrival order and sets their flags. The waiter enqueues itself *before*
/// releasing the caller's mutex, so a notification racing with the release
/// always finds the waiter in the list: no lost wakeups. The interface
/// permits spurious wakeups but the implementation produces none.
///
/// A timed waiter that expires removes itself from the list; if it finds
/// itself already removed, a notifier has claimed its signal, and the wait
/// is reported as [`CvStatus::NoTimeout`]. Ownership of the signal
/// allocation stays with the waiter in all paths, so a claimed signal is
/// never freed twice.
pub struct ConditionVariable {
    waiters_lock: TtasLock,
    waiters: UnsafeCell<VecDeque<*mut AtomicBool>>,
}

// The waiter list is only touched under `waiters_lock`; the signal flags
// are atomics.
unsafe impl Send for ConditionVariable {}
unsafe impl Sync for ConditionVariable {}

impl ConditionVariable {
    pub fn new() -> Self {
        ConditionVariable {
            waiters_lock: TtasLock::new(),
            waiters: UnsafeCell::new(VecDeque::new()),
        }
    }

    fn with_waiters<R>(&self, f: impl FnOnce(&mut VecDeque<*mut AtomicBool>) -> R) -> R {
        self.waiters_lock.lock();
        let result = f(unsafe { &mut *self.waiters.get() });
        self.waiters_lock.unlock();
        result
    }

    /// Block until notified. `mutex` must be held; it is released while
    /// waiting and reacquired before returning.
    pub fn wait<L: RawMutex>(&self, mutex: &L) {
        let signal = Box::into_raw(Box::new(AtomicBool::new(false)));
        self.with_waiters(|w| w.push_back(signal));

        mutex.unlock();
        while !unsafe { &*signal }.load(Ordering::Acquire) {
            thread::yield_now();
        }
        drop(unsafe { Box::from_raw(signal) });
        mutex.lock();
    }

    /// Block until notified or `deadline` passes.
    pub fn wait_until<L: RawMutex>(&self, mutex: &L, deadline: Instant) -> CvStatus {
        let signal = Box::into_raw(Box::new(AtomicBool::new(false)));
        self.with_waiters(|w| w.push_back(signal));

        mutex.unlock();
        let mut signaled = false;
        while Instant::now() < deadline {
            if unsafe { &*signal }.load(Ordering::Acquire) {
                signaled = true;
                break;
            }
            thread::yield_now();
        }

        if !signaled {
            let removed = self.with_waiters(|w| {
                if let Some(index) = w.iter().position(|&p| p == signal) {
                    w.remove(index);
                    true
                } else {
                    false
                }
            });
            if !removed {
                // A notifier popped our signal between the deadline check
                // and the dequeue attempt; the store is in flight. Wait it
                // out so the flag is not freed under the notifier.
                while !unsafe { &*signal }.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                signaled = true;
            }
        }

        drop(unsafe { Box::from_raw(signal) });
        mutex.lock();
        if signaled {
            CvStatus::NoTimeout
        } else {
            CvStatus::Timeout
        }
    }

    /// Block until notified or `timeout` elapses.
    pub fn wait_for<L: RawMutex>(&self, mutex: &L, timeout: Duration) -> CvStatus {
        self.wait_until(mutex, Instant::now() + timeout)
    }

    /// Wait while `cond` returns true.
    pub fn wait_while<L, C>(&self, mutex: &L, mut cond: C)
    where
        L: RawMutex,
        C: FnMut() -> bool,
    {
        while cond() {
            self.wait(mutex);
        }
    }

    /// Wait while `cond` returns true, up to `deadline`. Returns whether
    /// the condition was down when the wait finished.
    pub fn wait_until_while<L, C>(&self, mutex: &L, deadline: Instant, mut cond: C) -> bool
    where
        L: RawMutex,
        C: FnMut() -> bool,
    {
        while cond() {
            if self.wait_until(mutex, deadline) == CvStatus::Timeout {
                return !cond();
            }
        }
        true
    }

    /// Wait while `cond` returns true, up to `timeout`.
    pub fn wait_for_while<L, C>(&self, mutex: &L, timeout: Duration, cond: C) -> bool
    where
        L: RawMutex,
        C: FnMut() -> bool,
    {
        self.wait_until_while(mutex, Instant::now() + timeout, cond)
    }

    /// Wake the longest-waiting thread, if any.
    pub fn notify_one(&self) {
        let popped = self.with_waiters(|w| w.pop_front());
        if let Some(signal) = popped {
            unsafe { &*signal }.store(true, Ordering::Release);
        }
    }

    /// Wake every waiting thread.
    pub fn notify_all(&self) {
        let popped: Vec<_> = self.with_waiters(|w| w.drain(..).collect());
        for signal in popped {
            unsafe { &*signal }.store(true, Ordering::Release);
        }
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConditionVariable {
    fn drop(&mut self) {
        // Destroying a CV with live waiters is a caller bug; still, free
        // any signals that were never claimed.
        for signal in self.waiters.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(signal) });
        }
    }
}
