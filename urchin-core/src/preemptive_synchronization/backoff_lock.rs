//! TTAS with bounded exponential backoff.

use std::hint;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backoff::{Backoff, DelayUnit, Micros};

use super::RawMutex;

/// Test-and-test-and-set lock that backs off after every failed swap.
///
/// Under contention the randomized delays spread the retries out in time,
/// which removes most of the swap storms the plain TTAS lock suffers from.
/// `{min_delay, max_delay}` are in ticks of the unit parameter.
pub struct BackoffLock<U = Micros> {
    state: AtomicBool,
    min_delay: u64,
    max_delay: u64,
    _unit: PhantomData<fn() -> U>,
}

impl<U: DelayUnit> BackoffLock<U> {
    pub fn new(min_delay: u64, max_delay: u64) -> Self {
        BackoffLock {
            state: AtomicBool::new(false),
            min_delay,
            max_delay,
            _unit: PhantomData,
        }
    }
}

impl Default for BackoffLock<Micros> {
    /// 5-25 microsecond window, matching the queue locks' spin backoff.
    fn default() -> Self {
        Self::new(5, 25)
    }
}

impl<U: DelayUnit> RawMutex for BackoffLock<U> {
    fn lock(&self) {
        let mut backoff = Backoff::<U>::new(self.min_delay, self.max_delay);
        loop {
            while self.state.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
            if !self.state.swap(true, Ordering::Acquire) {
                return;
            }
            backoff.backoff();
        }
    }

    fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }
}
