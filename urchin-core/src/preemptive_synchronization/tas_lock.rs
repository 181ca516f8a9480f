//! Test-and-set spin locks.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};

use super::RawMutex;

/// Test-and-set lock: spin on the atomic swap itself.
///
/// Every failed attempt writes the line, so contending threads ping-pong
/// the cache line between cores. Baseline only.
pub struct TasLock {
    state: AtomicBool,
}

impl TasLock {
    pub const fn new() -> Self {
        TasLock {
            state: AtomicBool::new(false),
        }
    }
}

impl Default for TasLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex for TasLock {
    fn lock(&self) {
        while self.state.swap(true, Ordering::Acquire) {
            hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }
}

/// Test-and-test-and-set lock: spin on a plain load until the flag reads
/// clear, and only then attempt the swap. Waiters share the line in the
/// cache instead of ping-ponging it.
pub struct TtasLock {
    state: AtomicBool,
}

impl TtasLock {
    pub const fn new() -> Self {
        TtasLock {
            state: AtomicBool::new(false),
        }
    }
}

impl Default for TtasLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex for TtasLock {
    fn lock(&self) {
        loop {
            while self.state.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
            if !self.state.swap(true, Ordering::Acquire) {
                return;
            }
        }
    }

    fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_tests::mutex_core_tests;

    #[test]
    fn tas_counter_stress() {
        mutex_core_tests::counter_stress(TasLock::new(), 4, 10_000);
    }

    #[test]
    fn ttas_counter_stress() {
        mutex_core_tests::counter_stress(TtasLock::new(), 4, 10_000);
    }

    #[test]
    fn ttas_exclusion_invariant() {
        mutex_core_tests::mutual_exclusion_invariant(TtasLock::new(), 4, 2_000);
    }
}
