//! Ticket lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use super::RawMutex;

/// FIFO lock from two counters: take a ticket, wait to be served.
///
/// The `fetch_add` on `next_ticket` is the ordering event; threads enter
/// the critical section in exactly that order. All waiters spin on the one
/// `now_serving` word, so it trades the queue locks' contention isolation
/// for O(1) space.
pub struct TicketLock {
    next_ticket: AtomicU64,
    now_serving: AtomicU64,
}

impl TicketLock {
    pub const fn new() -> Self {
        TicketLock {
            next_ticket: AtomicU64::new(0),
            now_serving: AtomicU64::new(0),
        }
    }
}

impl Default for TicketLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawMutex for TicketLock {
    fn lock(&self) {
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            thread::yield_now();
        }
    }

    fn unlock(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_tests::mutex_core_tests;

    #[test]
    fn ticket_counter_stress() {
        mutex_core_tests::counter_stress(TicketLock::new(), 4, 10_000);
    }

    #[test]
    fn ticket_exclusion_invariant() {
        mutex_core_tests::mutual_exclusion_invariant(TicketLock::new(), 4, 2_000);
    }
}
