//! Countdown latch.

use std::cell::Cell;

use super::{ConditionVariable, RawMutex, TtasLock};

/// One-shot latch: `wait` blocks until `signal` has been called `count`
/// times. Used by the stress tests and benchmarks to join phases without
/// tearing down threads.
pub struct CountdownEvent {
    mutex: TtasLock,
    cv: ConditionVariable,
    count: Cell<usize>,
}

// count is only touched under `mutex`.
unsafe impl Send for CountdownEvent {}
unsafe impl Sync for CountdownEvent {}

impl CountdownEvent {
    pub fn new(count: usize) -> Self {
        CountdownEvent {
            mutex: TtasLock::new(),
            cv: ConditionVariable::new(),
            count: Cell::new(count),
        }
    }

    // Decrement the count by one; returns true when this signal released
    // the waiters.
    //
    pub fn signal(&self) -> bool {
        self.mutex.lock();
        if self.count.get() == 0 {
            self.mutex.unlock();
            return false;
        }
        self.count.set(self.count.get() - 1);
        let released = self.count.get() == 0;
        self.mutex.unlock();
        if released {
            self.cv.notify_all();
        }
        released
    }

    // Wait until the count reaches zero.
    //
    pub fn wait(&self) {
        self.mutex.lock();
        self.cv.wait_while(&self.mutex, || self.count.get() > 0);
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_returns_after_all_signals() {
        let event = Arc::new(CountdownEvent::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let event = Arc::clone(&event);
                thread::spawn(move || event.signal())
            })
            .collect();

        event.wait();
        let released: u32 = handles
            .into_iter()
            .map(|h| u32::from(h.join().unwrap()))
            .sum();
        assert_eq!(released, 1);
    }

    #[test]
    fn extra_signals_are_rejected() {
        let event = CountdownEvent::new(1);
        assert!(event.signal());
        assert!(!event.signal());
    }
}
