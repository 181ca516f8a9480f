//! Bounded exponential backoff.
//!
//! Contended CAS loops and spin loops use [`Backoff`] to take themselves off
//! the bus for a randomized, exponentially growing delay. The delay unit is
//! a type parameter because the practical behavior differs materially
//! between nanosecond and microsecond granularity; callers pick the unit
//! that matches their critical-section length.
//!
//! A `Backoff` is a per-attempt value, not a shared component: every
//! acquisition attempt starts from `min_delay` again.

use std::marker::PhantomData;
use std::thread;
use std::time::Duration;

use rand::Rng;

/// Conversion from a raw tick count to a sleepable duration.
pub trait DelayUnit {
    fn to_duration(ticks: u64) -> Duration;
}

/// Nanosecond backoff ticks.
pub struct Nanos;

/// Microsecond backoff ticks.
pub struct Micros;

/// Millisecond backoff ticks.
pub struct Millis;

impl DelayUnit for Nanos {
    #[inline]
    fn to_duration(ticks: u64) -> Duration {
        Duration::from_nanos(ticks)
    }
}

impl DelayUnit for Micros {
    #[inline]
    fn to_duration(ticks: u64) -> Duration {
        Duration::from_micros(ticks)
    }
}

impl DelayUnit for Millis {
    #[inline]
    fn to_duration(ticks: u64) -> Duration {
        Duration::from_millis(ticks)
    }
}

/// Randomized bounded exponential backoff in ticks of `U`.
///
/// Each call to [`backoff`](Backoff::backoff) sleeps for a uniformly random
/// number of ticks in `[0, current_limit]`, then doubles the limit up to
/// `max_delay`. Randomness comes from the calling thread's own generator,
/// so concurrent threads do not synchronize on the sampler.
pub struct Backoff<U = Micros> {
    max_delay: u64,
    current_limit: u64,
    _unit: PhantomData<fn() -> U>,
}

impl<U: DelayUnit> Backoff<U> {
    pub fn new(min_delay: u64, max_delay: u64) -> Self {
        Backoff {
            max_delay,
            current_limit: min_delay,
            _unit: PhantomData,
        }
    }

    /// Sleep for a random delay and widen the window.
    pub fn backoff(&mut self) {
        let delay = rand::thread_rng().gen_range(0..=self.current_limit);
        self.current_limit = (self.current_limit.saturating_mul(2)).min(self.max_delay);
        thread::sleep(U::to_duration(delay));
    }
}
