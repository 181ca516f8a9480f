//! Synchronization for preemptively scheduled OS threads.
//!
//! # Organization
//!
//! Mutual exclusion, from simplest to most scalable:
//!
//! | Lock | Progress | Fairness | Space |
//! |------|----------|----------|-------|
//! | [`TasLock`] | lock-free acquire | none | O(1) |
//! | [`TtasLock`] | lock-free acquire | none | O(1) |
//! | [`BackoffLock`] | lock-free acquire | none | O(1) |
//! | [`PetersonLock`] | starvation-free | 2 threads | O(1) |
//! | [`FilterLock`] | starvation-free | n threads | O(n) |
//! | [`TicketLock`] | FIFO | yes | O(1) |
//! | [`ArrayLock`] | FIFO | yes | O(n) |
//! | [`McsLock`] | FIFO | yes | O(1)/thread |
//! | [`ClhLock`] | FIFO | yes | O(1)/thread |
//!
//! Timeout-capable acquires: [`TimeoutLock`] (CLH with abandonment) and
//! [`CompositeLock`] (backoff into a bounded queue).
//!
//! Coordination on top of a mutex: [`ConditionVariable`], [`Semaphore`],
//! [`ReentrantLock`], [`SimpleReadWriteLock`] / [`FifoReadWriteLock`],
//! [`CountdownEvent`].
//!
//! Everything blocking parks the calling OS thread (by spinning, backing
//! off, or yielding); nothing here suspends cooperatively.

mod array_lock;
mod backoff_lock;
mod clh_lock;
mod composite_lock;
mod condition_variable;
mod countdown_event;
mod filter_lock;
mod mcs_lock;
mod peterson_lock;
mod raw_mutex;
mod read_write_lock;
mod reentrant_lock;
mod semaphore;
mod tas_lock;
mod ticket_lock;
mod timeout_lock;

pub use array_lock::ArrayLock;
pub use backoff_lock::BackoffLock;
pub use clh_lock::ClhLock;
pub use composite_lock::CompositeLock;
pub use condition_variable::{ConditionVariable, CvStatus};
pub use countdown_event::CountdownEvent;
pub use filter_lock::FilterLock;
pub use mcs_lock::McsLock;
pub use peterson_lock::PetersonLock;
pub use raw_mutex::{RawMutex, ScopedLock};
pub use read_write_lock::{FifoReadWriteLock, SimpleReadWriteLock};
pub use reentrant_lock::ReentrantLock;
pub use semaphore::Semaphore;
pub use tas_lock::{TasLock, TtasLock};
pub use ticket_lock::TicketLock;
pub use timeout_lock::TimeoutLock;
