//! Concurrent data structures and synchronization primitives for
//! shared-memory multiprocessors.
//!
//! # Organization
//!
//! - [`atomic_ptr`] - stamped and markable atomic pointers (the ABA and
//!   logical-deletion workhorses)
//! - [`backoff`] - per-thread randomized exponential backoff
//! - [`preemptive_synchronization`] - spin locks, queue locks, timeout
//!   locks, and the coordination primitives built on them
//! - [`guard`] - deferred memory reclamation strategies
//! - [`data_structures`] - ordered sets, FIFO queues, and stacks
//! - [`error`] - the failure kinds surfaced by the non-blocking APIs
//! - [`common_tests`] - generic test drivers shared across
//!   implementations and satellite crates
//!
//! Everything targets parallel OS threads on cache-coherent hardware.
//! Blocking operations park the calling thread; the `try_*` variants
//! return within bounded time modulo contention. Primitives do not log
//! and hold no global state, with one documented exception: the
//! queue-based locks keep their per-thread queue nodes in thread-local
//! storage.

pub mod atomic_ptr;
pub mod backoff;
pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;
pub mod preemptive_synchronization;

pub use error::{EmptyError, PreconditionError, TimeoutError};
pub use guard::{DeferredGuard, Guard};
