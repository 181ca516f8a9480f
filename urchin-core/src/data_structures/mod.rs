//! Concurrent containers.
//!
//! # Organization
//!
//! - [`sorted`] - ordered sets as linked lists, from coarse locking to the
//!   Harris-Michael lock-free list
//! - [`queue`] - FIFO queues: two-lock, bounded blocking, Michael-Scott
//!   lock-free, node-recycling, and a zero-capacity rendezvous
//! - [`stack`] - Treiber stack and its elimination-backoff extension
//!
//! Containers that unlink nodes during concurrent traversal are generic
//! over a [`Guard`](crate::guard::Guard) deciding when unlinked nodes are
//! deallocated; the default [`DeferredGuard`](crate::guard::DeferredGuard)
//! frees them when the container drops.

pub mod queue;
pub mod sorted;
pub mod stack;

pub use queue::{
    BoundedQueue, LockFreeQueue, LockFreeQueueRecycle, SynchronousQueue, UnboundedQueue,
};
pub use sorted::{
    CoarseList, FineList, LazyList, LockFreeList, OptimisticList, OrderedSet,
};
pub use stack::{EliminationBackoffStack, LockFreeStack};
