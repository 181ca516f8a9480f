//! FIFO queues.
//!
//! All variants share one data model: singly linked nodes with a dummy
//! head, so the queue is empty exactly when `head.next` is null and the
//! enqueue and dequeue ends never touch the same node in a non-empty
//! queue.
//!
//! - [`UnboundedQueue`]: two locks, one per end.
//! - [`BoundedQueue`]: the two-lock queue plus a capacity, blocking on
//!   condition variables at both ends.
//! - [`LockFreeQueue`]: Michael-Scott, with helping on the lagging tail.
//! - [`LockFreeQueueRecycle`]: Michael-Scott over stamped pointers with a
//!   free-list of recycled nodes.
//! - [`SynchronousQueue`]: capacity zero; enqueuers and dequeuers meet.

mod bounded_queue;
mod lock_free_queue;
mod lock_free_queue_recycle;
mod synchronous_queue;
mod unbounded_queue;

pub use bounded_queue::BoundedQueue;
pub use lock_free_queue::LockFreeQueue;
pub use lock_free_queue_recycle::LockFreeQueueRecycle;
pub use synchronous_queue::SynchronousQueue;
pub use unbounded_queue::UnboundedQueue;
