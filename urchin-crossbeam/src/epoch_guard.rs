//! Epoch-based guard implementation.

use crossbeam_epoch::{self as epoch, Guard as PinnedEpoch};
use urchin_core::guard::Guard;

/// Epoch-based memory reclamation.
///
/// Zero-sized: all state lives in crossbeam's global collector. A pinned
/// read section ([`Guard::pin`]) keeps the current epoch from advancing
/// past this thread, and [`Guard::defer_destroy`] schedules the
/// deallocation to run once every thread has left the epoch in which the
/// node was unlinked. Container operations therefore never free a node
/// another operation may still be traversing.
///
/// Trade-off against the core's `DeferredGuard`: memory is reclaimed
/// continuously, but a thread that stays pinned (a stalled iteration, a
/// long operation) delays reclamation globally.
#[derive(Clone, Copy, Default)]
pub struct EpochGuard;

impl Guard for EpochGuard {
    /// Keeps the calling thread pinned to the current epoch until drop.
    type ReadGuard = PinnedEpoch;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        let pinned = epoch::pin();
        // Safety: the caller guarantees the node is unreachable; the
        // closure runs after all currently pinned threads unpin.
        unsafe {
            pinned.defer_unchecked(move || dealloc(node));
        }
    }
}
