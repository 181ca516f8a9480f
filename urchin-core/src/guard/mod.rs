//! Memory reclamation guards.
//!
//! Lock-free and optimistic containers unlink nodes while other threads may
//! still be traversing through them, so physical deallocation has to be
//! deferred until no traversal can hold a reference. The `Guard` trait is
//! the capability containers are parameterized over to decide *when* that
//! happens; the unlink algorithms themselves are identical under every
//! strategy.
//!
//! ```text
//! LockFreeList<T, G: Guard>
//!     |
//!     +-- LockFreeList<T, DeferredGuard>   free at container drop
//!     +-- LockFreeList<T, EpochGuard>      crossbeam-epoch (urchin-crossbeam)
//! ```
//!
//! Hazard-pointer reclamation (urchin-hazard) protects individual pointers
//! rather than whole read sections, so it pairs with structures written
//! against its reserve/validate protocol instead of this trait.

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A deferred-destruction strategy for container nodes.
///
/// The guard stored inside a collection receives every physically removed
/// node via [`defer_destroy`](Guard::defer_destroy); the [`ReadGuard`]
/// returned by [`pin`](Guard::pin) brackets each operation and, depending
/// on the strategy, is what holds reclamation at bay while the operation
/// runs.
///
/// # Safety contract
///
/// Implementations must not run a node's deallocator while any thread that
/// pinned before the node was deferred still holds its `ReadGuard`.
/// Callers of `defer_destroy` must pass a node that is unreachable from
/// the container (no new traversal can find it) exactly once.
///
/// [`ReadGuard`]: Guard::ReadGuard
pub trait Guard: Default + Send + Sync {
    /// Token protecting one container operation's reads.
    type ReadGuard;

    /// Begin a protected read section.
    fn pin() -> Self::ReadGuard;

    /// Schedule an unlinked node for deallocation once it is safe.
    ///
    /// # Safety
    ///
    /// - `node` must have been allocated by the collection that owns this
    ///   guard and must already be unreachable from it.
    /// - `dealloc` must be the matching deallocation function.
    /// - Must be called at most once per node.
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));
}
