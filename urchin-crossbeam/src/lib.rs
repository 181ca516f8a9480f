//! crossbeam-epoch reclamation for the urchin-core containers.
//!
//! The core's optimistic, lazy, and lock-free containers defer node
//! destruction through a [`Guard`](urchin_core::guard::Guard); the default
//! strategy holds every removed node until the container drops. This crate
//! supplies [`EpochGuard`], which reclaims continuously instead: removed
//! nodes are freed as soon as every thread has moved past the epoch in
//! which they were unlinked.
//!
//! ```ignore
//! use urchin_core::data_structures::{LockFreeList, OrderedSet};
//! use urchin_crossbeam::EpochGuard;
//!
//! let list: LockFreeList<u64, EpochGuard> = LockFreeList::with_hasher(Default::default());
//! list.add(7);
//! list.remove(&7); // the node is reclaimed after the epoch advances
//! ```

mod epoch_guard;

pub use epoch_guard::EpochGuard;
