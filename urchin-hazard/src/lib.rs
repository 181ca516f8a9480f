//! Hazard-pointer reclamation for lock-free structures.
//!
//! Epoch-style guards protect whole read sections; hazard pointers
//! protect individual addresses. A reader publishes the pointer it is
//! about to dereference into one of its reservation slots, re-checks that
//! the pointer is still reachable, and only then uses it. A remover never
//! frees a node while any thread's reservation holds its address, so the
//! reader's dereference is safe even though the node may already be
//! unlinked.
//!
//! - [`HazardDomain`] owns the registry of per-thread contexts and runs
//!   the scan that decides which retired nodes are free to go.
//! - [`HazardThread`] is one thread's handle: reservation slots plus a
//!   private pending-reclaim list.
//! - [`HazardStack`] is a Treiber stack written against the protocol, the
//!   production reclamation counterpart to the core's deferred-guard
//!   stack.
//!
//! Memory cost is bounded: at most `slots * threads` nodes can be held
//! back at any instant, which is the property that distinguishes hazard
//! pointers from epoch schemes under pathological pinning.

mod domain;
mod stack;

pub use domain::{HazardDomain, HazardThread, ReservationError};
pub use stack::{HazardStack, HazardStackHandle};
