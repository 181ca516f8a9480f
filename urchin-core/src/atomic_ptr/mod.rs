//! Tagged atomic pointers.
//!
//! Two single-location helpers that let lock-free algorithms update a
//! pointer together with a small tag in one atomic event:
//!
//! - [`AtomicStampedPtr`] pairs the pointer with a 64-bit monotonic stamp.
//!   Bumping the stamp on every update means a reused address can never
//!   satisfy a stale compare-and-swap (the ABA defense).
//! - [`AtomicMarkablePtr`] pairs the pointer with one mark bit packed into
//!   the pointer's least significant bit. The mark flags logical deletion
//!   of the node that owns the pointer.
//!
//! Both take explicit [`Ordering`](std::sync::atomic::Ordering) arguments
//! on every operation; the algorithms built on top are sensitive to the
//! exact fence placement and never rely on defaults.

mod markable;
mod stamped;

pub use markable::AtomicMarkablePtr;
pub use stamped::AtomicStampedPtr;
