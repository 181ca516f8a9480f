//! Lock-free (Harris-Michael) list.
//!
//! Removal is split in two: a CAS that sets the mark bit on the victim's
//! `next` pointer (the logical deletion and the operation's linearization
//! point), and a best-effort CAS that swings the predecessor past the
//! victim. Any traversal that later finds a marked node finishes the
//! physical removal on the remover's behalf, so the list converges with no
//! helper thread and no locks.
//!
//! ```text
//!  pred ------> curr --x--> succ        curr's next is marked:
//!                                       curr is logically deleted
//!  pred ----------------> succ          any find() snips it out
//! ```
//!
//! A CAS failure during the snip means the predecessor itself changed (it
//! was marked, or the region was rewritten); the traversal restarts from
//! the head, which is what keeps the returned `(pred, curr)` pair unmarked
//! and adjacent at the moment of inspection.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ptr;
use std::sync::atomic::Ordering;

use crate::atomic_ptr::AtomicMarkablePtr;
use crate::guard::{DeferredGuard, Guard};

use super::{item_key, OrderedSet, HEAD_KEY, TAIL_KEY};

struct Node<T> {
    key: u64,
    item: Option<T>,
    // Mark bit set = this node is logically deleted.
    next: AtomicMarkablePtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(key: u64, item: Option<T>, next: *mut Node<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            key,
            item,
            next: AtomicMarkablePtr::new(next, false),
        }))
    }

    unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Harris-Michael lock-free sorted list.
///
/// `add` and `remove` are lock-free; `contains` is wait-free. Linearization
/// points: the successful insert CAS, the successful mark CAS, and the
/// unmarked-key observation respectively.
pub struct LockFreeList<T, G = DeferredGuard, S = RandomState> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    guard: G,
    build_hasher: S,
}

unsafe impl<T: Send, G: Send, S: Send> Send for LockFreeList<T, G, S> {}
unsafe impl<T: Send + Sync, G: Sync, S: Sync> Sync for LockFreeList<T, G, S> {}

impl<T> LockFreeList<T, DeferredGuard, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T, G: Guard, S: BuildHasher> LockFreeList<T, G, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        let tail = Node::alloc(TAIL_KEY, None, ptr::null_mut());
        let head = Node::alloc(HEAD_KEY, None, tail);
        LockFreeList {
            head,
            tail,
            guard: G::default(),
            build_hasher,
        }
    }

    /// Find the adjacent pair `pred.key < key <= curr.key`, physically
    /// removing every marked node encountered on the way. Both returned
    /// nodes were unmarked at the moment they were inspected.
    fn find(&self, key: u64) -> (*mut Node<T>, *mut Node<T>) {
        'retry: loop {
            let mut pred = self.head;
            let mut curr = unsafe { &*pred }.next.ptr(Ordering::Relaxed);

            loop {
                let (mut succ, mut marked) = unsafe { &*curr }.next.get(Ordering::Acquire);

                while marked {
                    // curr is logically deleted: snip it out. Expecting
                    // pred unmarked and still pointing at curr.
                    if unsafe { &*pred }.next.compare_and_swap(
                        curr,
                        succ,
                        false,
                        false,
                        Ordering::Release,
                        Ordering::Relaxed,
                    ) {
                        unsafe { self.guard.defer_destroy(curr, Node::dealloc) };
                    } else {
                        // pred was marked or rewritten underneath us.
                        continue 'retry;
                    }
                    curr = succ;
                    let (next_succ, next_marked) =
                        unsafe { &*curr }.next.get(Ordering::Acquire);
                    succ = next_succ;
                    marked = next_marked;
                }

                if unsafe { &*curr }.key >= key {
                    return (pred, curr);
                }
                pred = curr;
                curr = succ;
            }
        }
    }
}

impl<T> Default for LockFreeList<T, DeferredGuard, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G, S> OrderedSet<T> for LockFreeList<T, G, S>
where
    T: Hash,
    G: Guard,
    S: BuildHasher,
{
    fn add(&self, item: T) -> bool {
        let key = item_key(&self.build_hasher, &item);
        let _read = G::pin();
        let mut item = Some(item);
        loop {
            let (pred, curr) = self.find(key);
            if curr != self.tail && unsafe { &*curr }.key == key {
                return false;
            }
            let node = Node::alloc(key, item.take(), curr);
            if unsafe { &*pred }.next.compare_and_swap(
                curr,
                node,
                false,
                false,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                return true;
            }
            // Lost the race; take the value back and retry with a fresh
            // position.
            let mut failed = unsafe { Box::from_raw(node) };
            item = failed.item.take();
        }
    }

    fn remove(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _read = G::pin();
        loop {
            let (pred, curr) = self.find(key);
            if curr == self.tail || unsafe { &*curr }.key != key {
                return false;
            }

            let succ = unsafe { &*curr }.next.ptr(Ordering::Acquire);
            // Logical deletion: mark curr's next. This is the
            // linearization point of the removal.
            if !unsafe { &*curr }.next.compare_and_swap(
                succ,
                succ,
                false,
                true,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                continue;
            }

            // Best-effort physical removal; a later find() cleans up if
            // this loses.
            if unsafe { &*pred }.next.compare_and_swap(
                curr,
                succ,
                false,
                false,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                unsafe { self.guard.defer_destroy(curr, Node::dealloc) };
            }
            return true;
        }
    }

    /// Wait-free: one pass, no helping, no retries.
    fn contains(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _read = G::pin();
        unsafe {
            let mut curr = (*self.head).next.ptr(Ordering::Acquire);
            while (*curr).key < key {
                curr = (*curr).next.ptr(Ordering::Acquire);
            }
            curr != self.tail && (*curr).key == key && !(*curr).next.is_marked(Ordering::Acquire)
        }
    }

    fn len(&self) -> usize {
        let _read = G::pin();
        let mut count = 0;
        unsafe {
            let mut curr = (*self.head).next.ptr(Ordering::Acquire);
            while curr != self.tail {
                if !(*curr).next.is_marked(Ordering::Acquire) {
                    count += 1;
                }
                curr = (*curr).next.ptr(Ordering::Acquire);
            }
        }
        count
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let _read = G::pin();
        let mut items = Vec::new();
        unsafe {
            let mut curr = (*self.head).next.ptr(Ordering::Acquire);
            while curr != self.tail {
                if !(*curr).next.is_marked(Ordering::Acquire) {
                    if let Some(item) = (*curr).item.as_ref() {
                        items.push(item.clone());
                    }
                }
                curr = (*curr).next.ptr(Ordering::Acquire);
            }
        }
        items
    }
}

impl<T, G, S> Drop for LockFreeList<T, G, S> {
    fn drop(&mut self) {
        // Free the reachable chain (marked nodes still linked included);
        // physically removed nodes are freed by the guard dropping after.
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unsafe { (*curr).next.ptr(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_tests::ordered_set_core_tests;
    use std::sync::Arc;

    #[test]
    fn basic_operations() {
        ordered_set_core_tests::test_basic_operations(&LockFreeList::new());
    }

    #[test]
    fn concurrent_add() {
        ordered_set_core_tests::test_concurrent_add(Arc::new(LockFreeList::new()), 4, 200);
    }

    #[test]
    fn concurrent_mixed_accounting() {
        ordered_set_core_tests::test_mixed_operation_accounting(
            Arc::new(LockFreeList::new()),
            4,
            1_000,
        );
    }

    #[test]
    fn add_remove_add_same_key() {
        let list: LockFreeList<u64> = LockFreeList::new();
        assert!(list.add(3));
        assert!(!list.add(3));
        assert!(list.remove(&3));
        assert!(!list.remove(&3));
        assert!(list.add(3));
        assert!(list.contains(&3));
    }
}
