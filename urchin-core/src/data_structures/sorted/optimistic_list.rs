//! Optimistically validated locked list.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::guard::{DeferredGuard, Guard};
use crate::preemptive_synchronization::{RawMutex, TtasLock};

use super::{item_key, OrderedSet, HEAD_KEY, TAIL_KEY};

struct Node<T> {
    key: u64,
    item: Option<T>,
    next: AtomicPtr<Node<T>>,
    mutex: TtasLock,
}

impl<T> Node<T> {
    fn alloc(key: u64, item: Option<T>, next: *mut Node<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            key,
            item,
            next: AtomicPtr::new(next),
            mutex: TtasLock::new(),
        }))
    }

    unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Sorted list with unlocked traversal and post-lock validation.
///
/// An operation walks to its `(pred, curr)` pair without any locks, locks
/// both nodes, and then validates by walking from the head again: `pred`
/// must still be reachable and still point at `curr`. A failed validation
/// unlocks and retries the whole operation.
///
/// Removal unlinks under both locks, so the validating walker can never be
/// positioned on a node at its moment of removal; a traversal that is
/// already *past* the unlink point may still be reading the node, which is
/// why removed nodes go to the guard instead of being freed in place.
pub struct OptimisticList<T, G = DeferredGuard, S = RandomState> {
    head: *mut Node<T>,
    guard: G,
    build_hasher: S,
}

unsafe impl<T: Send, G: Send, S: Send> Send for OptimisticList<T, G, S> {}
unsafe impl<T: Send + Sync, G: Sync, S: Sync> Sync for OptimisticList<T, G, S> {}

impl<T> OptimisticList<T, DeferredGuard, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T, G: Guard, S: BuildHasher> OptimisticList<T, G, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        let tail = Node::alloc(TAIL_KEY, None, ptr::null_mut());
        let head = Node::alloc(HEAD_KEY, None, tail);
        OptimisticList {
            head,
            guard: G::default(),
            build_hasher,
        }
    }

    /// Walk unlocked, lock the pair, validate. Returns `(pred, curr,
    /// found)` with both nodes locked; the caller unlocks both.
    fn search(&self, key: u64) -> (*mut Node<T>, *mut Node<T>, bool) {
        unsafe {
            loop {
                let mut pred = self.head;
                let mut curr = (*pred).next.load(Ordering::Acquire);
                while (*curr).key < key {
                    pred = curr;
                    curr = (*curr).next.load(Ordering::Acquire);
                }

                (*pred).mutex.lock();
                (*curr).mutex.lock();
                if self.validate(pred, curr) {
                    return (pred, curr, (*curr).key == key);
                }
                (*pred).mutex.unlock();
                (*curr).mutex.unlock();
            }
        }
    }

    /// Re-walk from the head: `pred` must still be reachable and must
    /// still point at `curr`.
    unsafe fn validate(&self, pred: *mut Node<T>, curr: *mut Node<T>) -> bool {
        let mut node = self.head;
        unsafe {
            while (*node).key <= (*pred).key {
                if node == pred {
                    return (*pred).next.load(Ordering::Acquire) == curr;
                }
                node = (*node).next.load(Ordering::Acquire);
            }
        }
        false
    }
}

impl<T> Default for OptimisticList<T, DeferredGuard, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G, S> OrderedSet<T> for OptimisticList<T, G, S>
where
    T: Hash,
    G: Guard,
    S: BuildHasher,
{
    fn add(&self, item: T) -> bool {
        let key = item_key(&self.build_hasher, &item);
        let _read = G::pin();
        let (pred, curr, found) = self.search(key);
        unsafe {
            if !found {
                let node = Node::alloc(key, Some(item), curr);
                // The store is the linearization point; AtomicPtr release
                // publishes the initialized node.
                (*pred).next.store(node, Ordering::Release);
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        !found
    }

    fn remove(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _read = G::pin();
        let (pred, curr, found) = self.search(key);
        unsafe {
            if found {
                let succ = (*curr).next.load(Ordering::Relaxed);
                (*pred).next.store(succ, Ordering::Release);
                // A concurrent unlocked traversal may still be walking
                // through curr; reclamation is deferred to the guard.
                self.guard.defer_destroy(curr, Node::dealloc);
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        found
    }

    fn contains(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _read = G::pin();
        let (pred, curr, found) = self.search(key);
        unsafe {
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        found
    }

    fn len(&self) -> usize {
        let _read = G::pin();
        let mut count = 0;
        let mut curr = unsafe { (*self.head).next.load(Ordering::Acquire) };
        while unsafe { (*curr).key } != TAIL_KEY {
            count += 1;
            curr = unsafe { (*curr).next.load(Ordering::Acquire) };
        }
        count
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let _read = G::pin();
        let mut items = Vec::new();
        let mut curr = unsafe { (*self.head).next.load(Ordering::Acquire) };
        while unsafe { (*curr).key } != TAIL_KEY {
            if let Some(item) = unsafe { (*curr).item.as_ref() } {
                items.push(item.clone());
            }
            curr = unsafe { (*curr).next.load(Ordering::Acquire) };
        }
        items
    }
}

impl<T, G, S> Drop for OptimisticList<T, G, S> {
    fn drop(&mut self) {
        // Free the reachable chain; the guard frees the unlinked nodes
        // when it drops right after.
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
