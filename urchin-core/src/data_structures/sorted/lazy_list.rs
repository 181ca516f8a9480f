//! Lazy (logical-deletion) locked list.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::guard::{DeferredGuard, Guard};
use crate::preemptive_synchronization::{RawMutex, TtasLock};

use super::{item_key, OrderedSet, HEAD_KEY, TAIL_KEY};

struct Node<T> {
    key: u64,
    item: Option<T>,
    next: AtomicPtr<Node<T>>,
    // Set before the node is unlinked; a marked node is logically gone.
    marked: AtomicBool,
    mutex: TtasLock,
}

impl<T> Node<T> {
    fn alloc(key: u64, item: Option<T>, next: *mut Node<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            key,
            item,
            next: AtomicPtr::new(next),
            marked: AtomicBool::new(false),
            mutex: TtasLock::new(),
        }))
    }

    unsafe fn dealloc(ptr: *mut Self) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Optimistic list with a `marked` flag for O(1) validation.
///
/// Removal marks the node (its logical deletion) before unlinking it, so
/// validation does not need to re-walk the list: `pred` unmarked, `curr`
/// unmarked, and `pred.next == curr` is enough to prove the pair is still
/// adjacent and live.
///
/// `contains` never locks or retries: one key-ordered walk, then a check
/// of the mark. That makes it wait-free.
pub struct LazyList<T, G = DeferredGuard, S = RandomState> {
    head: *mut Node<T>,
    guard: G,
    build_hasher: S,
}

unsafe impl<T: Send, G: Send, S: Send> Send for LazyList<T, G, S> {}
unsafe impl<T: Send + Sync, G: Sync, S: Sync> Sync for LazyList<T, G, S> {}

impl<T> LazyList<T, DeferredGuard, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T, G: Guard, S: BuildHasher> LazyList<T, G, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        let tail = Node::alloc(TAIL_KEY, None, ptr::null_mut());
        let head = Node::alloc(HEAD_KEY, None, tail);
        LazyList {
            head,
            guard: G::default(),
            build_hasher,
        }
    }

    /// Walk unlocked, lock the pair, validate in O(1). Returns `(pred,
    /// curr, found)` with both nodes locked; the caller unlocks both.
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
                if !(*pred).marked.load(Ordering::Acquire)
                    && !(*curr).marked.load(Ordering::Acquire)
                    && (*pred).next.load(Ordering::Acquire) == curr
                {
                    return (pred, curr, (*curr).key == key);
                }
                (*pred).mutex.unlock();
                (*curr).mutex.unlock();
            }
        }
    }
}

impl<T> Default for LazyList<T, DeferredGuard, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G, S> OrderedSet<T> for LazyList<T, G, S>
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
                // Logical deletion first; the unlink is mere cleanup.
                (*curr).marked.store(true, Ordering::Release);
                let succ = (*curr).next.load(Ordering::Relaxed);
                (*pred).next.store(succ, Ordering::Release);
                self.guard.defer_destroy(curr, Node::dealloc);
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        found
    }

    /// Wait-free: no locks, no retries.
    fn contains(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _read = G::pin();
        unsafe {
            let mut curr = self.head;
            while (*curr).key < key {
                curr = (*curr).next.load(Ordering::Acquire);
            }
            (*curr).key == key && !(*curr).marked.load(Ordering::Acquire)
        }
    }

    fn len(&self) -> usize {
        let _read = G::pin();
        let mut count = 0;
        let mut curr = unsafe { (*self.head).next.load(Ordering::Acquire) };
        while unsafe { (*curr).key } != TAIL_KEY {
            if !unsafe { (*curr).marked.load(Ordering::Acquire) } {
                count += 1;
            }
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
            unsafe {
                if !(*curr).marked.load(Ordering::Acquire) {
                    if let Some(item) = (*curr).item.as_ref() {
                        items.push(item.clone());
                    }
                }
                curr = (*curr).next.load(Ordering::Acquire);
            }
        }
        items
    }
}

impl<T, G, S> Drop for LazyList<T, G, S> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unsafe { (*curr).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
