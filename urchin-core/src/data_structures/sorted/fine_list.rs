//! Fine-grained (hand-over-hand) locked list.

use std::cell::UnsafeCell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ptr;

use crate::preemptive_synchronization::{RawMutex, TtasLock};

use super::{item_key, OrderedSet, HEAD_KEY, TAIL_KEY};

struct Node<T> {
    key: u64,
    item: Option<T>,
    // Read and written only while holding this node's mutex.
    next: UnsafeCell<*mut Node<T>>,
    mutex: TtasLock,
}

impl<T> Node<T> {
    fn alloc(key: u64, item: Option<T>, next: *mut Node<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            key,
            item,
            next: UnsafeCell::new(next),
            mutex: TtasLock::new(),
        }))
    }
}

/// Sorted list with one mutex per node.
///
/// Traversal holds two adjacent locks at a time: lock `pred`, read its
/// successor, lock that, release `pred`, and repeat. Operations working in
/// disjoint regions of the list proceed in parallel; operations in the
/// same region serialize pairwise but never globally.
///
/// The internal search returns with *both* `pred` and `curr` locked, and
/// every caller is responsible for unlocking both, on the failure paths
/// included.
pub struct FineList<T, S = RandomState> {
    head: *mut Node<T>,
    build_hasher: S,
}

unsafe impl<T: Send, S: Send> Send for FineList<T, S> {}
unsafe impl<T: Send + Sync, S: Sync> Sync for FineList<T, S> {}

impl<T> FineList<T, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T, S: BuildHasher> FineList<T, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        let tail = Node::alloc(TAIL_KEY, None, ptr::null_mut());
        let head = Node::alloc(HEAD_KEY, None, tail);
        FineList { head, build_hasher }
    }

    /// Hand-over-hand walk to the first node with `node.key >= key`.
    ///
    /// Returns `(pred, curr, found)` with both nodes locked; the caller
    /// unlocks them.
    fn search(&self, key: u64) -> (*mut Node<T>, *mut Node<T>, bool) {
        unsafe {
            let mut pred = self.head;
            (*pred).mutex.lock();
            let mut curr = *(*pred).next.get();
            (*curr).mutex.lock();
            while (*curr).key < key {
                (*pred).mutex.unlock();
                pred = curr;
                curr = *(*curr).next.get();
                (*curr).mutex.lock();
            }
            let found = (*curr).key == key;
            (pred, curr, found)
        }
    }
}

impl<T> Default for FineList<T, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> OrderedSet<T> for FineList<T, S>
where
    T: Hash,
    S: BuildHasher,
{
    fn add(&self, item: T) -> bool {
        let key = item_key(&self.build_hasher, &item);
        let (pred, curr, found) = self.search(key);
        unsafe {
            if !found {
                let node = Node::alloc(key, Some(item), curr);
                *(*pred).next.get() = node;
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        !found
    }

    fn remove(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let (pred, curr, found) = self.search(key);
        unsafe {
            if found {
                *(*pred).next.get() = *(*curr).next.get();
                // curr is unreachable now, and no other thread can be
                // holding or awaiting its lock: reaching curr requires
                // pred's lock, which we hold.
                (*curr).mutex.unlock();
                drop(Box::from_raw(curr));
                (*pred).mutex.unlock();
            } else {
                (*curr).mutex.unlock();
                (*pred).mutex.unlock();
            }
        }
        found
    }

    fn contains(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let (pred, curr, found) = self.search(key);
        unsafe {
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        found
    }

    fn len(&self) -> usize {
        let mut count = 0;
        unsafe {
            let mut pred = self.head;
            (*pred).mutex.lock();
            let mut curr = *(*pred).next.get();
            (*curr).mutex.lock();
            while (*curr).key != TAIL_KEY {
                count += 1;
                (*pred).mutex.unlock();
                pred = curr;
                curr = *(*curr).next.get();
                (*curr).mutex.lock();
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        count
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut items = Vec::new();
        unsafe {
            let mut pred = self.head;
            (*pred).mutex.lock();
            let mut curr = *(*pred).next.get();
            (*curr).mutex.lock();
            while (*curr).key != TAIL_KEY {
                if let Some(item) = (*curr).item.as_ref() {
                    items.push(item.clone());
                }
                (*pred).mutex.unlock();
                pred = curr;
                curr = *(*curr).next.get();
                (*curr).mutex.lock();
            }
            (*curr).mutex.unlock();
            (*pred).mutex.unlock();
        }
        items
    }
}

impl<T, S> Drop for FineList<T, S> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unsafe { *(*curr).next.get() };
            drop(unsafe { Box::from_raw(curr) });
            curr = next;
        }
    }
}
