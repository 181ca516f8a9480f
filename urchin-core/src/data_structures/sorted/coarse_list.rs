//! Coarse-grained locked list.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ptr;

use crate::preemptive_synchronization::{ScopedLock, TtasLock};

use super::{item_key, OrderedSet, HEAD_KEY, TAIL_KEY};

struct Node<T> {
    key: u64,
    item: Option<T>,
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn sentinel(key: u64) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            key,
            item: None,
            next: ptr::null_mut(),
        }))
    }
}

/// Sorted list behind a single mutex.
///
/// Every operation takes the one lock, walks to its position, and returns.
/// Trivially linearizable and the baseline the finer-grained lists are
/// measured against.
pub struct CoarseList<T, S = RandomState> {
    mutex: TtasLock,
    head: *mut Node<T>,
    build_hasher: S,
}

// The raw node chain is only reachable with the mutex held.
unsafe impl<T: Send, S: Send> Send for CoarseList<T, S> {}
unsafe impl<T: Send + Sync, S: Sync> Sync for CoarseList<T, S> {}

impl<T> CoarseList<T, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<T, S: BuildHasher> CoarseList<T, S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        let head = Node::sentinel(HEAD_KEY);
        unsafe { (*head).next = Node::sentinel(TAIL_KEY) };
        CoarseList {
            mutex: TtasLock::new(),
            head,
            build_hasher,
        }
    }

    /// Walk to the first node with `node.key >= key`; returns `(pred,
    /// curr)`. Caller must hold the mutex.
    unsafe fn locate(&self, key: u64) -> (*mut Node<T>, *mut Node<T>) {
        let mut pred = self.head;
        let mut curr = unsafe { (*pred).next };
        while unsafe { (*curr).key } < key {
            pred = curr;
            curr = unsafe { (*curr).next };
        }
        (pred, curr)
    }
}

impl<T> Default for CoarseList<T, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> OrderedSet<T> for CoarseList<T, S>
where
    T: Hash,
    S: BuildHasher,
{
    fn add(&self, item: T) -> bool {
        let key = item_key(&self.build_hasher, &item);
        let _guard = ScopedLock::new(&self.mutex);
        unsafe {
            let (pred, curr) = self.locate(key);
            if (*curr).key == key {
                return false;
            }
            let node = Box::into_raw(Box::new(Node {
                key,
                item: Some(item),
                next: curr,
            }));
            (*pred).next = node;
            true
        }
    }

    fn remove(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _guard = ScopedLock::new(&self.mutex);
        unsafe {
            let (pred, curr) = self.locate(key);
            if (*curr).key != key {
                return false;
            }
            (*pred).next = (*curr).next;
            drop(Box::from_raw(curr));
            true
        }
    }

    fn contains(&self, item: &T) -> bool {
        let key = item_key(&self.build_hasher, item);
        let _guard = ScopedLock::new(&self.mutex);
        unsafe {
            let (_, curr) = self.locate(key);
            (*curr).key == key
        }
    }

    fn len(&self) -> usize {
        let _guard = ScopedLock::new(&self.mutex);
        let mut count = 0;
        let mut curr = unsafe { (*self.head).next };
        while unsafe { (*curr).key } != TAIL_KEY {
            count += 1;
            curr = unsafe { (*curr).next };
        }
        count
    }

    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let _guard = ScopedLock::new(&self.mutex);
        let mut items = Vec::new();
        let mut curr = unsafe { (*self.head).next };
        while unsafe { (*curr).key } != TAIL_KEY {
            if let Some(item) = unsafe { (*curr).item.as_ref() } {
                items.push(item.clone());
            }
            curr = unsafe { (*curr).next };
        }
        items
    }
}

impl<T, S> Drop for CoarseList<T, S> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            let next = unsafe { (*curr).next };
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
        ordered_set_core_tests::test_basic_operations(&CoarseList::new());
    }

    #[test]
    fn concurrent_add() {
        ordered_set_core_tests::test_concurrent_add(Arc::new(CoarseList::new()), 4, 200);
    }

    #[test]
    fn concurrent_mixed_accounting() {
        ordered_set_core_tests::test_mixed_operation_accounting(Arc::new(CoarseList::new()), 4, 1_000);
    }
}
