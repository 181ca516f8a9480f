//! Composite lock: bounded backoff in front of a bounded queue.

use std::cell::Cell;
use std::hint;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::atomic_ptr::AtomicStampedPtr;
use crate::backoff::{Backoff, Micros};
use crate::error::TimeoutError;

// Slot states.
const FREE: usize = 0;
const WAITING: usize = 1;
const RELEASED: usize = 2;
const ABORTED: usize = 3;

struct CompositeNode {
    state: AtomicUsize,
    pred: AtomicPtr<CompositeNode>,
}

impl CompositeNode {
    fn new() -> Self {
        CompositeNode {
            state: AtomicUsize::new(FREE),
            pred: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

thread_local! {
    // Slot claimed by this thread's most recent try_lock, for unlock().
    static MY_NODE: Cell<*mut CompositeNode> = Cell::new(ptr::null_mut());
}

/// Timeout-capable lock combining backoff with a short queue.
///
/// Acquisition claims one of `size` preallocated slots (random pick,
/// backoff on collision), splices it onto a stamped-pointer tail, and then
/// waits for the predecessor slot to be released, skipping aborted
/// predecessors through their `pred` links. Threads that make it onto the
/// queue are served FIFO; the slot array bounds both space and the number
/// of simultaneous waiters, and no acquisition allocates.
///
/// On timeout the slot is marked `Aborted` and either cleaned up by a
/// successor or recycled when it is found at the tail. One acquisition per
/// thread at a time.
pub struct CompositeLock {
    waiting: Box<[CompositeNode]>,
    tail: AtomicStampedPtr<CompositeNode>,
    min_delay: u64,
    max_delay: u64,
}

impl CompositeLock {
    /// `size` slots; backoff window `min_delay..max_delay` microseconds.
    pub fn new(size: usize, min_delay: u64, max_delay: u64) -> Self {
        assert!(size >= 1, "CompositeLock needs at least one slot");
        CompositeLock {
            waiting: (0..size).map(|_| CompositeNode::new()).collect(),
            tail: AtomicStampedPtr::default(),
            min_delay,
            max_delay,
        }
    }

    /// Try to acquire the lock, giving up after `timeout`.
    pub fn try_lock(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        self.try_lock_inner(start, timeout).is_ok()
    }

    /// Release the lock acquired by this thread's last `try_lock`.
    pub fn unlock(&self) {
        let node = MY_NODE.with(|slot| slot.replace(ptr::null_mut()));
        if !node.is_null() {
            unsafe { &*node }.state.store(RELEASED, Ordering::Release);
        }
    }

    fn try_lock_inner(&self, start: Instant, timeout: Duration) -> Result<(), TimeoutError> {
        let node = self.acquire_node(start, timeout)?;
        let pred = self.splice_node(node, start, timeout)?;
        self.wait_for_predecessor(pred, node, start, timeout)
    }

    fn timed_out(start: Instant, timeout: Duration) -> bool {
        start.elapsed() > timeout
    }

    /// Claim a slot in the waiting array.
    fn acquire_node(
        &self,
        start: Instant,
        timeout: Duration,
    ) -> Result<*mut CompositeNode, TimeoutError> {
        let index = rand::thread_rng().gen_range(0..self.waiting.len());
        let node = &self.waiting[index] as *const CompositeNode as *mut CompositeNode;
        let mut backoff = Backoff::<Micros>::new(self.min_delay, self.max_delay);

        loop {
            if unsafe { &*node }
                .state
                .compare_exchange(FREE, WAITING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(node);
            }

            // A released or aborted slot stuck at the tail has no successor
            // to recycle it; do it on its behalf.
            let (tail_ptr, stamp) = self.tail.get(Ordering::Acquire);
            let state = unsafe { &*node }.state.load(Ordering::Acquire);
            if (state == RELEASED || state == ABORTED) && tail_ptr == node {
                let new_tail = if state == ABORTED {
                    unsafe { &*node }.pred.load(Ordering::Relaxed)
                } else {
                    ptr::null_mut()
                };
                if self.tail.compare_and_swap(
                    tail_ptr,
                    new_tail,
                    stamp,
                    stamp + 1,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    unsafe { &*node }.state.store(FREE, Ordering::Release);
                }
            }

            backoff.backoff();
            if Self::timed_out(start, timeout) {
                return Err(TimeoutError);
            }
        }
    }

    /// Enqueue the claimed slot; returns the previous tail (the
    /// predecessor to wait on, possibly null).
    fn splice_node(
        &self,
        node: *mut CompositeNode,
        start: Instant,
        timeout: Duration,
    ) -> Result<*mut CompositeNode, TimeoutError> {
        loop {
            let (cur_tail, stamp) = self.tail.get(Ordering::Acquire);
            if Self::timed_out(start, timeout) {
                unsafe { &*node }.state.store(FREE, Ordering::Release);
                return Err(TimeoutError);
            }
            if self.tail.compare_and_swap(
                cur_tail,
                node,
                stamp,
                stamp + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                return Ok(cur_tail);
            }
        }
    }

    /// Wait until the predecessor chain reaches a released node.
    fn wait_for_predecessor(
        &self,
        mut pred: *mut CompositeNode,
        node: *mut CompositeNode,
        start: Instant,
        timeout: Duration,
    ) -> Result<(), TimeoutError> {
        while !pred.is_null() {
            let pred_state = unsafe { &*pred }.state.load(Ordering::Acquire);

            if pred_state == RELEASED {
                // Consume the release and recycle the predecessor's slot.
                unsafe { &*pred }.state.store(FREE, Ordering::Release);
                break;
            }

            if pred_state == ABORTED {
                // Skip the abandoned slot and recycle it.
                let next_pred = unsafe { &*pred }.pred.load(Ordering::Relaxed);
                unsafe { &*pred }.state.store(FREE, Ordering::Release);
                pred = next_pred;
                continue;
            }

            if Self::timed_out(start, timeout) {
                // Publish the predecessor first so successors always see a
                // valid skip target once they observe ABORTED.
                unsafe { &*node }.pred.store(pred, Ordering::Relaxed);
                unsafe { &*node }.state.store(ABORTED, Ordering::Release);
                return Err(TimeoutError);
            }

            hint::spin_loop();
        }

        MY_NODE.with(|slot| slot.set(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn uncontended_try_lock_succeeds() {
        let lock = CompositeLock::new(4, 1, 10);
        assert!(lock.try_lock(Duration::from_millis(10)));
        lock.unlock();
        assert!(lock.try_lock(Duration::from_millis(10)));
        lock.unlock();
    }

    #[test]
    fn contended_counter_with_generous_timeout() {
        let num_threads = 4;
        let iterations = 2_000;
        let lock = Arc::new(CompositeLock::new(num_threads, 1, 20));
        let counter = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        while !lock.try_lock(Duration::from_secs(10)) {}
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                        lock.unlock();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(
            counter.load(Ordering::Relaxed),
            (num_threads as u64) * iterations
        );
    }

    #[test]
    fn try_lock_times_out_while_held() {
        let lock = Arc::new(CompositeLock::new(2, 1, 10));
        assert!(lock.try_lock(Duration::from_millis(100)));

        let contender = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.try_lock(Duration::from_millis(20)))
        };
        assert!(!contender.join().unwrap());
        lock.unlock();
    }
}
