//! Lock-free ordered singly-linked list.
//!
//! Nodes are keyed by a machine word, unique while live, and kept sorted
//! ascending. Removal is two-phase: a CAS sets the deletion mark in the
//! node's successor word (the linearization point), then a second CAS by
//! whichever thread gets there first swings the predecessor past the node.
//! Unlinked nodes go to hazel's reclaimer, never straight to the allocator.
//!
//! Every operation pins a guard and walks with two hazard slots: one for the
//! node under inspection, one for the predecessor anchor it was reached
//! through. The roles swap on each advance. After publishing a slot the
//! walk re-reads the anchor and restarts from head if it no longer points
//! at the published node.

use crate::marked::{AtomicMarkedPtr, MarkedPtr};
use core::sync::atomic::Ordering;
use hazel::{pin, Guard};

struct Node<V> {
    key: usize,
    value: V,
    next: AtomicMarkedPtr<Node<V>>,
}

/// Where a key lives (or would live) in the list.
///
/// `prev` points at the successor word the walk arrived through — either the
/// list head or a protected node's `next` field. It stays dereferenceable
/// while the hazard slots from the producing traversal are intact.
struct Position<V> {
    prev: *const AtomicMarkedPtr<Node<V>>,
    curr: MarkedPtr<Node<V>>,
    next: MarkedPtr<Node<V>>,
    found: bool,
}

/// What a traversal reports to its visitor.
enum Step<'a, V> {
    /// A live, protected node the walk is standing on.
    Node(&'a Node<V>),
    /// The walk lost its anchor and is starting over from head. Any state
    /// accumulated from earlier nodes is stale.
    Restart,
}

/// A sorted lock-free list keyed by `usize`.
///
/// Values are returned by clone; the hazard slots keep the source node alive
/// for the duration of the read.
pub struct OrderedList<V> {
    head: AtomicMarkedPtr<Node<V>>,
}

impl<V> OrderedList<V>
where
    V: Clone + 'static,
{
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            head: AtomicMarkedPtr::null(),
        }
    }

    /// Traverse the list, helping to unlink any marked node on the way.
    ///
    /// Calls `visit` for every live node; a `true` return stops the walk at
    /// that node. On return `curr` is protected in one hazard slot and the
    /// anchor node, if any, in the other. `found` is left unset.
    fn walk<F>(&self, guard: &Guard, mut visit: F) -> Position<V>
    where
        F: FnMut(Step<'_, V>) -> bool,
    {
        'retry: loop {
            let mut prev: *const AtomicMarkedPtr<Node<V>> = &self.head;
            let mut curr_slot = 0;
            // SAFETY: `prev` is the list head here.
            let mut curr = unsafe { (*prev).load(Ordering::Acquire) };

            loop {
                if curr.is_null() {
                    return Position {
                        prev,
                        curr: MarkedPtr::null(),
                        next: MarkedPtr::null(),
                        found: false,
                    };
                }

                let curr_ptr = curr.ptr();
                guard.protect(curr_slot, curr_ptr);

                // Did someone remove the node we are standing on? The anchor
                // must still hold `curr`, unmarked, now that the hazard is
                // published. SeqCst pairs with the SeqCst hazard store.
                // SAFETY: the anchor is the head or a node protected by the
                // other hazard slot.
                if unsafe { (*prev).load(Ordering::SeqCst) } != curr.unmarked() {
                    visit(Step::Restart);
                    continue 'retry;
                }

                // SAFETY: protected and validated above.
                let node = unsafe { &*curr_ptr };
                let next = node.next.load(Ordering::Acquire);

                if next.is_marked() {
                    // Logically deleted: help with the physical unlink, then
                    // hand the node to the reclaimer.
                    // SAFETY: anchor validity as above.
                    match unsafe { (*prev).compare_exchange(curr.unmarked(), next.unmarked()) } {
                        Ok(_) => {
                            // SAFETY: the node just became unreachable, and
                            // exactly one thread wins this CAS.
                            unsafe { guard.retire(curr_ptr) };
                            curr = next.unmarked();
                        }
                        Err(_) => {
                            visit(Step::Restart);
                            continue 'retry;
                        }
                    }
                } else if visit(Step::Node(node)) {
                    return Position {
                        prev,
                        curr: curr.unmarked(),
                        next,
                        found: false,
                    };
                } else {
                    // Advance: `curr` becomes the anchor and keeps its slot;
                    // the next node will be protected in the other slot.
                    prev = &node.next;
                    curr_slot = 1 - curr_slot;
                    curr = next;
                }
            }
        }
    }

    /// Traverse towards `key`.
    ///
    /// Stops at the first node whose key is >= `key` (the list is sorted, so
    /// anything further cannot match).
    fn find(&self, key: usize, guard: &Guard) -> Position<V> {
        let mut position = self.walk(guard, |step| match step {
            Step::Node(node) => node.key >= key,
            Step::Restart => false,
        });
        position.found = !position.curr.is_null()
            // SAFETY: the stopping node is hazard-protected and validated.
            && unsafe { (*position.curr.ptr()).key == key };
        position
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: usize) -> Option<V> {
        let guard = pin();
        let position = self.find(key, &guard);
        if position.found {
            // SAFETY: `curr` is hazard-protected and was validated live.
            let node = unsafe { &*position.curr.ptr() };
            Some(node.value.clone())
        } else {
            None
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: usize) -> bool {
        let guard = pin();
        self.find(key, &guard).found
    }

    /// Inserts `value` under `key` if absent.
    ///
    /// Returns `true` if the key was inserted; `false` leaves the resident
    /// value untouched. The node is allocated once and reused across CAS
    /// retries.
    pub fn insert(&self, key: usize, value: V) -> bool {
        let guard = pin();
        let new = Box::into_raw(Box::new(Node {
            key,
            value,
            next: AtomicMarkedPtr::null(),
        }));

        loop {
            let position = self.find(key, &guard);
            if position.found {
                // SAFETY: never published.
                unsafe { drop(Box::from_raw(new)) };
                return false;
            }

            // SAFETY: `new` is still private to this thread.
            unsafe { (*new).next.store(position.curr, Ordering::Relaxed) };

            // Link in front of `curr`. Fails if anything changed between the
            // anchor and `curr` — including the anchor itself getting marked,
            // which flips a bit in the same word.
            // SAFETY: the anchor is protected by the traversal's hazard slot.
            match unsafe {
                (*position.prev).compare_exchange(position.curr, MarkedPtr::new(new))
            } {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Inserts `value` under `key` if absent; returns the resident value.
    ///
    /// The returned value is the existing one when the key was already
    /// present, the inserted one otherwise.
    pub fn get_or_insert(&self, key: usize, value: V) -> V {
        let guard = pin();
        let inserted = value.clone();
        let new = Box::into_raw(Box::new(Node {
            key,
            value,
            next: AtomicMarkedPtr::null(),
        }));

        loop {
            let position = self.find(key, &guard);
            if position.found {
                // SAFETY: `curr` is hazard-protected; `new` was never published.
                let node = unsafe { &*position.curr.ptr() };
                let resident = node.value.clone();
                unsafe { drop(Box::from_raw(new)) };
                return resident;
            }

            // SAFETY: `new` is still private to this thread.
            unsafe { (*new).next.store(position.curr, Ordering::Relaxed) };

            // SAFETY: anchor protected by the traversal's hazard slot.
            match unsafe {
                (*position.prev).compare_exchange(position.curr, MarkedPtr::new(new))
            } {
                Ok(_) => return inserted,
                Err(_) => continue,
            }
        }
    }

    /// Removes `key`, returning its value.
    ///
    /// The successful mark CAS is the linearization point. The physical
    /// unlink may be completed by this thread or by any later traversal that
    /// trips over the marked node; either way the node ends up retired
    /// exactly once.
    pub fn remove(&self, key: usize) -> Option<V> {
        let guard = pin();

        loop {
            let position = self.find(key, &guard);
            if !position.found {
                return None;
            }

            let curr_ptr = position.curr.ptr();
            // SAFETY: protected and validated by find().
            let node = unsafe { &*curr_ptr };

            // Mark the successor word, preserving the real pointer. A failure
            // means `next` changed under us — an insertion after this node,
            // or someone else's mark — so retry from the traversal.
            if node
                .next
                .compare_exchange(position.next, position.next.with_mark())
                .is_err()
            {
                continue;
            }

            // Logically removed as of the CAS above; the hazard slot keeps
            // the node readable even if a helper frees it of the list.
            let value = node.value.clone();

            // SAFETY: anchor protected by the traversal's hazard slot.
            match unsafe {
                (*position.prev).compare_exchange(position.curr, position.next)
            } {
                Ok(_) => {
                    // SAFETY: unreachable now; the unlink CAS succeeds once.
                    unsafe { guard.retire(curr_ptr) };
                }
                Err(_) => {
                    // Another thread will unlink (and retire) it while
                    // traversing. One more find bounds how many marked nodes
                    // this thread leaves behind.
                    let _ = self.find(key, &guard);
                }
            }

            return Some(value);
        }
    }

    /// Snapshot of the live keys, in ascending order.
    ///
    /// Keys inserted or removed mid-walk may or may not appear.
    pub fn keys(&self) -> Vec<usize> {
        let guard = pin();
        let mut keys = Vec::new();
        self.walk(&guard, |step| match step {
            Step::Node(node) => {
                keys.push(node.key);
                false
            }
            Step::Restart => {
                keys.clear();
                false
            }
        });
        keys
    }

    /// Number of live nodes observed in one traversal.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether a traversal observes no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for OrderedList<V>
where
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for OrderedList<V> {
    fn drop(&mut self) {
        // Exclusive access: free everything still linked, marked or not.
        // Nodes already retired are unreachable from head and are owned by
        // the reclaimer.
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            // SAFETY: exclusive access via &mut self.
            let node = unsafe { Box::from_raw(curr.ptr()) };
            curr = node.next.load(Ordering::Acquire);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_find_remove() {
        let list = OrderedList::new();

        assert!(list.insert(10, "ten"));
        assert!(list.insert(30, "thirty"));
        assert!(list.insert(20, "twenty"));

        assert_eq!(list.get(20), Some("twenty"));
        assert_eq!(list.get(25), None);
        assert_eq!(list.keys(), vec![10, 20, 30]);

        assert_eq!(list.remove(20), Some("twenty"));
        assert_eq!(list.get(20), None);
        assert_eq!(list.keys(), vec![10, 30]);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let list = OrderedList::new();

        assert!(list.insert(5, 100u64));
        assert!(!list.insert(5, 200u64));
        assert_eq!(list.get(5), Some(100), "resident value must be untouched");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn get_or_insert_returns_resident() {
        let list = OrderedList::new();

        assert_eq!(list.get_or_insert(7, 70u64), 70);
        assert_eq!(list.get_or_insert(7, 99u64), 70);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_absent_key_is_a_noop() {
        let list: OrderedList<u64> = OrderedList::new();
        assert_eq!(list.remove(42), None);
        assert!(list.is_empty());

        list.insert(1, 1);
        assert_eq!(list.remove(42), None);
        assert_eq!(list.keys(), vec![1]);
    }

    #[test]
    fn snapshot_after_removals_skips_dead_nodes() {
        let list = OrderedList::new();
        for key in 0..10usize {
            list.insert(key, key);
        }
        for key in (0..10).step_by(2) {
            assert_eq!(list.remove(key), Some(key));
        }

        assert_eq!(list.keys(), vec![1, 3, 5, 7, 9]);
        assert_eq!(list.len(), 5);
        for key in (1..10).step_by(2) {
            assert_eq!(list.get(key), Some(key));
        }
    }

    #[test]
    fn keys_stay_sorted_and_unique() {
        let list = OrderedList::new();
        for key in [9usize, 3, 7, 1, 5, 3, 9] {
            list.insert(key, key);
        }

        let keys = list.keys();
        assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    }
}
