//! Fixed-size chained hash table: a power-of-two array of independent
//! ordered lists.
//!
//! Keys are machine words and arrive pre-distributed, so bucket selection is
//! a plain mask — no hashing. Capacity is fixed at construction; sizing for
//! the expected key count is the caller's job.

use crate::list::OrderedList;

/// A lock-free hash table over `n` independent [`OrderedList`] buckets.
pub struct HashTable<V> {
    buckets: Box<[OrderedList<V>]>,
    mask: usize,
}

impl<V> HashTable<V>
where
    V: Clone + 'static,
{
    /// Creates a table with `n` buckets.
    ///
    /// # Panics
    ///
    /// Panics unless `n` is a power of two.
    pub fn with_capacity(n: usize) -> Self {
        assert!(n.is_power_of_two(), "bucket count must be a power of two");

        let buckets: Vec<OrderedList<V>> = (0..n).map(|_| OrderedList::new()).collect();
        Self {
            buckets: buckets.into_boxed_slice(),
            mask: n - 1,
        }
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// The bucket index `key` routes to: `key & (n - 1)`.
    pub fn bucket_of(&self, key: usize) -> usize {
        key & self.mask
    }

    #[inline]
    fn bucket(&self, key: usize) -> &OrderedList<V> {
        &self.buckets[key & self.mask]
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: usize) -> Option<V> {
        self.bucket(key).get(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: usize) -> bool {
        self.bucket(key).contains(key)
    }

    /// Inserts `value` under `key` if absent; `false` leaves the resident
    /// value untouched.
    pub fn insert(&self, key: usize, value: V) -> bool {
        self.bucket(key).insert(key, value)
    }

    /// Inserts `value` under `key` if absent; returns the resident value.
    pub fn get_or_insert(&self, key: usize, value: V) -> V {
        self.bucket(key).get_or_insert(key, value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: usize) -> Option<V> {
        self.bucket(key).remove(key)
    }

    /// Live entries observed across all buckets, one traversal each.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(OrderedList::len).sum()
    }

    /// Whether every bucket observes empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(OrderedList::is_empty)
    }
}
