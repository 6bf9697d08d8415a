//! Priority-ordered queue shared by the suspended and ready lists.
//!
//! The queue is a binary min-heap over a policy-specific key. The key is captured when an item is
//! inserted, so items must not change their ordering-relevant state while queued (the schedulers
//! only mutate descriptors after removing them). Equal keys leave the queue in insertion order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;

/// Extracts the ordering key of a queued item. Smaller keys are served first.
pub trait QueueOrder<T> {
    type Key: Ord + Copy;

    fn key(item: &T) -> Self::Key;
}

struct Entry<K, T> {
    key: K,
    seq: u64,
    item: T,
}

impl<K: Ord, T> Ord for Entry<K, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (smallest key, then oldest insertion, first)
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<K: Ord, T> PartialOrd for Entry<K, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, T> PartialEq for Entry<K, T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl<K: Ord, T> Eq for Entry<K, T> {}

/// Min-key ordered queue parameterised by an ordering policy `O`.
pub struct OrderedQueue<T, O: QueueOrder<T>> {
    heap: BinaryHeap<Entry<O::Key, T>>,
    next_seq: u64,
    _order: PhantomData<O>,
}

impl<T, O: QueueOrder<T>> OrderedQueue<T, O> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
            _order: PhantomData,
        }
    }

    /// Insert an item in O(log n), keyed by `O::key` at the time of insertion.
    pub fn insert(&mut self, item: T) {
        let key = O::key(&item);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Entry { key, seq, item });
    }

    /// Minimum-key item, or `None` when empty.
    pub fn first(&self) -> Option<&T> {
        self.heap.peek().map(|entry| &entry.item)
    }

    /// Minimum-key item without removing it.
    ///
    /// # Panics
    /// Panics if the queue is empty. Callers check [`OrderedQueue::is_empty`] first.
    pub fn peek_first(&self) -> &T {
        self.first()
            .expect("peek_first called on an empty ordered queue")
    }

    /// Remove and return the minimum-key item.
    ///
    /// # Panics
    /// Panics if the queue is empty. Callers check [`OrderedQueue::is_empty`] first.
    pub fn remove_first(&mut self) -> T {
        self.try_remove_first()
            .expect("remove_first called on an empty ordered queue")
    }

    pub fn try_remove_first(&mut self) -> Option<T> {
        self.heap.pop().map(|entry| entry.item)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Iterate over queued items in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|entry| &entry.item)
    }
}

impl<T, O: QueueOrder<T>> Default for OrderedQueue<T, O> {
    fn default() -> Self {
        Self::new()
    }
}
