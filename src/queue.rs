// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::hash::Hash;

/// Values which can be stored in an [IndexedPriorityQueue].
pub trait Prioritized<K> {
    /// Identity of the value. At most one value with a given key is kept in a queue.
    fn key(&self) -> K;

    /// Returns true if `self` should leave the queue before `other`.
    fn precedes(&self, other: &Self) -> bool;
}

/// Binary min-heap which additionally tracks the position of every value by its key,
/// allowing O(1) lookups and O(log n) priority updates of queued values.
#[derive(Debug, Clone)]
pub struct IndexedPriorityQueue<V, K> {
    heap: Vec<V>,
    index: HashMap<K, usize>,
}

impl<V, K> Default for IndexedPriorityQueue<V, K> {
    fn default() -> Self {
        Self {
            heap: Vec::default(),
            index: HashMap::default(),
        }
    }
}

impl<V: Prioritized<K>, K: Eq + Hash> IndexedPriorityQueue<V, K> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Checks whether a value with the provided key is queued.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the queued value with the provided key.
    #[inline]
    pub fn at(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.heap[i])
    }

    /// Returns the value which would be returned by [IndexedPriorityQueue::pop].
    #[inline]
    pub fn top(&self) -> Option<&V> {
        self.heap.first()
    }

    /// Iterates over queued values in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.heap.iter()
    }

    /// Adds a value to the queue. If a value with the same key is already
    /// queued, it is replaced as if by [IndexedPriorityQueue::update].
    pub fn push(&mut self, value: V) {
        let key = value.key();
        if let Some(i) = self.index.get(&key).copied() {
            self.replace_at(i, value);
            return;
        }

        let i = self.heap.len();
        self.heap.push(value);
        self.index.insert(key, i);
        self.sift_up(i);
    }

    /// Replaces the queued value with the same key and restores its position in the heap,
    /// regardless of whether its priority went up or down.
    ///
    /// Returns false (dropping `value`) if no value with the same key is queued.
    pub fn update(&mut self, value: V) -> bool {
        let Some(&i) = self.index.get(&value.key()) else {
            return false;
        };
        self.replace_at(i, value);
        true
    }

    /// Removes and returns the value which precedes all other queued values.
    pub fn pop(&mut self) -> Option<V> {
        if self.heap.is_empty() {
            return None;
        }

        let last = self.heap.len() - 1;
        self.swap(0, last);
        let value = self.heap.pop()?;
        self.index.remove(&value.key());

        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Some(value)
    }

    fn replace_at(&mut self, i: usize, value: V) {
        self.heap[i] = value;
        let i = self.sift_up(i);
        self.sift_down(i);
    }

    /// Moves the value at `i` towards the root, returns its final position.
    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.heap[i].precedes(&self.heap[parent]) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
        i
    }

    /// Moves the value at `i` towards the leaves.
    fn sift_down(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut best = i;

            if left < n && self.heap[left].precedes(&self.heap[best]) {
                best = left;
            }
            if right < n && self.heap[right].precedes(&self.heap[best]) {
                best = right;
            }
            if best == i {
                break;
            }

            self.swap(i, best);
            i = best;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].key(), a);
        self.index.insert(self.heap[b].key(), b);
    }
}
