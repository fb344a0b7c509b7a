//! Bounded FIFO pool of decoded values whose last handle was released.

use std::collections::VecDeque;

use crate::id::PackageId;

#[derive(Debug)]
pub struct ValueCache<V> {
    entries: VecDeque<(PackageId, V)>,
    capacity: usize,
}

impl<V> ValueCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns the oldest cached value for `id`.
    pub fn take(&mut self, id: &PackageId) -> Option<V> {
        let pos = self.entries.iter().position(|(cached, _)| cached == id)?;
        self.entries.remove(pos).map(|(_, value)| value)
    }

    /// Inserts a value, returning whatever had to leave to stay within
    /// capacity. With zero capacity the value itself is returned.
    pub fn insert(&mut self, id: PackageId, value: V) -> Vec<V> {
        if self.capacity == 0 {
            return vec![value];
        }
        self.entries.push_back((id, value));
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            if let Some((_, value)) = self.entries.pop_front() {
                evicted.push(value);
            }
        }
        evicted
    }

    /// Removes every cached value of `id`.
    pub fn remove_package(&mut self, id: &PackageId) -> Vec<V> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for (cached, value) in self.entries.drain(..) {
            if cached == *id {
                removed.push(value);
            } else {
                kept.push_back((cached, value));
            }
        }
        self.entries = kept;
        removed
    }

    pub fn clear(&mut self) -> Vec<V> {
        self.entries.drain(..).map(|(_, value)| value).collect()
    }
}
