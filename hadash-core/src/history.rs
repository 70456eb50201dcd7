//! Bounded rolling-window container used by every time-ordered display.

use std::collections::VecDeque;

/// FIFO ring buffer with a fixed capacity.
///
/// `append` evicts from the head once the buffer is full, so `len()` never
/// exceeds the capacity and surviving items keep their relative order.
/// Readers only ever get point-in-time copies, never the live storage.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// Capacity must be at least 1; a zero-capacity history is a
    /// programming defect.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert at the tail, evicting from the head if the buffer is full.
    pub fn append(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Newest item, if any.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest-first iterator over the current contents.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> History<T> {
    /// Point-in-time owned copy, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
