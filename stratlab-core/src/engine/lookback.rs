//! Fixed-capacity lookback window.
//!
//! A circular index over a preallocated buffer: pushing into a full buffer
//! overwrites the oldest slot instead of shifting elements.

/// Ring buffer holding the most recent `capacity` items, oldest first on iteration.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest element once the buffer is full.
    head: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// Capacity is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Element `index` counted from the oldest.
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.slots.len() {
            return None;
        }
        Some(self.slots[(self.head + index) % self.slots.len()])
    }

    /// Most recently pushed element.
    pub fn latest(&self) -> Option<T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Oldest-to-newest iteration.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}
