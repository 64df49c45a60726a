//! Fixed-capacity ring buffer with FIFO eviction.

/// Indexed ring buffer. Index 0 is the oldest element.
///
/// Once full, every push evicts exactly the oldest element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity.min(4096)),
            head: 0,
            capacity,
        }
    }

    /// Append an element, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Append every element in order; returns how many were evicted.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        items.into_iter().filter_map(|item| self.push(item)).count()
    }

    /// Element at logical index `i` (0 = oldest).
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + i) % self.slots.len())
    }

    /// Oldest element.
    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    /// Newest element.
    pub fn newest(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.slots.len()).filter_map(move |i| self.get(i))
    }

    /// The `n` newest elements, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.slots.len().saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the next push will evict.
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy out the contents, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Rebuild a buffer from ordered contents, keeping the newest `capacity`.
    pub fn from_items(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let mut buffer = Self::new(capacity);
        buffer.extend(items);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_bound() {
        let mut buffer = RingBuffer::new(1000);
        for i in 0..1001u32 {
            let evicted = buffer.push(i);
            if i < 1000 {
                assert!(evicted.is_none());
            } else {
                assert_eq!(evicted, Some(0));
            }
        }
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.oldest(), Some(&1));
        assert_eq!(buffer.newest(), Some(&1000));
    }

    #[test]
    fn test_indexing_follows_insertion_order_after_wrap() {
        let mut buffer = RingBuffer::new(3);
        assert_eq!(buffer.extend([1, 2, 3, 4, 5]), 2);
        assert_eq!(buffer.get(0), Some(&3));
        assert_eq!(buffer.get(2), Some(&5));
        assert_eq!(buffer.get(3), None);
        assert_eq!(buffer.to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn test_recent_returns_newest_oldest_first() {
        let buffer = RingBuffer::from_items(4, 0..10);
        assert_eq!(buffer.recent(2), vec![&8, &9]);
        assert_eq!(buffer.recent(100).len(), 4);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buffer = RingBuffer::new(0);
        buffer.push("a");
        assert_eq!(buffer.push("b"), Some("a"));
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_clear() {
        let mut buffer = RingBuffer::from_items(2, [1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(7);
        assert_eq!(buffer.oldest(), Some(&7));
    }
}
