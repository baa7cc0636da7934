//! Fixed-capacity overwrite buffer.

/// A ring buffer that keeps the most recent `capacity` items.
///
/// Once full, each push overwrites the oldest retained item. Iteration
/// always yields oldest to newest. Used for instruction trace history and
/// for cassette audio sample framing.
///
/// The buffer performs no synchronization of its own; when shared across
/// threads the owner coordinates access externally.
#[derive(Debug, Clone)]
pub struct RingHistory<T> {
    items: Vec<T>,
    capacity: usize,
    /// Index the next push lands on; once full this is also the oldest item.
    next: usize,
}

impl<T> RingHistory<T> {
    /// Create a history retaining at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingHistory capacity must be non-zero");
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently retained: `min(items_pushed, capacity)`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item, evicting the oldest once at capacity.
    pub fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.next] = item;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Drop all retained items without releasing the allocation.
    pub fn clear(&mut self) {
        self.items.clear();
        self.next = 0;
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Until the first wrap the vector is already in insertion order.
        let split = if self.items.len() < self.capacity {
            0
        } else {
            self.next
        };
        self.items[split..].iter().chain(self.items[..split].iter())
    }

    /// The most recently pushed item, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let len = self.items.len();
        Some(&self.items[(self.next + len - 1) % len])
    }
}

impl<T: Clone> RingHistory<T> {
    /// Snapshot the retained items, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_fill_keeps_insertion_order() {
        let mut ring = RingHistory::new(8);
        for v in 0..5 {
            ring.push(v);
        }
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.to_vec(), vec![0, 1, 2, 3, 4]);
        assert_eq!(ring.latest(), Some(&4));
    }

    #[test]
    fn overwrite_keeps_last_capacity_items() {
        let mut ring = RingHistory::new(4);
        for v in 0..10 {
            ring.push(v);
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.to_vec(), vec![6, 7, 8, 9]);
        assert_eq!(ring.latest(), Some(&9));
    }

    #[test]
    fn exact_capacity_boundary() {
        let mut ring = RingHistory::new(3);
        for v in [10, 20, 30] {
            ring.push(v);
        }
        assert_eq!(ring.to_vec(), vec![10, 20, 30]);
        ring.push(40);
        assert_eq!(ring.to_vec(), vec![20, 30, 40]);
    }

    #[test]
    fn clear_resets_occupancy_and_order() {
        let mut ring = RingHistory::new(3);
        for v in 0..7 {
            ring.push(v);
        }
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.latest(), None);
        ring.push(99);
        ring.push(100);
        assert_eq!(ring.to_vec(), vec![99, 100]);
    }

    #[test]
    fn capacity_one_always_holds_newest() {
        let mut ring = RingHistory::new(1);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.to_vec(), vec![3]);
    }
}
