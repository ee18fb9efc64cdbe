use std::fmt;

use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer};

/// A FIFO circular buffer that doubles its capacity instead of rejecting a
/// push when it is full.
///
/// Backed by a `ringbuf` heap ring. Growth allocates a ring twice as large
/// and moves the items over head-first, so ordering is preserved across
/// resizes. Not synchronized: callers wrap it in their own lock.
pub struct RingQueue<T> {
    ring: HeapRb<T>,
}

impl<T> RingQueue<T> {
    /// Creates a ring with room for `capacity` items before the first growth.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
        }
    }

    /// Appends an item at the tail, growing the ring if needed.
    pub fn push(&mut self, item: T) {
        let mut item = item;
        loop {
            match self.ring.try_push(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    self.grow();
                }
            }
        }
    }

    /// Removes the item at the head.
    pub fn pop(&mut self) -> Option<T> {
        self.ring.try_pop()
    }

    /// Removes every item, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.ring.try_pop() {
            items.push(item);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Current allocated capacity.
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    fn grow(&mut self) {
        let mut grown = HeapRb::new(self.capacity() * 2);
        while let Some(item) = self.ring.try_pop() {
            let pushed = grown.try_push(item);
            debug_assert!(pushed.is_ok(), "grown ring must hold every item of the old one");
        }
        self.ring = grown;
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
