//! Fixed-capacity binary min-heap shared by the mergers.
//!
//! Both mergers know up front how many contributors they will ever hold (the
//! number of sub-queries, or the number of segments being merged), so the
//! slot array is allocated once and never grows. Slots `[0, len)` are live and
//! always satisfy the heap property under the configured [`HeapOrder`].
//!
//! Unlike [`std::collections::BinaryHeap`], the root can be mutated in place
//! and then re-sifted with [`CursorHeap::adjust_root`], which is the hot path
//! of a k-way merge: advance the smallest cursor, push it back down.

use std::fmt;

/// Strict "sorts before" predicate used to order heap slots.
pub trait HeapOrder<T> {
    /// Returns `true` if `a` must sit closer to the root than `b`.
    fn less_than(&self, a: &T, b: &T) -> bool;
}

impl<T, F> HeapOrder<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    fn less_than(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}

/// Array-backed binary min-heap with a fixed slot count.
pub struct CursorHeap<T, O> {
    slots: Vec<T>,
    capacity: usize,
    order: O,
}

impl<T, O: HeapOrder<T>> CursorHeap<T, O> {
    /// Create an empty heap that can hold up to `capacity` items.
    pub fn with_capacity(capacity: usize, order: O) -> Self {
        CursorHeap {
            slots: Vec::with_capacity(capacity),
            capacity,
            order,
        }
    }

    /// Build a heap from `items` in O(n). Capacity is fixed to `items.len()`.
    pub fn from_vec(items: Vec<T>, order: O) -> Self {
        let capacity = items.len();
        let mut heap = CursorHeap {
            slots: items,
            capacity,
            order,
        };
        heap.heapify();
        heap
    }

    /// Restore the heap property over every live slot by sifting each
    /// non-leaf slot down once, last parent first.
    pub fn heapify(&mut self) {
        let len = self.slots.len();
        for root in (0..len / 2).rev() {
            self.sift_down(root);
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no live slots remain.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The smallest item, if any.
    pub fn peek(&self) -> Option<&T> {
        self.slots.first()
    }

    /// Mutable access to the smallest item.
    ///
    /// If the item's sort key changes, call [`adjust_root`](Self::adjust_root)
    /// before any other heap operation.
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.slots.first_mut()
    }

    /// Item in slot `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    /// Live slots in heap (not sorted) order.
    pub fn as_slice(&self) -> &[T] {
        &self.slots
    }

    /// Re-establish heap order after the root's key changed.
    pub fn adjust_root(&mut self) {
        self.sift_down(0);
    }

    /// Sift the item at `root` down until neither child sorts before it.
    ///
    /// The subtrees below `root` must already be heaps.
    pub fn sift_down(&mut self, root: usize) {
        let len = self.slots.len();
        let mut i = root;
        loop {
            let left = 2 * i + 1;
            if left >= len {
                return;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.order.less_than(&self.slots[right], &self.slots[left]) {
                smallest = right;
            }
            if self.order.less_than(&self.slots[smallest], &self.slots[i]) {
                self.slots.swap(i, smallest);
                i = smallest;
            } else {
                return;
            }
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.order.less_than(&self.slots[i], &self.slots[parent]) {
                self.slots.swap(i, parent);
                i = parent;
            } else {
                return;
            }
        }
    }

    /// Remove the root by moving the last live slot into its place and
    /// sifting it down.
    pub fn remove_root(&mut self) -> Option<T> {
        if self.slots.is_empty() {
            return None;
        }
        let root = self.slots.swap_remove(0);
        self.sift_down(0);
        Some(root)
    }

    /// Insert an item.
    ///
    /// Panics if the heap is already at capacity.
    pub fn push(&mut self, item: T) {
        assert!(
            self.slots.len() < self.capacity,
            "heap is full ({} slots)",
            self.capacity
        );
        self.slots.push(item);
        let last = self.slots.len() - 1;
        self.sift_up(last);
    }

    /// Remove every live item, in slot order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.slots.drain(..)
    }

    /// Consume the heap, returning the live items in slot order.
    pub fn into_vec(self) -> Vec<T> {
        self.slots
    }

    /// Check the heap property for every live slot.
    pub fn is_heap(&self) -> bool {
        (1..self.slots.len()).all(|i| {
            let parent = (i - 1) / 2;
            !self.order.less_than(&self.slots[i], &self.slots[parent])
        })
    }
}

impl<T: fmt::Debug, O> fmt::Debug for CursorHeap<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorHeap")
            .field("capacity", &self.capacity)
            .field("slots", &self.slots)
            .finish()
    }
}
