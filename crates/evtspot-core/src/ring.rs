#![forbid(unsafe_code)]

//! Fixed-capacity ring buffer of `f64` that overwrites the oldest value.
//!
//! # Invariants
//!
//! 1. Capacity is fixed at construction and is never zero.
//! 2. `0 <= cursor < capacity`.
//! 3. `len() == cursor` until the first wrap, then `len() == capacity`.
//! 4. `last_erased()` is `None` until the buffer has wrapped once.

use crate::alloc::{BufferAllocator, SystemAllocator};
use crate::error::SpotResult;

/// Overwrite-oldest container of observations.
#[derive(Debug)]
pub struct RingBuffer {
    data: Vec<f64>,
    capacity: usize,
    cursor: usize,
    filled: bool,
    last_erased: Option<f64>,
}

impl RingBuffer {
    /// Allocate a ring buffer from the global allocator.
    ///
    /// # Errors
    ///
    /// Fails with `AllocationFailed` when `capacity` is zero or storage is
    /// unavailable.
    pub fn new(capacity: usize) -> SpotResult<Self> {
        Self::with_allocator(capacity, &SystemAllocator)
    }

    /// Allocate a ring buffer through `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn with_allocator(capacity: usize, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        let data = allocator.allocate(capacity)?;
        Ok(Self {
            data,
            capacity,
            cursor: 0,
            filled: false,
            last_erased: None,
        })
    }

    /// Write `x` at the cursor and return the value it replaced, if any.
    pub fn push(&mut self, x: f64) -> Option<f64> {
        if self.filled {
            let erased = std::mem::replace(&mut self.data[self.cursor], x);
            self.last_erased = Some(erased);
        } else {
            self.data.push(x);
        }

        self.cursor += 1;
        if self.cursor == self.capacity {
            self.cursor = 0;
            self.filled = true;
        }

        if self.filled { self.last_erased } else { None }
    }

    /// Copy of this buffer whose storage comes from `allocator`.
    ///
    /// `Clone` goes to the global allocator; use this when the copy must be
    /// charged to a budget.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn clone_in(&self, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        let mut data = allocator.allocate(self.capacity)?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            data,
            capacity: self.capacity,
            cursor: self.cursor,
            filled: self.filled,
            last_erased: self.last_erased,
        })
    }

    /// Forget every value, keeping the allocation.
    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
        self.filled = false;
        self.last_erased = None;
    }

    /// Number of values currently stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        if self.filled { self.capacity } else { self.cursor }
    }

    /// True until the first push.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the buffer has wrapped at least once.
    #[inline]
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    /// Index of the next write.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Value overwritten by the most recent push once wrapped.
    #[inline]
    #[must_use]
    pub fn last_erased(&self) -> Option<f64> {
        self.last_erased
    }

    /// Stored values in storage order (not insertion order).
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Stored values from oldest to newest.
    pub fn iter_chronological(&self) -> impl Iterator<Item = f64> + '_ {
        let split = if self.filled { self.cursor } else { 0 };
        let (newer, older) = self.data.split_at(split);
        older.iter().chain(newer.iter()).copied()
    }
}

impl Clone for RingBuffer {
    // Keep the full capacity so the clone never reallocates on push.
    fn clone(&self) -> Self {
        let mut data = Vec::with_capacity(self.capacity);
        data.extend_from_slice(&self.data);
        Self {
            data,
            capacity: self.capacity,
            cursor: self.cursor,
            filled: self.filled,
            last_erased: self.last_erased,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::BudgetAllocator;
    use crate::error::SpotError;

    #[test]
    fn wraps_after_capacity_and_returns_oldest() {
        let capacity = 5;
        let mut ring = RingBuffer::new(capacity).unwrap();
        for i in 0..capacity {
            assert_eq!(ring.push(i as f64), None, "push {i} must not erase");
            assert_eq!(ring.len(), i + 1);
        }
        assert!(ring.is_filled());
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.push(99.0), Some(0.0));
        assert_eq!(ring.len(), capacity);
        assert_eq!(ring.last_erased(), Some(0.0));
        assert_eq!(ring.push(100.0), Some(1.0));
    }

    #[test]
    fn size_saturates_at_capacity() {
        let mut ring = RingBuffer::new(3).unwrap();
        for i in 0..50 {
            ring.push(f64::from(i));
            assert!(ring.len() <= 3);
        }
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn capacity_one_erases_every_time() {
        let mut ring = RingBuffer::new(1).unwrap();
        assert_eq!(ring.push(1.0), None);
        assert_eq!(ring.push(2.0), Some(1.0));
        assert_eq!(ring.push(3.0), Some(2.0));
        assert_eq!(ring.as_slice(), &[3.0]);
    }

    #[test]
    fn chronological_iteration() {
        let mut ring = RingBuffer::new(3).unwrap();
        for x in [1.0, 2.0] {
            ring.push(x);
        }
        assert_eq!(ring.iter_chronological().collect::<Vec<_>>(), vec![1.0, 2.0]);
        for x in [3.0, 4.0] {
            ring.push(x);
        }
        assert_eq!(
            ring.iter_chronological().collect::<Vec<_>>(),
            vec![2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn clear_resets_wrap_state() {
        let mut ring = RingBuffer::new(2).unwrap();
        for x in [1.0, 2.0, 3.0] {
            ring.push(x);
        }
        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.is_filled());
        assert_eq!(ring.last_erased(), None);
        assert_eq!(ring.push(4.0), None);
        assert_eq!(ring.capacity(), 2);
    }

    #[test]
    fn clone_keeps_capacity() {
        let mut ring = RingBuffer::new(8).unwrap();
        ring.push(1.0);
        let copy = ring.clone();
        assert!(copy.data.capacity() >= 8);
        assert_eq!(copy.as_slice(), &[1.0]);
        assert_eq!(copy.cursor(), 1);
    }

    #[test]
    fn clone_in_charges_the_allocator() {
        let mut ring = RingBuffer::new(4).unwrap();
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            ring.push(x);
        }
        let budget = BudgetAllocator::new(8 * 4);
        let copy = ring.clone_in(&budget).unwrap();
        assert_eq!(budget.remaining_bytes(), 0);
        assert_eq!(copy.as_slice(), ring.as_slice());
        assert_eq!(copy.cursor(), ring.cursor());
        assert_eq!(copy.last_erased(), Some(1.0));
        assert_eq!(
            ring.clone_in(&budget).unwrap_err(),
            SpotError::AllocationFailed { requested: 4 }
        );
    }

    #[test]
    fn zero_capacity_fails() {
        assert_eq!(
            RingBuffer::new(0).unwrap_err(),
            SpotError::AllocationFailed { requested: 0 }
        );
    }

    #[test]
    fn allocator_budget_applies() {
        let budget = BudgetAllocator::new(8 * 4);
        assert!(RingBuffer::with_allocator(4, &budget).is_ok());
        assert!(RingBuffer::with_allocator(1, &budget).is_err());
    }
}
