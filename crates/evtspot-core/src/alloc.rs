#![forbid(unsafe_code)]

//! Backing-storage allocation seam.
//!
//! Every buffer in the workspace is sized once at construction and never
//! grows. The allocator is passed explicitly to constructors, so hosts with
//! tight memory (WebAssembly linear memory, embedded telemetry agents) can
//! cap what detectors may take without any process-wide state.
//!
//! Storage goes back to the global allocator when the owning value drops.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SpotError, SpotResult};

/// Source of fixed-size `f64` storage.
pub trait BufferAllocator {
    /// Return an empty vector able to hold exactly `capacity` values
    /// without reallocating.
    ///
    /// # Errors
    ///
    /// Returns [`SpotError::AllocationFailed`] when storage is unavailable or
    /// `capacity` is zero.
    fn allocate(&self, capacity: usize) -> SpotResult<Vec<f64>>;

    /// Name used in log output.
    fn name(&self) -> &'static str;
}

/// Fallible allocation from the global allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn allocate(&self, capacity: usize) -> SpotResult<Vec<f64>> {
        if capacity == 0 {
            return Err(SpotError::AllocationFailed { requested: 0 });
        }
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| SpotError::AllocationFailed {
                requested: capacity,
            })?;
        Ok(storage)
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Allocator with a hard byte budget shared by every buffer it hands out.
///
/// The budget is consumed, never refunded: detectors allocate once at
/// construction, so the remaining budget bounds how many more instances
/// a host can create.
#[derive(Debug)]
pub struct BudgetAllocator {
    limit_bytes: usize,
    used_bytes: AtomicUsize,
}

impl BudgetAllocator {
    /// Create an allocator that will hand out at most `limit_bytes`.
    #[must_use]
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes,
            used_bytes: AtomicUsize::new(0),
        }
    }

    /// Bytes handed out so far.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Acquire)
    }

    /// Bytes still available.
    #[must_use]
    pub fn remaining_bytes(&self) -> usize {
        self.limit_bytes.saturating_sub(self.used_bytes())
    }

    /// Configured limit.
    #[must_use]
    pub fn limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    fn reserve(&self, bytes: usize) -> bool {
        let limit = self.limit_bytes;
        self.used_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= limit)
            })
            .is_ok()
    }

    fn refund(&self, bytes: usize) {
        self.used_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }
}

impl BufferAllocator for BudgetAllocator {
    fn allocate(&self, capacity: usize) -> SpotResult<Vec<f64>> {
        let failed = SpotError::AllocationFailed {
            requested: capacity,
        };
        let bytes = capacity
            .checked_mul(std::mem::size_of::<f64>())
            .ok_or(failed)?;
        if capacity == 0 || !self.reserve(bytes) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                capacity,
                remaining = self.remaining_bytes(),
                "allocation budget exhausted"
            );
            return Err(failed);
        }
        match SystemAllocator.allocate(capacity) {
            Ok(storage) => Ok(storage),
            Err(err) => {
                // The platform refused; give the reservation back.
                self.refund(bytes);
                Err(err)
            }
        }
    }

    fn name(&self) -> &'static str {
        "budget"
    }
}
