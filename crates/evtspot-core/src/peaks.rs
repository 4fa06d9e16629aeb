#![forbid(unsafe_code)]

//! Online statistics over a bounded window of exceedances (peaks).
//!
//! Keeps `sum`, `sum_sq`, `min` and `max` of the values currently retained
//! in a [`RingBuffer`]. Pushing is O(1) except when the evicted value was
//! the current minimum or maximum: then every statistic is recomputed from
//! the buffer, which also discards the rounding error accumulated by the
//! incremental updates.
//!
//! # Invariants
//!
//! 1. `sum` and `sum_sq` describe exactly the values in the buffer (up to
//!    rounding since the last rescan).
//! 2. `min <= max` whenever the buffer is non-empty; both are NaN when empty.
//! 3. Values are magnitudes, so they are expected to be `>= 0`.

use crate::alloc::{BufferAllocator, SystemAllocator};
use crate::error::SpotResult;
use crate::ring::RingBuffer;

/// Sufficient statistics of the retained exceedances.
#[derive(Debug, Clone)]
pub struct Peaks {
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    container: RingBuffer,
}

impl Peaks {
    /// Create an empty window able to hold `capacity` exceedances.
    ///
    /// # Errors
    ///
    /// Fails with `AllocationFailed` when storage cannot be obtained.
    pub fn new(capacity: usize) -> SpotResult<Self> {
        Self::with_allocator(capacity, &SystemAllocator)
    }

    /// Create an empty window with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn with_allocator(capacity: usize, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::NAN,
            max: f64::NAN,
            container: RingBuffer::with_allocator(capacity, allocator)?,
        })
    }

    /// Copy with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn clone_in(&self, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            sum: self.sum,
            sum_sq: self.sum_sq,
            min: self.min,
            max: self.max,
            container: self.container.clone_in(allocator)?,
        })
    }

    /// Record a new exceedance, evicting the oldest one if the window is full.
    pub fn push(&mut self, x: f64) {
        let erased = self.container.push(x);
        let size = self.container.len();

        self.sum += x;
        self.sum_sq += x * x;
        if size == 1 || x < self.min {
            self.min = x;
        }
        if size == 1 || x > self.max {
            self.max = x;
        }

        if let Some(erased) = erased {
            self.sum -= erased;
            self.sum_sq -= erased * erased;
            if erased <= self.min || erased >= self.max {
                self.rescan();
            }
        }
    }

    fn rescan(&mut self) {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = f64::NAN;
        let mut max = f64::NAN;
        for &value in self.container.as_slice() {
            sum += value;
            sum_sq += value * value;
            if min.is_nan() || value < min {
                min = value;
            }
            if max.is_nan() || value > max {
                max = value;
            }
        }
        self.sum = sum;
        self.sum_sq = sum_sq;
        self.min = min;
        self.max = max;

        #[cfg(feature = "tracing")]
        tracing::trace!(size = self.container.len(), min, max, "peaks rescanned");
    }

    /// Drop every exceedance and reset the statistics.
    pub fn clear(&mut self) {
        self.container.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.min = f64::NAN;
        self.max = f64::NAN;
    }

    /// Number of retained exceedances.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.container.len()
    }

    /// True when no exceedance has been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    /// Maximum number of retained exceedances.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.container.capacity()
    }

    /// Smallest retained exceedance (NaN when empty).
    #[inline]
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest retained exceedance (NaN when empty).
    #[inline]
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sum of retained exceedances.
    #[inline]
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Retained exceedances, in storage order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        self.container.as_slice()
    }

    /// Retained exceedances from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.container.iter_chronological()
    }

    /// Empirical mean.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.sum / self.len() as f64
    }

    /// Empirical (biased) variance.
    #[must_use]
    pub fn var(&self) -> f64 {
        let size = self.len() as f64;
        let mean = self.sum / size;
        self.sum_sq / size - mean * mean
    }

    /// GPD log-likelihood of the retained exceedances.
    ///
    /// ```text
    /// gamma = 0 : -N ln(sigma) - sum(x) / sigma
    /// otherwise : -N ln(sigma) - (1 + 1/gamma) * sum(ln(1 + gamma x / sigma))
    /// ```
    ///
    /// Returns `-inf` when some `1 + gamma x / sigma <= 0` (outside the
    /// support).
    #[must_use]
    pub fn log_likelihood(&self, gamma: f64, sigma: f64) -> f64 {
        let nt = self.len() as f64;
        if gamma == 0.0 {
            return -nt * sigma.ln() - self.sum / sigma;
        }

        let c = 1.0 + 1.0 / gamma;
        let ratio = gamma / sigma;
        let mut acc = -nt * sigma.ln();
        for &x in self.container.as_slice() {
            let z = 1.0 + ratio * x;
            if z <= 0.0 {
                return f64::NEG_INFINITY;
            }
            acc -= c * z.ln();
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(values: &[f64]) -> (f64, f64, f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| v * v).sum::<f64>() / n - mean * mean;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (mean, var, min, max)
    }

    #[test]
    fn empty_stats_are_nan() {
        let peaks = Peaks::new(4).unwrap();
        assert!(peaks.is_empty());
        assert!(peaks.min().is_nan());
        assert!(peaks.max().is_nan());
        assert!(peaks.mean().is_nan());
    }

    #[test]
    fn stats_track_window_contents() {
        let mut peaks = Peaks::new(4).unwrap();
        let stream = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0, 0.5, 3.5];
        for (i, &x) in stream.iter().enumerate() {
            peaks.push(x);
            let start = (i + 1).saturating_sub(4);
            let window = &stream[start..=i];
            let (mean, var, min, max) = naive(window);
            assert!((peaks.mean() - mean).abs() < 1e-12, "step {i}");
            assert!((peaks.var() - var).abs() < 1e-9, "step {i}");
            assert_eq!(peaks.min(), min, "step {i}");
            assert_eq!(peaks.max(), max, "step {i}");
        }
    }

    #[test]
    fn evicting_extremum_triggers_exact_rescan() {
        let mut peaks = Peaks::new(3).unwrap();
        for x in [10.0, 1.0, 2.0] {
            peaks.push(x);
        }
        assert_eq!(peaks.max(), 10.0);
        peaks.push(3.0); // evicts 10.0
        assert_eq!(peaks.max(), 3.0);
        assert_eq!(peaks.min(), 1.0);
        assert!((peaks.sum() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn iter_is_chronological_and_clear_resets() {
        let mut peaks = Peaks::new(3).unwrap();
        for x in [1.0, 2.0, 3.0, 4.0] {
            peaks.push(x);
        }
        assert_eq!(peaks.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        peaks.clear();
        assert!(peaks.is_empty());
        assert!(peaks.max().is_nan());
        assert_eq!(peaks.sum(), 0.0);
        peaks.push(7.0);
        assert_eq!(peaks.min(), 7.0);
        assert_eq!(peaks.max(), 7.0);
    }

    #[test]
    fn exponential_log_likelihood_matches_closed_form() {
        let mut peaks = Peaks::new(8).unwrap();
        let values = [0.5, 1.0, 1.5, 2.0];
        for v in values {
            peaks.push(v);
        }
        let sigma: f64 = 1.25;
        let expected = -4.0 * sigma.ln() - 5.0 / sigma;
        assert!((peaks.log_likelihood(0.0, sigma) - expected).abs() < 1e-12);
    }

    #[test]
    fn log_likelihood_outside_support_is_neg_infinity() {
        let mut peaks = Peaks::new(8).unwrap();
        for v in [0.5, 1.0, 4.0] {
            peaks.push(v);
        }
        // gamma = -1, sigma = 2: 1 - 4/2 < 0 for x = 4.
        assert_eq!(peaks.log_likelihood(-1.0, 2.0), f64::NEG_INFINITY);
    }

    #[test]
    fn log_likelihood_small_gamma_approaches_exponential() {
        let mut peaks = Peaks::new(16).unwrap();
        for i in 1..=10 {
            peaks.push(f64::from(i) * 0.3);
        }
        let exp_ll = peaks.log_likelihood(0.0, 1.5);
        let near = peaks.log_likelihood(1e-9, 1.5);
        assert!((exp_ll - near).abs() < 1e-6, "{exp_ll} vs {near}");
    }
}
