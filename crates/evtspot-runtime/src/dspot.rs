#![forbid(unsafe_code)]

//! DSPOT: SPOT on a drift-corrected stream.
//!
//! A moving average over the last `depth` accepted observations estimates
//! the local level (`drift`). The inner [`Spot`] only ever sees residuals
//! `x - drift`; every threshold it reports is shifted back by `drift`.
//!
//! ```text
//! while filling : mean += (x - mean) / len
//! once full     : mean += (x - evicted) / depth
//! ```
//!
//! # Invariants
//!
//! 1. Anomalies never enter the window, so an outlier cannot drag the
//!    baseline toward itself. Excesses do enter it.
//! 2. Until the window is full, `step` only feeds the window and returns
//!    `Normal`.
//! 3. `depth == 0` disables drift tracking entirely (`drift` stays 0).
//!
//! [`TwoSidedDSpot`] shares one window between an upper and a lower
//! detector; an alarm on either side keeps the observation out of it.

use evtspot_core::{BufferAllocator, RingBuffer, SpotError, SpotResult, SystemAllocator};
use tracing::{debug, warn};

use crate::bounds::Bounds;
use crate::config::DSpotConfig;
use crate::event::{Event, SCHEMA_DSPOT, Side};
use crate::spot::Spot;
use crate::status::SpotStatus;
use crate::two_sided::{Outcome, TwoSidedSpot};

// =============================================================================
// Sliding mean
// =============================================================================

/// Mean of the last `depth` values in O(1) per push.
#[derive(Debug, Clone)]
pub struct StreamMean {
    window: RingBuffer,
    mean: f64,
}

impl StreamMean {
    /// Create an empty window.
    ///
    /// # Errors
    ///
    /// `AllocationFailed` for a zero depth or unavailable storage.
    pub fn new(depth: usize) -> SpotResult<Self> {
        Self::with_allocator(depth, &SystemAllocator)
    }

    /// Create an empty window with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn with_allocator(depth: usize, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            window: RingBuffer::with_allocator(depth, allocator)?,
            mean: 0.0,
        })
    }

    /// Add `x` and return the updated mean.
    pub fn push(&mut self, x: f64) -> f64 {
        match self.window.push(x) {
            None => {
                let len = self.window.len() as f64;
                self.mean += (x - self.mean) / len;
            }
            Some(evicted) => {
                self.mean += (x - evicted) / self.window.capacity() as f64;
                if self.window.cursor() == 0 {
                    // Once per lap: drop accumulated rounding.
                    self.mean = self.window.as_slice().iter().sum::<f64>()
                        / self.window.capacity() as f64;
                }
            }
        }
        self.mean
    }

    /// Current mean (0 when empty).
    #[inline]
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Whether `depth` values have been seen.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.window.is_filled()
    }

    /// Values currently averaged.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True before the first push.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Window length.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.window.capacity()
    }

    /// Empty the window.
    pub fn clear(&mut self) {
        self.window.clear();
        self.mean = 0.0;
    }
}

/// Feed `data` through `window`, collecting `x - drift` for every value
/// seen once the window is full. `drift` ends at the final mean.
fn warm_residuals(window: &mut StreamMean, data: &[f64], drift: &mut f64) -> Vec<f64> {
    let mut residuals = Vec::with_capacity(data.len().saturating_sub(window.depth()));
    for &x in data.iter().filter(|x| !x.is_nan()) {
        if window.is_full() {
            residuals.push(x - *drift);
        }
        *drift = window.push(x);
    }
    residuals
}

// =============================================================================
// DSPOT
// =============================================================================

/// Drift-aware streaming outlier detector.
#[derive(Debug, Clone)]
pub struct DSpot {
    depth: usize,
    drift: f64,
    window: Option<StreamMean>,
    spot: Spot,
}

impl DSpot {
    /// Create an unfitted detector.
    ///
    /// # Errors
    ///
    /// Parameter validation errors or `AllocationFailed`.
    pub fn new(config: DSpotConfig) -> SpotResult<Self> {
        Self::with_allocator(config, &SystemAllocator)
    }

    /// Create an unfitted detector with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Parameter validation errors or the allocator's failure.
    pub fn with_allocator(config: DSpotConfig, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        let spot = Spot::with_allocator(config.spot, allocator)?;
        let window = match config.depth {
            0 => None,
            depth => Some(StreamMean::with_allocator(depth, allocator)?),
        };
        Ok(Self {
            depth: config.depth,
            drift: 0.0,
            window,
            spot,
        })
    }

    /// Calibrate on a batch in arrival order.
    ///
    /// The first `depth` values warm the window; the inner detector is then
    /// fitted on the residuals of the remaining values against the sliding
    /// mean, exactly as `step` would have computed them.
    ///
    /// # Errors
    ///
    /// `ExcessThresholdIsNaN` when the batch is not longer than `depth`,
    /// otherwise as [`Spot::fit`].
    pub fn fit(&mut self, data: &[f64]) -> SpotResult<()> {
        self.reset();
        let Some(window) = self.window.as_mut() else {
            return self.spot.fit(data);
        };

        let residuals = warm_residuals(window, data, &mut self.drift);
        debug!(
            depth = self.depth,
            drift = self.drift,
            residuals = residuals.len(),
            "dspot window warmed"
        );
        self.spot.fit(&residuals)
    }

    /// Classify one observation after removing the drift.
    ///
    /// # Errors
    ///
    /// `DataIsNaN` for a NaN observation; once the window is warm, the
    /// inner detector's errors.
    pub fn step(&mut self, x: f64) -> SpotResult<Event> {
        if x.is_nan() {
            warn!(spot_event = "rejected", "NaN observation rejected");
            return Err(SpotError::DataIsNaN);
        }
        let Some(window) = self.window.as_mut() else {
            return self.spot.step(x);
        };

        if !window.is_full() {
            self.drift = window.push(x);
            return Ok(Event::Normal);
        }

        let event = self.spot.step(x - self.drift)?;
        if !event.is_alert() {
            self.drift = window.push(x);
        }
        Ok(event)
    }

    /// Return to the unfitted state with an empty window.
    pub fn reset(&mut self) {
        self.spot.reset();
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.drift = 0.0;
    }

    /// Value exceeded with probability `q`, drift included.
    #[must_use]
    pub fn quantile(&self, q: f64) -> f64 {
        self.spot.quantile(q) + self.drift
    }

    /// Probability of observing a value beyond `z`, drift included.
    #[must_use]
    pub fn probability(&self, z: f64) -> f64 {
        self.spot.probability(z - self.drift)
    }

    /// Current drift estimate.
    #[inline]
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Moving-average depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the window is full (always true with `depth == 0`).
    #[inline]
    pub fn is_warm(&self) -> bool {
        self.window.as_ref().is_none_or(StreamMean::is_full)
    }

    /// Anomaly threshold on the raw scale.
    #[inline]
    pub fn anomaly_threshold(&self) -> f64 {
        self.spot.anomaly_threshold() + self.drift
    }

    /// Excess threshold on the raw scale.
    #[inline]
    pub fn excess_threshold(&self) -> f64 {
        self.spot.excess_threshold() + self.drift
    }

    /// Upper alarm threshold (`+inf` when monitoring the lower tail).
    pub fn upper_threshold(&self) -> f64 {
        self.bounds().upper
    }

    /// Lower alarm threshold (`-inf` when monitoring the upper tail).
    pub fn lower_threshold(&self) -> f64 {
        self.bounds().lower
    }

    /// Alarm bounds on the raw scale.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let z = self.anomaly_threshold();
        if self.spot.config().low {
            Bounds::new(z, f64::INFINITY)
        } else {
            Bounds::new(f64::NEG_INFINITY, z)
        }
    }

    /// Inner detector (residual scale).
    #[inline]
    pub fn spot(&self) -> &Spot {
        &self.spot
    }

    /// Return the latest JSONL evidence entry if logging is enabled.
    #[must_use]
    pub fn evidence_jsonl(&self) -> Option<String> {
        if !self.spot.config().enable_logging {
            return None;
        }
        self.spot
            .last_evidence()
            .map(|evidence| evidence.to_jsonl_with(SCHEMA_DSPOT, Some(self.drift)))
    }

    /// Snapshot with thresholds on the raw scale.
    #[must_use]
    pub fn status(&self) -> SpotStatus {
        let inner = self.spot.status();
        SpotStatus {
            excess_threshold: inner.excess_threshold + self.drift,
            anomaly_threshold: inner.anomaly_threshold + self.drift,
            drift: self.drift,
            ..inner
        }
    }
}

// =============================================================================
// Two-sided DSPOT
// =============================================================================

/// Both tails monitored on one drift-corrected stream.
#[derive(Debug, Clone)]
pub struct TwoSidedDSpot {
    depth: usize,
    drift: f64,
    window: Option<StreamMean>,
    spot: TwoSidedSpot,
}

impl TwoSidedDSpot {
    /// Create an unfitted detector (the `low` flag of `config.spot` is
    /// ignored).
    ///
    /// # Errors
    ///
    /// Parameter validation errors or `AllocationFailed`.
    pub fn new(config: DSpotConfig) -> SpotResult<Self> {
        Self::with_allocator(config, &SystemAllocator)
    }

    /// Create an unfitted detector with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Parameter validation errors or the allocator's failure.
    pub fn with_allocator(config: DSpotConfig, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        let spot = TwoSidedSpot::with_allocator(config.spot, allocator)?;
        let window = match config.depth {
            0 => None,
            depth => Some(StreamMean::with_allocator(depth, allocator)?),
        };
        Ok(Self {
            depth: config.depth,
            drift: 0.0,
            window,
            spot,
        })
    }

    /// Calibrate both tails on the residuals of a batch in arrival order.
    ///
    /// # Errors
    ///
    /// Same as [`DSpot::fit`].
    pub fn fit(&mut self, data: &[f64]) -> SpotResult<()> {
        self.reset();
        let Some(window) = self.window.as_mut() else {
            return self.spot.fit(data);
        };
        let residuals = warm_residuals(window, data, &mut self.drift);
        debug!(
            depth = self.depth,
            drift = self.drift,
            residuals = residuals.len(),
            "two-sided dspot window warmed"
        );
        self.spot.fit(&residuals)
    }

    /// Classify one observation after removing the drift.
    ///
    /// # Errors
    ///
    /// `DataIsNaN` for a NaN observation; once the window is warm, the
    /// inner detector's errors.
    pub fn step(&mut self, x: f64) -> SpotResult<Outcome> {
        if x.is_nan() {
            warn!(spot_event = "rejected", "NaN observation rejected");
            return Err(SpotError::DataIsNaN);
        }
        let Some(window) = self.window.as_mut() else {
            return self.spot.step(x);
        };

        if !window.is_full() {
            self.drift = window.push(x);
            return Ok(Outcome::NORMAL);
        }

        let outcome = self.spot.step(x - self.drift)?;
        if !outcome.event.is_alert() {
            self.drift = window.push(x);
        }
        Ok(outcome)
    }

    /// Return to the unfitted state with an empty window.
    pub fn reset(&mut self) {
        self.spot.reset();
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.drift = 0.0;
    }

    /// Current drift estimate.
    #[inline]
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Moving-average depth.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the window is full (always true with `depth == 0`).
    #[inline]
    pub fn is_warm(&self) -> bool {
        self.window.as_ref().is_none_or(StreamMean::is_full)
    }

    /// Alarm bounds on the raw scale.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.spot.thresholds().shifted(self.drift)
    }

    /// Excess bounds on the raw scale.
    #[must_use]
    pub fn excess_bounds(&self) -> Bounds {
        self.spot.excess_bounds().shifted(self.drift)
    }

    /// Upper alarm threshold.
    pub fn upper_threshold(&self) -> f64 {
        self.bounds().upper
    }

    /// Lower alarm threshold.
    pub fn lower_threshold(&self) -> f64 {
        self.bounds().lower
    }

    /// Anomalies reported on both sides.
    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.spot.anomalies()
    }

    /// Inner detectors (residual scale).
    #[inline]
    pub fn spot(&self) -> &TwoSidedSpot {
        &self.spot
    }

    /// Snapshot of one side with thresholds on the raw scale.
    #[must_use]
    pub fn status(&self, side: Side) -> SpotStatus {
        let inner = self.spot.side(side).status();
        SpotStatus {
            excess_threshold: inner.excess_threshold + self.drift,
            anomaly_threshold: inner.anomaly_threshold + self.drift,
            drift: self.drift,
            ..inner
        }
    }
}
