#![forbid(unsafe_code)]

//! SPOT: streaming peaks-over-threshold outlier detection.
//!
//! # Mathematical Model
//!
//! An excess threshold `t` is set at the `level` quantile of a calibration
//! batch. Observations beyond `t` are exceedances; their magnitudes
//! `Y = ±(x - t)` are modelled by a Generalized Pareto Distribution whose
//! parameters `(gamma, sigma)` are refreshed as new exceedances arrive.
//!
//! With `n` observations and `Nt` exceedances, the anomaly threshold is the
//! value exceeded with probability `q`:
//!
//! ```text
//! z_q = t ± tail.quantile(Nt / n, q)
//! ```
//!
//! The sign follows the monitored tail (`+` upper, `-` lower).
//!
//! # Step Decision
//!
//! ```text
//! x beyond z_q (and discard_anomalies)  → Anomaly   (n, Nt unchanged)
//! x beyond t                            → Excess    (n += 1, Nt += 1, refit)
//! otherwise                             → Normal    (n += 1)
//! ```
//!
//! "Beyond" is strict: `x == t` is `Normal`.
//!
//! # Invariants
//!
//! 1. `Nt <= n` at all times.
//! 2. Once fitted, `t` and `z_q` are finite and `z_q` lies further into the
//!    tail than `t`.
//! 3. Discarded anomalies never touch `n`, `Nt` or the tail.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Invalid parameters | `new` fails, no detector exists |
//! | Degenerate calibration batch | `ExcessThresholdIsNaN`, detector stays unfitted |
//! | No usable GPD fit | `AnomalyThresholdIsNaN`, detector stays unfitted |
//! | `step` before a successful `fit` | `ExcessThresholdIsNaN` |
//! | NaN observation | `DataIsNaN`, state untouched |
//! | Refit yields a non-finite threshold | Previous `z_q` kept |

use evtspot_core::{BufferAllocator, SpotError, SpotResult, SystemAllocator, Tail, p2_quantile};
use tracing::{debug, info, trace, warn};

use crate::config::SpotConfig;
use crate::event::{Event, StepEvidence};
use crate::status::SpotStatus;

/// Single-tail streaming outlier detector.
#[derive(Debug, Clone)]
pub struct Spot {
    config: SpotConfig,

    /// `+1` upper tail, `-1` lower tail.
    up_down: f64,

    excess_threshold: f64,
    anomaly_threshold: f64,

    /// Non-anomalous observations.
    n: u64,
    /// Exceedances among them.
    nt: u64,
    /// Discarded anomalies.
    anomalies: u64,
    /// Exceedances pushed since the last tail fit.
    pending_refit: u64,

    fitted: bool,
    tail: Tail,
    last_evidence: Option<StepEvidence>,
}

impl Spot {
    /// Create an unfitted detector.
    ///
    /// # Errors
    ///
    /// Parameter validation errors (see [`SpotConfig::validate`]) or
    /// `AllocationFailed`.
    pub fn new(config: SpotConfig) -> SpotResult<Self> {
        Self::with_allocator(config, &SystemAllocator)
    }

    /// Create an unfitted detector whose tail storage comes from `allocator`.
    ///
    /// # Errors
    ///
    /// Parameter validation errors or the allocator's failure.
    pub fn with_allocator(config: SpotConfig, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        config.validate()?;
        let tail = Tail::with_allocator(config.max_excess, allocator)?;
        debug!(
            q = config.q,
            level = config.level,
            low = config.low,
            max_excess = config.max_excess,
            allocator = allocator.name(),
            refit = config.refit.as_str(),
            "spot detector created"
        );
        Ok(Self {
            up_down: config.up_down(),
            config,
            excess_threshold: f64::NAN,
            anomaly_threshold: f64::NAN,
            n: 0,
            nt: 0,
            anomalies: 0,
            pending_refit: 0,
            fitted: false,
            tail,
            last_evidence: None,
        })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    ///
    /// `AllocationFailed` when the tail storage cannot be obtained.
    pub fn with_defaults() -> SpotResult<Self> {
        Self::new(SpotConfig::default())
    }

    /// Copy of this detector whose tail storage comes from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn clone_in(&self, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            config: self.config,
            up_down: self.up_down,
            excess_threshold: self.excess_threshold,
            anomaly_threshold: self.anomaly_threshold,
            n: self.n,
            nt: self.nt,
            anomalies: self.anomalies,
            pending_refit: self.pending_refit,
            fitted: self.fitted,
            tail: self.tail.clone_in(allocator)?,
            last_evidence: self.last_evidence,
        })
    }

    // =========================================================================
    // Calibration
    // =========================================================================

    /// Calibrate on a batch in any order.
    ///
    /// The excess threshold is the exact `level` order statistic (computed on
    /// a sorted copy); exceedances then enter the tail in arrival order, so
    /// the retained window holds the most recent ones.
    ///
    /// # Errors
    ///
    /// `ExcessThresholdIsNaN` for an empty or degenerate batch,
    /// `AnomalyThresholdIsNaN` when the tail cannot be fitted.
    pub fn fit(&mut self, data: &[f64]) -> SpotResult<()> {
        let mut sorted: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        let threshold = self.order_statistic(&sorted);
        self.calibrate(threshold, data.iter().copied())
    }

    /// Calibrate on a batch already sorted in ascending order.
    ///
    /// Exceedances enter the tail from the threshold outward for either
    /// side, so when they outnumber `max_excess` the retained window holds
    /// the most extreme ones.
    ///
    /// # Errors
    ///
    /// Same as [`fit`](Self::fit).
    pub fn fit_sorted(&mut self, sorted: &[f64]) -> SpotResult<()> {
        let threshold = self.order_statistic(sorted);
        if self.config.low {
            self.calibrate(threshold, sorted.iter().rev().copied())
        } else {
            self.calibrate(threshold, sorted.iter().copied())
        }
    }

    /// Calibrate using the P² estimate of the threshold (no copy, no sort).
    ///
    /// # Errors
    ///
    /// `ExcessThresholdIsNaN` for fewer than five values, otherwise as
    /// [`fit`](Self::fit).
    pub fn fit_unsorted(&mut self, data: &[f64]) -> SpotResult<()> {
        let p = if self.config.low {
            1.0 - self.config.level
        } else {
            self.config.level
        };
        let threshold = p2_quantile(p, data);
        self.calibrate(threshold, data.iter().copied())
    }

    fn order_statistic(&self, sorted: &[f64]) -> f64 {
        let size = sorted.len();
        if size == 0 {
            return f64::NAN;
        }
        let rank = (self.config.level * size as f64) as usize;
        let rank = if self.config.low { size - rank } else { rank };
        sorted[rank.min(size - 1)]
    }

    fn calibrate(
        &mut self,
        threshold: f64,
        data: impl ExactSizeIterator<Item = f64>,
    ) -> SpotResult<()> {
        self.reset();
        if !threshold.is_finite() {
            debug!(threshold, size = data.len(), "spot fit rejected: degenerate excess threshold");
            return Err(SpotError::ExcessThresholdIsNaN);
        }

        self.excess_threshold = threshold;
        for x in data {
            if x.is_nan() {
                continue;
            }
            self.n += 1;
            let excess = self.up_down * (x - threshold);
            if excess > 0.0 {
                self.nt += 1;
                self.tail.push(excess);
            }
        }

        let llhood = self.tail.fit();
        let z = self.quantile(self.config.q);
        if !z.is_finite() {
            debug!(
                threshold,
                n = self.n,
                nt = self.nt,
                llhood,
                "spot fit rejected: non-finite anomaly threshold"
            );
            self.reset();
            return Err(SpotError::AnomalyThresholdIsNaN);
        }

        self.anomaly_threshold = z;
        self.fitted = true;
        debug!(
            excess_threshold = threshold,
            anomaly_threshold = z,
            gamma = self.tail.gamma(),
            sigma = self.tail.sigma(),
            n = self.n,
            nt = self.nt,
            "spot fitted"
        );
        Ok(())
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Classify one observation and update the model.
    ///
    /// # Errors
    ///
    /// `DataIsNaN` for a NaN observation, `ExcessThresholdIsNaN` before a
    /// successful fit. Neither changes the detector state.
    pub fn step(&mut self, x: f64) -> SpotResult<Event> {
        if x.is_nan() {
            warn!(spot_event = "rejected", "NaN observation rejected");
            return Err(SpotError::DataIsNaN);
        }
        if !self.fitted {
            return Err(SpotError::ExcessThresholdIsNaN);
        }

        if self.config.discard_anomalies && self.exceeds_anomaly_threshold(x) {
            self.anomalies += 1;
            info!(
                spot_event = "anomaly",
                x,
                anomaly_threshold = self.anomaly_threshold,
                anomalies = self.anomalies,
                "anomaly detected"
            );
            self.record(x, Event::Anomaly, false);
            return Ok(Event::Anomaly);
        }

        self.n += 1;
        let excess = self.up_down * (x - self.excess_threshold);
        if excess > 0.0 {
            self.nt += 1;
            self.tail.push(excess);
            self.pending_refit += 1;
            trace!(spot_event = "excess", x, excess, nt = self.nt, "excess recorded");
            let refitted = if self.pending_refit >= self.config.refit.period() {
                self.refit()
            } else {
                false
            };
            self.record(x, Event::Excess, refitted);
            Ok(Event::Excess)
        } else {
            self.record(x, Event::Normal, false);
            Ok(Event::Normal)
        }
    }

    /// Fit the tail on the buffered exceedances and refresh the anomaly
    /// threshold.
    ///
    /// Returns whether the threshold was updated. A non-finite result keeps
    /// the previous threshold.
    pub fn refit(&mut self) -> bool {
        if !self.fitted {
            return false;
        }
        self.pending_refit = 0;
        let llhood = self.tail.fit();
        let z = self.quantile(self.config.q);
        if z.is_finite() {
            self.anomaly_threshold = z;
            debug!(
                anomaly_threshold = z,
                gamma = self.tail.gamma(),
                sigma = self.tail.sigma(),
                llhood,
                "tail refitted"
            );
            true
        } else {
            debug!(llhood, "refit produced a non-finite threshold; keeping previous");
            false
        }
    }

    fn record(&mut self, x: f64, event: Event, refitted: bool) {
        self.last_evidence = Some(StepEvidence {
            observation: x,
            event,
            excess: self.up_down * (x - self.excess_threshold),
            excess_threshold: self.excess_threshold,
            anomaly_threshold: self.anomaly_threshold,
            gamma: self.tail.gamma(),
            sigma: self.tail.sigma(),
            refitted,
            n: self.n,
            nt: self.nt,
        });
    }

    /// Return to the unfitted state, keeping the tail allocation.
    pub fn reset(&mut self) {
        self.tail.clear();
        self.excess_threshold = f64::NAN;
        self.anomaly_threshold = f64::NAN;
        self.n = 0;
        self.nt = 0;
        self.anomalies = 0;
        self.pending_refit = 0;
        self.fitted = false;
        self.last_evidence = None;
    }

    // =========================================================================
    // Tail queries
    // =========================================================================

    /// Value exceeded with probability `q` under the current model.
    ///
    /// NaN before any observation has been counted.
    #[must_use]
    pub fn quantile(&self, q: f64) -> f64 {
        let s = self.excess_rate();
        self.excess_threshold + self.up_down * self.tail.quantile(s, q)
    }

    /// Probability of observing a value beyond `z`.
    ///
    /// Only meaningful for `z` beyond the excess threshold.
    #[must_use]
    pub fn probability(&self, z: f64) -> f64 {
        let s = self.excess_rate();
        self.tail
            .probability(s, self.up_down * (z - self.excess_threshold))
    }

    /// Whether `x` lies strictly beyond the anomaly threshold.
    #[inline]
    #[must_use]
    pub fn exceeds_anomaly_threshold(&self, x: f64) -> bool {
        self.up_down * (x - self.anomaly_threshold) > 0.0
    }

    fn excess_rate(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.nt as f64 / self.n as f64
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get configuration.
    #[inline]
    pub fn config(&self) -> &SpotConfig {
        &self.config
    }

    /// Excess threshold `t` (NaN until fitted).
    #[inline]
    pub fn excess_threshold(&self) -> f64 {
        self.excess_threshold
    }

    /// Anomaly threshold `z_q` (NaN until fitted).
    #[inline]
    pub fn anomaly_threshold(&self) -> f64 {
        self.anomaly_threshold
    }

    /// Non-anomalous observations counted.
    #[inline]
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Exceedances counted.
    #[inline]
    pub fn nt(&self) -> u64 {
        self.nt
    }

    /// Anomalies reported.
    #[inline]
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Whether a fit has succeeded since creation or the last reset.
    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Monitored tail model.
    #[inline]
    pub fn tail(&self) -> &Tail {
        &self.tail
    }

    /// Tail shape.
    #[inline]
    pub fn gamma(&self) -> f64 {
        self.tail.gamma()
    }

    /// Tail scale.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.tail.sigma()
    }

    /// Get the last evidence.
    pub fn last_evidence(&self) -> Option<&StepEvidence> {
        self.last_evidence.as_ref()
    }

    /// Return the latest JSONL evidence entry if logging is enabled.
    #[must_use]
    pub fn evidence_jsonl(&self) -> Option<String> {
        if !self.config.enable_logging {
            return None;
        }
        self.last_evidence.as_ref().map(StepEvidence::to_jsonl)
    }

    /// Snapshot of counters, thresholds and tail parameters.
    #[must_use]
    pub fn status(&self) -> SpotStatus {
        SpotStatus {
            n: self.n,
            nt: self.nt,
            anomalies: self.anomalies,
            excesses: self.tail.peaks().len(),
            excess_threshold: self.excess_threshold,
            anomaly_threshold: self.anomaly_threshold,
            gamma: self.tail.gamma(),
            sigma: self.tail.sigma(),
            drift: 0.0,
        }
    }
}
