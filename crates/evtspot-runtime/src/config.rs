#![forbid(unsafe_code)]

//! Detector configuration.
//!
//! [`SpotConfig`] carries every tunable of a [`Spot`](crate::Spot) detector;
//! [`DSpotConfig`] adds the drift window depth for
//! [`DSpot`](crate::DSpot).
//!
//! # Validation
//!
//! | Parameter | Accepted range | Error |
//! |-----------|----------------|-------|
//! | `level` | `[0, 1)` | `LevelOutOfBounds` |
//! | `q` | `(0, 1 - level)` | `QOutOfBounds` |
//! | `max_excess` | `>= 1` | `AllocationFailed` |
//!
//! NaN `level` or `q` fail the range check.

use std::fmt;

use evtspot_core::{SpotError, SpotResult};

// =============================================================================
// Refit Policy
// =============================================================================

/// When the tail is re-fitted while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefitPolicy {
    /// After every excess.
    #[default]
    Immediate,
    /// After every `every` excesses (0 behaves like 1).
    Periodic {
        /// Excesses between two fits.
        every: u64,
    },
}

impl RefitPolicy {
    /// Number of excesses that triggers a fit.
    #[must_use]
    pub const fn period(self) -> u64 {
        match self {
            Self::Immediate => 1,
            Self::Periodic { every: 0 } => 1,
            Self::Periodic { every } => every,
        }
    }

    /// Stable string representation for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Periodic { .. } => "periodic",
        }
    }
}

impl fmt::Display for RefitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Periodic { every } => write!(f, "every {every} excesses"),
        }
    }
}

// =============================================================================
// SPOT Configuration
// =============================================================================

/// Configuration for a single-tail SPOT detector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpotConfig {
    /// Target probability of a false alarm.
    /// The anomaly threshold is the `1 - q` quantile of the monitored tail.
    /// Default: 1e-4
    pub q: f64,

    /// Empirical quantile used as the excess threshold.
    /// Observations beyond it feed the tail model.
    /// Default: 0.98
    pub level: f64,

    /// Monitor the lower tail instead of the upper one.
    /// Default: false
    pub low: bool,

    /// Keep anomalies out of the model and report them as `Anomaly`.
    /// When false, every observation beyond the excess threshold is learned.
    /// Default: true
    pub discard_anomalies: bool,

    /// Number of recent excesses retained for fitting.
    /// Default: 200
    pub max_excess: usize,

    /// When to re-fit while streaming.
    /// Default: `RefitPolicy::Immediate`
    pub refit: RefitPolicy,

    /// Record per-step evidence as JSONL.
    /// Default: false
    pub enable_logging: bool,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            q: 1e-4,
            level: 0.98,
            low: false,
            discard_anomalies: true,
            max_excess: 200,
            refit: RefitPolicy::Immediate,
            enable_logging: false,
        }
    }
}

impl SpotConfig {
    /// Rare alarms: `q = 1e-5` with a `0.995` excess level.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            q: 1e-5,
            level: 0.995,
            ..Default::default()
        }
    }

    /// Default parameters applied to the lower tail.
    #[must_use]
    pub fn lower_tail() -> Self {
        Self {
            low: true,
            ..Default::default()
        }
    }

    /// Set the false-alarm probability.
    #[must_use]
    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    /// Set the excess threshold level.
    #[must_use]
    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }

    /// Select the monitored tail.
    #[must_use]
    pub fn with_low(mut self, low: bool) -> Self {
        self.low = low;
        self
    }

    /// Toggle anomaly discarding.
    #[must_use]
    pub fn with_discard_anomalies(mut self, discard: bool) -> Self {
        self.discard_anomalies = discard;
        self
    }

    /// Set the exceedance window size.
    #[must_use]
    pub fn with_max_excess(mut self, max_excess: usize) -> Self {
        self.max_excess = max_excess;
        self
    }

    /// Set the streaming refit policy.
    #[must_use]
    pub fn with_refit(mut self, refit: RefitPolicy) -> Self {
        self.refit = refit;
        self
    }

    /// Enable evidence logging.
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// `+1` for the upper tail, `-1` for the lower tail.
    #[inline]
    #[must_use]
    pub fn up_down(&self) -> f64 {
        if self.low { -1.0 } else { 1.0 }
    }

    /// Check the parameter ranges.
    ///
    /// # Errors
    ///
    /// `LevelOutOfBounds` when `level` is outside `[0, 1)`, `QOutOfBounds`
    /// when `q` is outside `(0, 1 - level)`, `AllocationFailed` when
    /// `max_excess` is zero.
    pub fn validate(&self) -> SpotResult<()> {
        if !(0.0..1.0).contains(&self.level) {
            return Err(SpotError::LevelOutOfBounds { level: self.level });
        }
        if !(self.q > 0.0 && self.q < 1.0 - self.level) {
            return Err(SpotError::QOutOfBounds {
                q: self.q,
                level: self.level,
            });
        }
        if self.max_excess == 0 {
            return Err(SpotError::AllocationFailed { requested: 0 });
        }
        Ok(())
    }

    /// Whether two detectors share the parameters that make their models
    /// interchangeable.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.q == other.q
            && self.max_excess == other.max_excess
            && self.discard_anomalies == other.discard_anomalies
    }
}

// =============================================================================
// DSPOT Configuration
// =============================================================================

/// Configuration for the drift-aware detector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DSpotConfig {
    /// Moving-average window length. Zero disables drift tracking.
    /// Default: 30
    pub depth: usize,

    /// Parameters of the inner detector.
    pub spot: SpotConfig,
}

impl Default for DSpotConfig {
    fn default() -> Self {
        Self {
            depth: 30,
            spot: SpotConfig::default(),
        }
    }
}

impl DSpotConfig {
    /// Drift tracking over `depth` observations with default SPOT parameters.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Set the moving-average depth.
    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Set the inner detector parameters.
    #[must_use]
    pub fn with_spot(mut self, spot: SpotConfig) -> Self {
        self.spot = spot;
        self
    }
}
