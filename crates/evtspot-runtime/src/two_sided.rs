#![forbid(unsafe_code)]

//! Two-sided detection: one SPOT per tail.
//!
//! Both detectors share every parameter except the monitored side. An
//! observation beyond either anomaly threshold is reported (upper side
//! checked first) and withheld from both models; anything else is stepped
//! through both.
//!
//! [`merge_biased`] assembles a detector from the lower tail of one
//! instance and the upper tail of another, which lets a pipeline keep a
//! well-calibrated side while replacing the other.

use evtspot_core::{BufferAllocator, SpotError, SpotResult, SystemAllocator};
use tracing::{debug, info};

use crate::bounds::Bounds;
use crate::config::SpotConfig;
use crate::event::{Event, Side};
use crate::spot::Spot;

/// Decision of a two-sided step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Classification.
    pub event: Event,
    /// Tail involved (`None` for `Normal`).
    pub side: Option<Side>,
}

impl Outcome {
    pub(crate) const NORMAL: Self = Self {
        event: Event::Normal,
        side: None,
    };

    fn on(side: Side, event: Event) -> Self {
        Self {
            event,
            side: Some(side),
        }
    }
}

/// Upper and lower SPOT detectors driven together.
#[derive(Debug, Clone)]
pub struct TwoSidedSpot {
    upper: Spot,
    lower: Spot,
}

impl TwoSidedSpot {
    /// Create both detectors from `config` (its `low` flag is ignored).
    ///
    /// # Errors
    ///
    /// Parameter validation errors or `AllocationFailed`.
    pub fn new(config: SpotConfig) -> SpotResult<Self> {
        Self::with_allocator(config, &SystemAllocator)
    }

    /// Create both detectors with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Parameter validation errors or the allocator's failure.
    pub fn with_allocator(config: SpotConfig, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            upper: Spot::with_allocator(config.with_low(false), allocator)?,
            lower: Spot::with_allocator(config.with_low(true), allocator)?,
        })
    }

    /// Calibrate both tails on the same batch.
    ///
    /// # Errors
    ///
    /// The first side's failure (upper, then lower).
    pub fn fit(&mut self, data: &[f64]) -> SpotResult<()> {
        self.upper.fit(data)?;
        self.lower.fit(data)
    }

    /// Classify one observation.
    ///
    /// # Errors
    ///
    /// `DataIsNaN`, or `ExcessThresholdIsNaN` before a successful fit.
    pub fn step(&mut self, x: f64) -> SpotResult<Outcome> {
        if x.is_nan() {
            return Err(SpotError::DataIsNaN);
        }
        if !(self.upper.is_fitted() && self.lower.is_fitted()) {
            return Err(SpotError::ExcessThresholdIsNaN);
        }

        for (side, spot) in [(Side::Upper, &mut self.upper), (Side::Lower, &mut self.lower)] {
            if spot.config().discard_anomalies && spot.exceeds_anomaly_threshold(x) {
                // Counted through the detector so its status stays accurate.
                let event = spot.step(x)?;
                info!(spot_event = "anomaly", side = side.as_str(), x, "two-sided anomaly");
                return Ok(Outcome::on(side, event));
            }
        }

        let up = self.upper.step(x)?;
        let down = self.lower.step(x)?;
        Ok(match (up, down) {
            (Event::Normal, Event::Normal) => Outcome::NORMAL,
            (Event::Normal, event) => Outcome::on(Side::Lower, event),
            (event, _) => Outcome::on(Side::Upper, event),
        })
    }

    /// Alarm bounds.
    #[must_use]
    pub fn thresholds(&self) -> Bounds {
        Bounds::new(self.lower.anomaly_threshold(), self.upper.anomaly_threshold())
    }

    /// Excess bounds: values outside them feed a tail model.
    #[must_use]
    pub fn excess_bounds(&self) -> Bounds {
        Bounds::new(self.lower.excess_threshold(), self.upper.excess_threshold())
    }

    /// Upper-tail detector.
    #[inline]
    pub fn upper(&self) -> &Spot {
        &self.upper
    }

    /// Lower-tail detector.
    #[inline]
    pub fn lower(&self) -> &Spot {
        &self.lower
    }

    /// Detector for `side`.
    #[must_use]
    pub fn side(&self, side: Side) -> &Spot {
        match side {
            Side::Upper => &self.upper,
            Side::Lower => &self.lower,
        }
    }

    /// Anomalies reported on both sides.
    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.upper.anomalies() + self.lower.anomalies()
    }

    /// Return both sides to the unfitted state.
    pub fn reset(&mut self) {
        self.upper.reset();
        self.lower.reset();
    }
}

/// Build a detector from the lower tail of `lower_source` and the upper
/// tail of `upper_source`.
///
/// Not symmetric: swapping the arguments swaps which model each side comes
/// from.
///
/// The copies take their storage from the global allocator; use
/// [`merge_biased_in`] to charge them to a [`BufferAllocator`].
///
/// # Errors
///
/// `IncompatibleMerge` unless both sources share `q`, `max_excess` and
/// `discard_anomalies`.
pub fn merge_biased(lower_source: &TwoSidedSpot, upper_source: &TwoSidedSpot) -> SpotResult<TwoSidedSpot> {
    merge_biased_in(lower_source, upper_source, &SystemAllocator)
}

/// [`merge_biased`] with the copied tails allocated through `allocator`.
///
/// # Errors
///
/// `IncompatibleMerge` as for [`merge_biased`], or the allocator's failure.
pub fn merge_biased_in(
    lower_source: &TwoSidedSpot,
    upper_source: &TwoSidedSpot,
    allocator: &dyn BufferAllocator,
) -> SpotResult<TwoSidedSpot> {
    if !lower_source
        .lower
        .config()
        .is_compatible(upper_source.upper.config())
    {
        debug!("merge rejected: detector configurations differ");
        return Err(SpotError::IncompatibleMerge);
    }
    Ok(TwoSidedSpot {
        upper: upper_source.upper.clone_in(allocator)?,
        lower: lower_source.lower.clone_in(allocator)?,
    })
}
