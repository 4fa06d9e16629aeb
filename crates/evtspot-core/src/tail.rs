#![forbid(unsafe_code)]

//! GPD model of one distribution tail.
//!
//! Owns the exceedance window and the current `(gamma, sigma)`. `s` below is
//! the empirical probability of exceeding the excess threshold (`Nt / n`),
//! supplied by the caller.
//!
//! ```text
//! P(X > t + d) ~ s (1 + gamma d / sigma)^(-1/gamma)     gamma != 0
//!              ~ s exp(-d / sigma)                      gamma == 0
//!
//! quantile(q)  = sigma / gamma ((q / s)^(-gamma) - 1)   gamma != 0
//!              = -sigma ln(q / s)                       gamma == 0
//! ```

use crate::alloc::{BufferAllocator, SystemAllocator};
use crate::error::SpotResult;
use crate::estimator::{Estimator, GpdFit};
use crate::peaks::Peaks;

/// Tail model: exceedance statistics plus fitted GPD parameters.
#[derive(Debug, Clone)]
pub struct Tail {
    gamma: f64,
    sigma: f64,
    estimator: Option<Estimator>,
    peaks: Peaks,
}

impl Tail {
    /// Create an unfitted tail retaining at most `max_excess` exceedances.
    ///
    /// # Errors
    ///
    /// Fails with `AllocationFailed` when storage cannot be obtained.
    pub fn new(max_excess: usize) -> SpotResult<Self> {
        Self::with_allocator(max_excess, &SystemAllocator)
    }

    /// Create an unfitted tail with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn with_allocator(max_excess: usize, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            gamma: f64::NAN,
            sigma: f64::NAN,
            estimator: None,
            peaks: Peaks::with_allocator(max_excess, allocator)?,
        })
    }

    /// Copy with storage from `allocator`.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's failure.
    pub fn clone_in(&self, allocator: &dyn BufferAllocator) -> SpotResult<Self> {
        Ok(Self {
            gamma: self.gamma,
            sigma: self.sigma,
            estimator: self.estimator,
            peaks: self.peaks.clone_in(allocator)?,
        })
    }

    /// Record an exceedance magnitude.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.peaks.push(x);
    }

    /// Return to the unfitted state, keeping the allocation.
    pub fn clear(&mut self) {
        self.peaks.clear();
        self.gamma = f64::NAN;
        self.sigma = f64::NAN;
        self.estimator = None;
    }

    /// Run every estimator and keep the most likely valid parameters.
    ///
    /// Returns the selected log-likelihood, or NaN when no estimator produced
    /// usable parameters (for instance, no exceedance recorded yet). In that
    /// case the previous parameters are kept.
    pub fn fit(&mut self) -> f64 {
        if self.peaks.is_empty() {
            return f64::NAN;
        }

        let mut best: Option<(Estimator, GpdFit)> = None;
        for estimator in Estimator::ALL {
            let candidate = estimator.estimate(&self.peaks);
            if candidate.beats(best.as_ref().map(|(_, fit)| fit)) {
                best = Some((estimator, candidate));
            }
        }

        match best {
            Some((estimator, fit)) => {
                self.gamma = fit.gamma;
                self.sigma = fit.sigma;
                self.estimator = Some(estimator);
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    estimator = estimator.as_str(),
                    gamma = fit.gamma,
                    sigma = fit.sigma,
                    llhood = fit.log_likelihood,
                    "tail fitted"
                );
                fit.log_likelihood
            }
            None => f64::NAN,
        }
    }

    /// Probability of exceeding the excess threshold by `d`.
    #[must_use]
    pub fn probability(&self, s: f64, d: f64) -> f64 {
        if self.gamma == 0.0 {
            s * (-d / self.sigma).exp()
        } else {
            let r = d * (self.gamma / self.sigma);
            s * (1.0 + r).powf(-1.0 / self.gamma)
        }
    }

    /// Distance beyond the excess threshold exceeded with probability `q`.
    #[must_use]
    pub fn quantile(&self, s: f64, q: f64) -> f64 {
        let r = q / s;
        if self.gamma == 0.0 {
            -self.sigma * r.ln()
        } else {
            (self.sigma / self.gamma) * (r.powf(-self.gamma) - 1.0)
        }
    }

    /// Shape parameter (NaN before the first successful fit).
    #[inline]
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Scale parameter (NaN before the first successful fit).
    #[inline]
    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Estimator that produced the current parameters.
    #[inline]
    #[must_use]
    pub fn estimator(&self) -> Option<Estimator> {
        self.estimator
    }

    /// Whether a fit has succeeded at least once.
    #[inline]
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.estimator.is_some()
    }

    /// Exceedance statistics.
    #[inline]
    #[must_use]
    pub fn peaks(&self) -> &Peaks {
        &self.peaks
    }
}
