#![forbid(unsafe_code)]

//! Generalized Pareto parameter estimators.
//!
//! # Method of moments
//!
//! ```text
//! R     = mean^2 / var
//! gamma = (1 - R) / 2
//! sigma = mean (1 + R) / 2
//! ```
//!
//! # Grimshaw
//!
//! The two-dimensional likelihood maximization reduces to the roots of
//!
//! ```text
//! u(x) = mean(1 / (1 + x Y_i))
//! v(x) = 1 + mean(ln(1 + x Y_i))
//! w(x) = u(x) v(x) - 1
//! ```
//!
//! searched in `(-1/max + eps, -eps)` and `(eps, 2 (mean - min) / min^2)`.
//! Every root `x*` yields `gamma = v(x*) - 1`, `sigma = gamma / x*`; the
//! trivial root `x* = 0` yields the exponential fit `gamma = 0`,
//! `sigma = mean`. The candidate with the highest likelihood wins, so a
//! failed root search only removes a candidate, never the result.

use std::fmt;

use crate::brent::{BRENT_DEFAULT_EPSILON, find_root};
use crate::peaks::Peaks;

/// GPD parameters with the log-likelihood they reach on the fitted peaks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpdFit {
    /// Shape parameter.
    pub gamma: f64,
    /// Scale parameter.
    pub sigma: f64,
    /// Log-likelihood of the peaks under `(gamma, sigma)`.
    pub log_likelihood: f64,
}

impl GpdFit {
    fn evaluate(peaks: &Peaks, gamma: f64, sigma: f64) -> Self {
        Self {
            gamma,
            sigma,
            log_likelihood: peaks.log_likelihood(gamma, sigma),
        }
    }

    /// Usable as a tail model: finite shape, finite positive scale and a
    /// likelihood that is not NaN.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.gamma.is_finite()
            && self.sigma.is_finite()
            && self.sigma > 0.0
            && !self.log_likelihood.is_nan()
    }

    /// Whether `self` should replace `incumbent`.
    #[must_use]
    pub fn beats(&self, incumbent: Option<&GpdFit>) -> bool {
        self.is_valid()
            && incumbent.is_none_or(|best| self.log_likelihood > best.log_likelihood)
    }
}

/// Available estimators, run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Estimator {
    /// Closed-form method of moments.
    MethodOfMoments,
    /// Grimshaw's profile-likelihood trick.
    Grimshaw,
}

impl Estimator {
    /// Every estimator, in the order the tail runs them.
    pub const ALL: [Estimator; 2] = [Estimator::MethodOfMoments, Estimator::Grimshaw];

    /// Stable string representation for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MethodOfMoments => "mom",
            Self::Grimshaw => "grimshaw",
        }
    }

    /// Fit the GPD to `peaks`.
    #[must_use]
    pub fn estimate(self, peaks: &Peaks) -> GpdFit {
        match self {
            Self::MethodOfMoments => mom(peaks),
            Self::Grimshaw => grimshaw(peaks),
        }
    }
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method-of-moments estimate.
#[must_use]
pub fn mom(peaks: &Peaks) -> GpdFit {
    let mean = peaks.mean();
    let var = peaks.var();
    let r = mean * mean / var;
    GpdFit::evaluate(peaks, 0.5 * (1.0 - r), 0.5 * mean * (1.0 + r))
}

fn grimshaw_w(x: f64, data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let (u, v) = data.iter().fold((0.0, 0.0), |(u, v), &y| {
        let s = 1.0 + x * y;
        (u + 1.0 / s, v + s.ln())
    });
    (u / n) * (1.0 + v / n) - 1.0
}

fn grimshaw_v(x: f64, data: &[f64]) -> f64 {
    let n = data.len() as f64;
    1.0 + data.iter().map(|&y| (1.0 + x * y).ln()).sum::<f64>() / n
}

fn grimshaw_candidate(x_star: f64, peaks: &Peaks) -> GpdFit {
    if x_star == 0.0 {
        return GpdFit::evaluate(peaks, 0.0, peaks.mean());
    }
    let gamma = grimshaw_v(x_star, peaks.as_slice()) - 1.0;
    GpdFit::evaluate(peaks, gamma, gamma / x_star)
}

/// Grimshaw estimate: best of the exponential fit and the roots of `w`.
#[must_use]
pub fn grimshaw(peaks: &Peaks) -> GpdFit {
    let data = peaks.as_slice();
    let min = peaks.min();
    let max = peaks.max();
    let mean = peaks.mean();
    let epsilon = BRENT_DEFAULT_EPSILON.min(0.5 / max);

    let left = find_root(
        -1.0 / max + epsilon,
        -epsilon,
        |x| grimshaw_w(x, data),
        BRENT_DEFAULT_EPSILON,
    );
    let right = find_root(
        epsilon,
        2.0 * (mean - min) / (min * min),
        |x| grimshaw_w(x, data),
        BRENT_DEFAULT_EPSILON,
    );

    let mut best = grimshaw_candidate(0.0, peaks);
    for root in [left, right].into_iter().flatten() {
        let candidate = grimshaw_candidate(root, peaks);
        if candidate.is_valid()
            && (!best.is_valid() || candidate.log_likelihood > best.log_likelihood)
        {
            best = candidate;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        left = ?left,
        right = ?right,
        gamma = best.gamma,
        sigma = best.sigma,
        "grimshaw roots"
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_next(state: &mut u64) -> u64 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        *state
    }

    fn uniform(state: &mut u64) -> f64 {
        // 53 high-quality bits, strictly inside (0, 1).
        ((lcg_next(state) >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    fn exponential_peaks(lambda: f64, n: usize, seed: u64) -> Peaks {
        let mut state = seed;
        let mut peaks = Peaks::new(n).unwrap();
        for _ in 0..n {
            peaks.push(-uniform(&mut state).ln() / lambda);
        }
        peaks
    }

    fn gpd_peaks(gamma: f64, sigma: f64, n: usize, seed: u64) -> Peaks {
        let mut state = seed;
        let mut peaks = Peaks::new(n).unwrap();
        for _ in 0..n {
            let u = uniform(&mut state);
            peaks.push(sigma / gamma * (u.powf(-gamma) - 1.0));
        }
        peaks
    }

    #[test]
    fn both_estimators_recover_exponential_scale() {
        for (lambda, seed) in [(1.0, 7), (0.5, 11), (4.0, 23)] {
            let peaks = exponential_peaks(lambda, 2000, seed);
            for estimator in Estimator::ALL {
                let fit = estimator.estimate(&peaks);
                assert!(fit.is_valid(), "{estimator}: {fit:?}");
                assert!(fit.gamma.abs() < 0.1, "{estimator}: gamma={}", fit.gamma);
                let rel = (fit.sigma * lambda - 1.0).abs();
                assert!(rel < 0.15, "{estimator}: sigma={} lambda={lambda}", fit.sigma);
            }
        }
    }

    #[test]
    fn grimshaw_never_loses_to_exponential_fit() {
        let peaks = gpd_peaks(0.3, 1.0, 1000, 99);
        let exp_ll = peaks.log_likelihood(0.0, peaks.mean());
        let fit = grimshaw(&peaks);
        assert!(fit.log_likelihood >= exp_ll);
    }

    #[test]
    fn grimshaw_recovers_heavy_tail_shape() {
        let peaks = gpd_peaks(0.3, 1.0, 3000, 5);
        let fit = grimshaw(&peaks);
        assert!((fit.gamma - 0.3).abs() < 0.1, "gamma={}", fit.gamma);
        assert!((fit.sigma - 1.0).abs() < 0.15, "sigma={}", fit.sigma);
    }

    #[test]
    fn grimshaw_recovers_bounded_tail_shape() {
        let peaks = gpd_peaks(-0.2, 2.0, 3000, 17);
        let fit = grimshaw(&peaks);
        assert!(fit.gamma < 0.0, "gamma={}", fit.gamma);
        assert!((fit.gamma + 0.2).abs() < 0.1, "gamma={}", fit.gamma);
    }

    #[test]
    fn mom_matches_closed_form() {
        let mut peaks = Peaks::new(4).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0] {
            peaks.push(v);
        }
        // mean = 2.5, var = 1.25, R = 5.
        let fit = mom(&peaks);
        assert!((fit.gamma + 2.0).abs() < 1e-12);
        assert!((fit.sigma - 7.5).abs() < 1e-12);
    }

    #[test]
    fn single_peak_falls_back_to_exponential() {
        let mut peaks = Peaks::new(4).unwrap();
        peaks.push(0.7);
        let fit = grimshaw(&peaks);
        assert!(fit.is_valid());
        assert_eq!(fit.gamma, 0.0);
        assert!((fit.sigma - 0.7).abs() < 1e-12);
    }

    #[test]
    fn beats_requires_validity() {
        let good = GpdFit {
            gamma: 0.1,
            sigma: 1.0,
            log_likelihood: -3.0,
        };
        let nan_sigma = GpdFit {
            sigma: f64::NAN,
            ..good
        };
        assert!(good.beats(None));
        assert!(!nan_sigma.beats(None));
        assert!(!good.beats(Some(&GpdFit {
            log_likelihood: -1.0,
            ..good
        })));
    }
}
