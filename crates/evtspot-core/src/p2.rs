#![forbid(unsafe_code)]

//! P² single-pass quantile estimator (Jain & Chlamtac, 1985).
//!
//! Five markers track the minimum, the `p/2`, `p` and `(1+p)/2` quantiles and
//! the maximum. Marker heights `q`, actual positions `n`, desired positions
//! `np` and desired increments `dn` start at
//!
//! ```text
//! n  = {0, 1, 2, 3, 4}
//! np = {0, 2p, 4p, 2 + 2p, 4}
//! dn = {0, p/2, p, (1 + p)/2, 1}
//! ```
//!
//! After each sample, an interior marker whose desired position drifted by at
//! least one slot moves one step using the piecewise-parabolic (P²) formula,
//! or linear interpolation when the parabola leaves `(q[i-1], q[i+1])`.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Fewer than 5 samples | `quantile()` is NaN |
//! | NaN sample | Ignored |

const MARKERS: usize = 5;

/// Streaming estimate of the `p`-quantile in O(1) memory.
#[derive(Debug, Clone)]
pub struct P2Quantile {
    p: f64,
    q: [f64; MARKERS],
    n: [f64; MARKERS],
    np: [f64; MARKERS],
    dn: [f64; MARKERS],
    count: u64,
}

impl P2Quantile {
    /// Create an estimator for probability `p` (clamped into `[0, 1]`).
    #[must_use]
    pub fn new(p: f64) -> Self {
        let p = if p.is_nan() { 0.5 } else { p.clamp(0.0, 1.0) };
        Self {
            p,
            q: [0.0; MARKERS],
            n: [0.0, 1.0, 2.0, 3.0, 4.0],
            np: [0.0, 2.0 * p, 4.0 * p, 2.0 + 2.0 * p, 4.0],
            dn: [0.0, p / 2.0, p, (1.0 + p) / 2.0, 1.0],
            count: 0,
        }
    }

    /// Target probability.
    #[inline]
    #[must_use]
    pub fn p(&self) -> f64 {
        self.p
    }

    /// Samples consumed so far (NaN samples excluded).
    #[inline]
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current estimate, NaN until five samples have been seen.
    #[inline]
    #[must_use]
    pub fn quantile(&self) -> f64 {
        if self.count < MARKERS as u64 {
            f64::NAN
        } else {
            self.q[2]
        }
    }

    /// Feed one sample.
    pub fn push(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }

        if self.count < MARKERS as u64 {
            self.q[self.count as usize] = x;
            self.count += 1;
            if self.count == MARKERS as u64 {
                self.q.sort_by(f64::total_cmp);
            }
            return;
        }
        self.count += 1;

        if x < self.q[0] {
            self.q[0] = x;
            return;
        }
        if x > self.q[4] {
            self.q[4] = x;
            return;
        }

        // q[k] <= x <= q[k + 1]
        let k = (1..MARKERS - 1)
            .rev()
            .find(|&i| self.q[i] <= x)
            .unwrap_or(0);

        for n in &mut self.n[k + 1..] {
            *n += 1.0;
        }
        for (np, dn) in self.np.iter_mut().zip(self.dn) {
            *np += dn;
        }

        for i in 1..MARKERS - 1 {
            let d = self.np[i] - self.n[i];
            let room_right = self.n[i + 1] - self.n[i] > 1.0;
            let room_left = self.n[i - 1] - self.n[i] < -1.0;
            if (d >= 1.0 && room_right) || (d <= -1.0 && room_left) {
                let step = d.signum();
                let mut candidate = self.parabolic(i, step);
                if !(self.q[i - 1] < candidate && candidate < self.q[i + 1]) {
                    candidate = self.linear(i, step);
                }
                self.q[i] = candidate;
                self.n[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let (q, n) = (&self.q, &self.n);
        q[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        self.q[i] + d * (self.q[j] - self.q[i]) / (self.n[j] - self.n[i])
    }
}

/// Estimate the `p`-quantile of `data` in one pass.
///
/// Returns NaN for fewer than five (non-NaN) values.
#[must_use]
pub fn p2_quantile(p: f64, data: &[f64]) -> f64 {
    let mut estimator = P2Quantile::new(p);
    for &x in data {
        estimator.push(x);
    }
    estimator.quantile()
}
