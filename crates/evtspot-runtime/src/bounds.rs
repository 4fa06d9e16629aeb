#![forbid(unsafe_code)]

//! Closed interval of normal values.

use std::fmt;

/// Alarm bounds: values strictly outside `[lower, upper]` are anomalies.
///
/// An unmonitored side is infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Lower alarm threshold.
    pub lower: f64,
    /// Upper alarm threshold.
    pub upper: f64,
}

impl Bounds {
    /// Unbounded on both sides.
    pub const UNBOUNDED: Self = Self {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    /// Create bounds from two thresholds.
    #[must_use]
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Whether `x` lies inside the bounds (inclusive).
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }

    /// `upper - lower`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Both sides shifted by `offset`.
    #[must_use]
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            lower: self.lower + offset,
            upper: self.upper + offset,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}, {:.6}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let b = Bounds::new(-1.0, 2.0);
        assert!(b.contains(-1.0));
        assert!(b.contains(2.0));
        assert!(!b.contains(2.000_001));
        assert!(!b.contains(f64::NAN));
        assert_eq!(b.width(), 3.0);
    }

    #[test]
    fn unbounded_contains_everything_finite() {
        assert!(Bounds::default().contains(1e300));
        assert!(Bounds::UNBOUNDED.contains(-1e300));
        assert_eq!(Bounds::UNBOUNDED.width(), f64::INFINITY);
    }

    #[test]
    fn shift_moves_both_sides() {
        let b = Bounds::new(-1.0, 1.0).shifted(0.5);
        assert_eq!(b, Bounds::new(-0.5, 1.5));
        assert_eq!(b.to_string(), "[-0.500000, 1.500000]");
    }
}
