#![forbid(unsafe_code)]

//! Error kinds shared by every fallible entry point.
//!
//! Initialization errors leave the instance unusable. Estimator instability
//! is never reported here: the tail fit silently falls back to whichever
//! candidate converged.

use std::fmt;

/// Errors returned by detectors and their building blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpotError {
    /// Backing storage could not be obtained.
    AllocationFailed {
        /// Number of `f64` slots requested.
        requested: usize,
    },
    /// `level` is outside `[0, 1)`.
    LevelOutOfBounds {
        /// Offending level.
        level: f64,
    },
    /// `q` is outside `(0, 1 - level)`.
    QOutOfBounds {
        /// Offending tail probability.
        q: f64,
        /// Level it was validated against.
        level: f64,
    },
    /// The initial batch did not produce a usable excess threshold.
    ExcessThresholdIsNaN,
    /// The tail fit did not produce a finite anomaly threshold.
    AnomalyThresholdIsNaN,
    /// A NaN observation was presented to `step`.
    DataIsNaN,
    /// Two detectors with different configurations cannot be merged.
    IncompatibleMerge,
}

impl SpotError {
    /// Stable numeric code for logs and FFI boundaries.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::AllocationFailed { .. } => 1,
            Self::LevelOutOfBounds { .. } => 2,
            Self::QOutOfBounds { .. } => 3,
            Self::ExcessThresholdIsNaN => 4,
            Self::AnomalyThresholdIsNaN => 5,
            Self::DataIsNaN => 6,
            Self::IncompatibleMerge => 7,
        }
    }

    /// Short, parameter-free description.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "memory allocation failed",
            Self::LevelOutOfBounds { .. } => {
                "the level parameter is out of bounds (it must be between 0 and 1, but close to 1)"
            }
            Self::QOutOfBounds { .. } => "the q parameter must be between 0 and 1-level",
            Self::ExcessThresholdIsNaN => "the excess threshold has not been initialized",
            Self::AnomalyThresholdIsNaN => "the anomaly threshold has not been initialized",
            Self::DataIsNaN => "the input data is NaN",
            Self::IncompatibleMerge => "detectors do not share the same configuration",
        }
    }

    /// Whether this error came from parameter validation at construction.
    #[must_use]
    pub const fn is_init_error(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailed { .. } | Self::LevelOutOfBounds { .. } | Self::QOutOfBounds { .. }
        )
    }
}

impl fmt::Display for SpotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { requested } => {
                write!(f, "{} ({requested} slots requested)", self.message())
            }
            Self::LevelOutOfBounds { level } => write!(f, "{} (got {level})", self.message()),
            Self::QOutOfBounds { q, level } => {
                write!(f, "{} (got q={q}, level={level})", self.message())
            }
            _ => f.write_str(self.message()),
        }
    }
}

impl std::error::Error for SpotError {}

/// Result alias used across the workspace.
pub type SpotResult<T> = Result<T, SpotError>;
