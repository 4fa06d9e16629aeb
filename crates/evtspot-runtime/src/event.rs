#![forbid(unsafe_code)]

//! Step outcomes and per-step evidence.

use std::fmt;

/// Classification of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// Inside the excess threshold.
    #[default]
    Normal,
    /// Between the excess and anomaly thresholds; learned by the tail model.
    Excess,
    /// Beyond the anomaly threshold; kept out of the model.
    Anomaly,
}

impl Event {
    /// Stable string representation for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Excess => "excess",
            Self::Anomaly => "anomaly",
        }
    }

    /// Numeric code (`0` normal, `1` excess, `2` anomaly).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Excess => 1,
            Self::Anomaly => 2,
        }
    }

    /// Whether the observation should be withheld from any model.
    #[must_use]
    pub const fn is_alert(self) -> bool {
        matches!(self, Self::Anomaly)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tail a two-sided decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    /// Values above the upper thresholds.
    Upper,
    /// Values below the lower thresholds.
    Lower,
}

impl Side {
    /// Stable string representation for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Evidence
// =============================================================================

/// Snapshot of one `step` decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvidence {
    /// Value presented to the detector (after drift removal for DSPOT).
    pub observation: f64,
    /// Decision.
    pub event: Event,
    /// Signed distance past the excess threshold (positive means beyond).
    pub excess: f64,
    /// Excess threshold at decision time.
    pub excess_threshold: f64,
    /// Anomaly threshold after the step.
    pub anomaly_threshold: f64,
    /// Tail shape after the step.
    pub gamma: f64,
    /// Tail scale after the step.
    pub sigma: f64,
    /// Whether the step re-fitted the tail.
    pub refitted: bool,
    /// Normal observations counted so far.
    pub n: u64,
    /// Excesses counted so far.
    pub nt: u64,
}

impl StepEvidence {
    /// Generate JSONL representation for logging.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.to_jsonl_with(SCHEMA_SPOT, None)
    }

    pub(crate) fn to_jsonl_with(&self, schema: &str, drift: Option<f64>) -> String {
        let drift = drift
            .map(|d| format!(r#","drift":{}"#, JsonNumber(d)))
            .unwrap_or_default();
        format!(
            r#"{{"schema_version":"{}","event":"{}","x":{},"excess":{},"t":{},"z":{},"gamma":{},"sigma":{},"refit":{},"n":{},"nt":{}{}}}"#,
            schema,
            self.event.as_str(),
            JsonNumber(self.observation),
            JsonNumber(self.excess),
            JsonNumber(self.excess_threshold),
            JsonNumber(self.anomaly_threshold),
            JsonNumber(self.gamma),
            JsonNumber(self.sigma),
            self.refitted,
            self.n,
            self.nt,
            drift,
        )
    }
}

/// JSON number with six decimals; `null` for NaN and infinities.
pub(crate) struct JsonNumber(pub(crate) f64);

impl fmt::Display for JsonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() {
            write!(f, "{:.6}", self.0)
        } else {
            f.write_str("null")
        }
    }
}

pub(crate) const SCHEMA_SPOT: &str = "spot-v1";
pub(crate) const SCHEMA_DSPOT: &str = "dspot-v1";

impl fmt::Display for StepEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SPOT Evidence:")?;
        writeln!(f, "  Event: {} (x = {:.6})", self.event, self.observation)?;
        writeln!(
            f,
            "  Thresholds: excess={:.6}, anomaly={:.6}",
            self.excess_threshold, self.anomaly_threshold
        )?;
        writeln!(f, "  Tail: gamma={:.6}, sigma={:.6}", self.gamma, self.sigma)?;
        write!(f, "  Counts: n={}, nt={}", self.n, self.nt)
    }
}
