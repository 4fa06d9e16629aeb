#![forbid(unsafe_code)]

//! Read-only snapshot of a detector.

use std::fmt;

use crate::event::JsonNumber;

/// Counters, thresholds and tail parameters at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpotStatus {
    /// Normal observations (fit batch plus accepted steps).
    pub n: u64,
    /// Excesses among them.
    pub nt: u64,
    /// Anomalies reported and discarded.
    pub anomalies: u64,
    /// Excesses currently retained by the tail model.
    pub excesses: usize,
    /// Excess threshold `t`.
    pub excess_threshold: f64,
    /// Anomaly threshold `z_q`.
    pub anomaly_threshold: f64,
    /// Tail shape.
    pub gamma: f64,
    /// Tail scale.
    pub sigma: f64,
    /// Drift removed from observations (0 without drift tracking).
    pub drift: f64,
}

impl SpotStatus {
    /// Empirical probability of an excess (`nt / n`).
    #[must_use]
    pub fn excess_rate(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.nt as f64 / self.n as f64
        }
    }

    /// Generate JSONL representation for logging.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        format!(
            r#"{{"schema_version":"spot-status-v1","n":{},"nt":{},"anomalies":{},"excesses":{},"t":{},"z":{},"gamma":{},"sigma":{},"drift":{}}}"#,
            self.n,
            self.nt,
            self.anomalies,
            self.excesses,
            JsonNumber(self.excess_threshold),
            JsonNumber(self.anomaly_threshold),
            JsonNumber(self.gamma),
            JsonNumber(self.sigma),
            JsonNumber(self.drift),
        )
    }
}

impl fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>10} {:>10} {:>10} {:>12} {:>12}", "n", "nt", "anomalies", "excesses", "t", "z")?;
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10} {:>12.6} {:>12.6}",
            self.n,
            self.nt,
            self.anomalies,
            self.excesses,
            self.excess_threshold,
            self.anomaly_threshold
        )?;
        write!(
            f,
            "tail: gamma={:.6} sigma={:.6} drift={:.6}",
            self.gamma, self.sigma, self.drift
        )
    }
}
