#![forbid(unsafe_code)]

//! Runtime: streaming outlier detectors built on `evtspot-core`.
//!
//! # Key Components
//!
//! - [`Spot`] - Single-tail peaks-over-threshold detector
//! - [`DSpot`] - [`Spot`] on a drift-corrected stream
//! - [`TwoSidedSpot`] - Upper and lower detectors driven together
//! - [`TwoSidedDSpot`] - [`TwoSidedSpot`] on a drift-corrected stream
//! - [`merge_biased`] - Assemble a two-sided detector from two sources
//! - [`SpotConfig`] / [`DSpotConfig`] - Parameters, presets and validation
//! - [`SpotStatus`] / [`StepEvidence`] - Snapshots and JSONL evidence
//!
//! # Logging
//!
//! Every detector emits `tracing` events: `debug` for fits and refits,
//! `trace` per excess, `info` per anomaly and `warn` for rejected input.
//! Events that classify an observation carry a `spot_event` field.
//!
//! # Example
//!
//! ```
//! use evtspot_runtime::{Event, Spot, SpotConfig};
//!
//! let calibration: Vec<f64> = (0..2000).map(|i| ((i * 37) % 1000) as f64 / 1000.0).collect();
//! let mut spot = Spot::new(SpotConfig::default()).unwrap();
//! spot.fit(&calibration).unwrap();
//! assert_eq!(spot.step(0.5).unwrap(), Event::Normal);
//! assert_eq!(spot.step(100.0).unwrap(), Event::Anomaly);
//! ```

pub mod bounds;
pub mod config;
pub mod dspot;
pub mod event;
pub mod spot;
pub mod status;
pub mod two_sided;

pub use bounds::Bounds;
pub use config::{DSpotConfig, RefitPolicy, SpotConfig};
pub use dspot::{DSpot, StreamMean, TwoSidedDSpot};
pub use event::{Event, Side, StepEvidence};
pub use spot::Spot;
pub use status::SpotStatus;
pub use two_sided::{Outcome, TwoSidedSpot, merge_biased, merge_biased_in};

pub use evtspot_core::{SpotError, SpotResult};
