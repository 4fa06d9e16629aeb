#![forbid(unsafe_code)]

//! evtspot public facade crate.
//!
//! Streaming outlier detection with extreme value theory: fit a
//! generalized Pareto tail to the exceedances of a calibration batch, then
//! classify each new observation as normal, excess or anomaly while the
//! tail keeps learning.
//!
//! This crate re-exports the detector surface from `evtspot-runtime` and
//! the numerical primitives from `evtspot-core`, and offers a prelude for
//! day-to-day usage.
//!
//! ```
//! use evtspot::prelude::*;
//!
//! let calibration: Vec<f64> = (0..2000).map(|i| ((i * 37) % 1000) as f64 / 1000.0).collect();
//! let mut detector = TwoSidedSpot::new(SpotConfig::default()).unwrap();
//! detector.fit(&calibration).unwrap();
//!
//! let outcome = detector.step(-50.0).unwrap();
//! assert_eq!(outcome.event, Event::Anomaly);
//! assert_eq!(outcome.side, Some(Side::Lower));
//! ```

// --- Detector re-exports ---------------------------------------------------

pub use evtspot_runtime::{
    Bounds, DSpot, DSpotConfig, Event, Outcome, RefitPolicy, Side, Spot, SpotConfig, SpotStatus,
    StepEvidence, StreamMean, TwoSidedDSpot, TwoSidedSpot, merge_biased, merge_biased_in,
};

// --- Primitive re-exports --------------------------------------------------

pub use evtspot_core::{
    BudgetAllocator, BufferAllocator, Estimator, P2Quantile, Peaks, RingBuffer, SystemAllocator,
    Tail, find_root, p2_quantile,
};

// --- Errors ---------------------------------------------------------------

pub use evtspot_core::{SpotError, SpotResult};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Bounds, DSpot, DSpotConfig, Event, Outcome, RefitPolicy, Side, Spot, SpotConfig,
        SpotError, SpotResult, SpotStatus, TwoSidedDSpot, TwoSidedSpot,
    };

    pub use crate::{core, runtime};
}

pub use evtspot_core as core;
pub use evtspot_runtime as runtime;
