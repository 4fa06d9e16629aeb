#![forbid(unsafe_code)]

//! Core: extreme-value tail estimation primitives.
//!
//! # Key Components
//!
//! - [`RingBuffer`] - Fixed-capacity overwrite-oldest storage
//! - [`find_root`] - Brent's bracketed root search
//! - [`Peaks`] - Online statistics over the retained exceedances
//! - [`Estimator`] - Method-of-moments and Grimshaw GPD estimators
//! - [`Tail`] - Fitted GPD tail with probability/quantile formulas
//! - [`P2Quantile`] - O(1)-memory streaming quantile
//! - [`BufferAllocator`] - Injectable storage source
//!
//! # Role in evtspot
//! The detectors in `evtspot-runtime` are thin state machines over these
//! pieces; everything numerically delicate lives here.

pub mod alloc;
pub mod brent;
pub mod error;
pub mod estimator;
pub mod p2;
pub mod peaks;
pub mod ring;
pub mod tail;

pub use alloc::{BudgetAllocator, BufferAllocator, SystemAllocator};
pub use brent::{BRENT_DEFAULT_EPSILON, BRENT_ITMAX, find_root};
pub use error::{SpotError, SpotResult};
pub use estimator::{Estimator, GpdFit, grimshaw, mom};
pub use p2::{P2Quantile, p2_quantile};
pub use peaks::Peaks;
pub use ring::RingBuffer;
pub use tail::Tail;
