//! Shift detection on monitored series.
//!
//! # Trackers
//!
//! - [`CusumParams`] — tabular CUSUM (Page, 1954) for detecting small persistent shifts
//! - [`MultiCusum`] — one CUSUM per dimension of a multivariate series
//!
//! State is caller-owned: every update takes a [`CusumState`] and returns
//! the next one.
//!
//! # References
//!
//! - Page, E.S. (1954). "Continuous Inspection Schemes",
//!   *Biometrika* 41(1/2), pp. 100-115.

mod cusum;

pub use cusum::{
    average_run_length, decision_interval, CusumParams, CusumState, CusumStep, MultiCusum,
};
