//! Statistical Process Control (SPC) for multivariate observations.
//!
//! # Charts
//!
//! - [`t2_chart`] — Hotelling T² chart for individual observations or rational subgroups
//! - [`univariate_charts`] — per-variable mean ± kσ charts
//!
//! # Limits and classification
//!
//! - [`control_limits`] — T² limits for phase 1, phase 2 and known parameters
//! - [`critical_limits`] — critical T² of a completed hypothesis test
//! - [`classify`], [`classify_cusum`] — in-control / out-of-control verdicts
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - Tracy, N.D., Young, J.C., Mason, R.L. (1992). "Multivariate Control
//!   Charts for Individual Observations", *Journal of Quality Technology*
//!   24(2), pp. 88-95.

mod classify;
mod limits;
mod multivariate;
mod univariate;

pub use classify::{classify, classify_cusum, Bounds, Breach, Classification, Status};
pub use limits::{control_limits, critical_limits, ControlLimits, LimitDistribution};
pub(crate) use limits::critical_region;
pub use multivariate::{t2_chart, ChartMode, ChartReference, CusumTrace, T2Chart, T2Point};
pub use univariate::{
    univariate_charts, SigmaLimits, VariableChart, VariablePoint, DEFAULT_SIGMA_MULTIPLIER,
};
