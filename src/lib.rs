//! # u-hotelling
//!
//! Hotelling T² hypothesis tests, multivariate control limits, and CUSUM
//! tracking.
//!
//! This crate operates on in-memory observation tables (rows × named numeric
//! columns) and returns plain structured results. It never reads files,
//! draws charts or prints; those belong to the layers built on top.
//!
//! ## Modules
//!
//! - [`t2`] — One- and two-sample Hotelling T² tests with F conversion and p-values
//! - [`covariance`] — Sample and pooled covariance, mergeable partial aggregates
//! - [`inverse`] — Covariance inversion with relative-tolerance singularity detection
//! - [`spc`] — T² control limits, T² and univariate charts, out-of-control classification
//! - [`detection`] — CUSUM tracking with caller-owned state
//! - [`batch`] — Parallel processing of independent groups with per-group errors
//! - [`special`] — F, Beta and χ² distribution functions
//! - [`config`] — Configuration shared by every entry point
//! - [`data`] — The observation table
//! - [`diagnostics`] — Non-fatal numerical warnings
//! - [`error`] — Error taxonomy
//!
//! ## Example
//!
//! ```
//! use u_hotelling::config::HotellingConfig;
//! use u_hotelling::data::ObservationMatrix;
//! use u_hotelling::spc::{classify, critical_limits};
//! use u_hotelling::t2::two_sample;
//!
//! let a = ObservationMatrix::from_rows(&[[0.9, 0.1], [-1.0, 0.2], [0.1, 1.1], [0.0, -0.9], [0.2, -0.4]]).unwrap();
//! let b = ObservationMatrix::from_rows(&[[3.9, 3.1], [2.0, 3.2], [3.1, 4.1], [3.0, 2.1], [3.2, 2.6]]).unwrap();
//! let config = HotellingConfig::default();
//! let result = two_sample(&a, &b, &config).unwrap();
//! assert!(result.out_of_control);
//!
//! // The same verdict at a stricter level.
//! let limits = critical_limits(&result, 0.001).unwrap();
//! assert_eq!(classify(result.statistic, &limits).is_out_of_control(), result.p_value < 0.001);
//! ```
//!
//! ## Design Philosophy
//!
//! - **Explicit state**: CUSUM state and partial aggregates are values owned by the caller
//! - **Numerical stability**: two-pass and pairwise-merge covariance, scale-relative rank tests
//! - **Research-backed**: All algorithms reference academic literature

pub mod batch;
pub mod config;
pub mod covariance;
pub mod data;
pub mod detection;
pub mod diagnostics;
pub mod error;
pub mod inverse;
pub mod special;
pub mod spc;
pub mod t2;

pub use error::{HotellingError, Result};
