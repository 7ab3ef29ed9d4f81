//! Covariance estimation.
//!
//! Sample covariance per group (with or without Bessel correction), pooled
//! covariance across two groups, and the combinable [`PartialAggregate`]
//! that lets partitioned data reproduce the in-memory estimates.
//!
//! # References
//!
//! - Chan, T.F., Golub, G.H., LeVeque, R.J. (1979). "Updating Formulae and a
//!   Pairwise Algorithm for Computing Sample Variances", Stanford CS report
//!   STAN-CS-79-773.
//! - Johnson, R.A., Wichern, D.W. (2007). *Applied Multivariate Statistical
//!   Analysis*, 6th ed., §6.3 (pooled covariance).

mod aggregate;
mod estimator;

pub use aggregate::PartialAggregate;
pub use estimator::{
    covariance_matrix, divisor, mean_vector, pooled_covariance, pooled_from_aggregates,
    zero_variance_columns,
};
