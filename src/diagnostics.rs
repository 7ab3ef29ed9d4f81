//! Non-fatal numerical diagnostics.
//!
//! Conditions that do not prevent a result from being computed but that a
//! caller should know about are attached to results as [`Diagnostic`]
//! values rather than raised as errors.

use serde::{Deserialize, Serialize};

/// Condition number above which an invertible covariance is reported as
/// near-singular.
pub const NEAR_SINGULAR_CONDITION: f64 = 1e10;

/// A non-fatal warning attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The covariance was inverted but is poorly conditioned.
    NearSingular {
        /// Ratio of the largest to the smallest singular value.
        condition_number: f64,
    },
    /// A Moore–Penrose pseudo-inverse replaced the exact inverse.
    PseudoInverse {
        /// Numerical rank of the covariance.
        rank: usize,
        /// Number of variables.
        dimension: usize,
    },
    /// A variable has zero sample variance.
    ZeroVariance {
        /// Column index of the constant variable.
        column: usize,
    },
    /// Trailing rows that did not fill a complete subgroup were ignored.
    IncompleteBatch {
        /// Number of rows left out.
        dropped_rows: usize,
    },
}

impl Diagnostic {
    /// Logs the diagnostic at warning level.
    pub(crate) fn emit(&self) {
        match self {
            Diagnostic::NearSingular { condition_number } => {
                log::warn!("covariance is near-singular (condition number {condition_number:.3e})")
            }
            Diagnostic::PseudoInverse { rank, dimension } => {
                log::warn!("covariance has rank {rank} < {dimension}; using pseudo-inverse")
            }
            Diagnostic::ZeroVariance { column } => {
                log::debug!("column {column} has zero variance")
            }
            Diagnostic::IncompleteBatch { dropped_rows } => {
                log::warn!("{dropped_rows} trailing rows do not fill a subgroup and were ignored")
            }
        }
    }
}
