//! Error taxonomy.
//!
//! Every fallible entry point returns [`Result`]. Errors raised while
//! computing a single group are reported for that group only (see
//! [`crate::batch`]); configuration errors are raised before any
//! computation starts.

use thiserror::Error;

/// Errors produced by the statistical engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HotellingError {
    /// A group has too few observations for the requested estimate.
    #[error("insufficient data: need at least {needed} observations, got {actual}")]
    InsufficientData { needed: usize, actual: usize },

    /// The covariance matrix cannot be inverted within tolerance.
    #[error("cannot compute T²: covariance is singular ({reason})")]
    SingularMatrix { reason: String },

    /// Groups, rows or the reference vector disagree on the variable count.
    #[error("dimension mismatch: expected {expected} variables, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The observation table contains NaN or infinite values.
    #[error("non-finite value at row {row}, column {column}")]
    NonFiniteData { row: usize, column: usize },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HotellingError>;

impl HotellingError {
    pub(crate) fn singular(reason: impl Into<String>) -> Self {
        Self::SingularMatrix {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let e = HotellingError::InsufficientData {
            needed: 2,
            actual: 1,
        };
        assert_eq!(
            e.to_string(),
            "insufficient data: need at least 2 observations, got 1"
        );

        let e = HotellingError::singular("rank 1 < 2");
        assert!(e.to_string().contains("covariance is singular"));
        assert!(e.to_string().contains("rank 1 < 2"));
    }

    #[test]
    fn test_errors_compare_by_value() {
        assert_eq!(
            HotellingError::config("alpha"),
            HotellingError::InvalidConfiguration("alpha".to_string())
        );
        assert_ne!(
            HotellingError::DimensionMismatch {
                expected: 3,
                actual: 2
            },
            HotellingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }
}
