//! Sample and pooled covariance estimators.
//!
//! All estimators go through [`PartialAggregate`], so an in-memory table and
//! the same rows delivered as partitions yield identical estimates.
//!
//! # Degrees of freedom
//!
//! The Bessel flag selects the divisor `d = n − 1` (corrected) or `d = n`.
//! The pooled estimate weights each group by its own `dᵢ`:
//!
//! ```text
//! S_p = (d₁·S₁ + d₂·S₂) / (d₁ + d₂) = (M₁ + M₂) / (d₁ + d₂)
//! ```
//!
//! where `Mᵢ` is the group's scatter matrix. The same `dᵢ` enter the T²→F
//! conversion in [`crate::t2`].

use nalgebra::{DMatrix, DVector};

use super::aggregate::PartialAggregate;
use crate::data::ObservationMatrix;
use crate::error::{HotellingError, Result};

/// Covariance divisor for `n` observations: `n − 1` with Bessel correction,
/// `n` without.
///
/// ```
/// use u_hotelling::covariance::divisor;
///
/// assert_eq!(divisor(6, true), 5);
/// assert_eq!(divisor(6, false), 6);
/// ```
pub fn divisor(n: usize, bessel: bool) -> usize {
    if bessel {
        n.saturating_sub(1)
    } else {
        n
    }
}

/// Column means of `x`.
pub fn mean_vector(x: &ObservationMatrix) -> DVector<f64> {
    let data = x.matrix();
    DVector::from_fn(data.ncols(), |j, _| data.column(j).mean())
}

/// Sample covariance matrix of `x` (variables in columns).
///
/// # Errors
///
/// [`HotellingError::InsufficientData`] when `x` has fewer than two rows.
///
/// # Examples
///
/// ```
/// use u_hotelling::covariance::covariance_matrix;
/// use u_hotelling::data::ObservationMatrix;
///
/// let x = ObservationMatrix::from_rows(&[[1.0, 2.0], [3.0, 6.0], [5.0, 7.0]]).unwrap();
/// let s = covariance_matrix(&x, true).unwrap();
/// assert!((s[(0, 0)] - 4.0).abs() < 1e-12);
/// assert!((s[(0, 1)] - 5.0).abs() < 1e-12);
/// ```
pub fn covariance_matrix(x: &ObservationMatrix, bessel: bool) -> Result<DMatrix<f64>> {
    PartialAggregate::from_matrix(x).covariance(bessel)
}

/// Pooled covariance of two groups.
///
/// # Errors
///
/// - [`HotellingError::DimensionMismatch`] if the groups have different variable counts
/// - [`HotellingError::InsufficientData`] if either group has fewer than two rows
pub fn pooled_covariance(
    x: &ObservationMatrix,
    y: &ObservationMatrix,
    bessel: bool,
) -> Result<DMatrix<f64>> {
    pooled_from_aggregates(
        &PartialAggregate::from_matrix(x),
        &PartialAggregate::from_matrix(y),
        bessel,
    )
}

/// Pooled covariance from two group aggregates.
pub fn pooled_from_aggregates(
    a: &PartialAggregate,
    b: &PartialAggregate,
    bessel: bool,
) -> Result<DMatrix<f64>> {
    if a.dim() != b.dim() {
        return Err(HotellingError::DimensionMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    for group in [a, b] {
        if group.count() < 2 {
            return Err(HotellingError::InsufficientData {
                needed: 2,
                actual: group.count(),
            });
        }
    }
    let df = (divisor(a.count(), bessel) + divisor(b.count(), bessel)) as f64;
    let s = (a.scatter() + b.scatter()) / df;
    Ok((&s + s.transpose()) * 0.5)
}

/// Indices of variables whose variance is exactly zero.
pub fn zero_variance_columns(cov: &DMatrix<f64>) -> Vec<usize> {
    (0..cov.nrows()).filter(|&j| cov[(j, j)] == 0.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_a() -> ObservationMatrix {
        ObservationMatrix::from_rows(&[
            [23.0, 45.0, 15.0],
            [40.0, 85.0, 18.0],
            [215.0, 307.0, 60.0],
            [110.0, 110.0, 50.0],
            [65.0, 105.0, 24.0],
        ])
        .expect("valid table")
    }

    fn group_b() -> ObservationMatrix {
        ObservationMatrix::from_rows(&[
            [277.0, 230.0, 63.0],
            [153.0, 80.0, 29.0],
            [306.0, 440.0, 105.0],
            [252.0, 350.0, 175.0],
            [143.0, 205.0, 42.0],
        ])
        .expect("valid table")
    }

    #[test]
    fn test_mean_vector() {
        let m = mean_vector(&group_a());
        assert!((m[0] - 90.6).abs() < 1e-10);
        assert!((m[1] - 130.4).abs() < 1e-10);
        assert!((m[2] - 33.4).abs() < 1e-10);
    }

    #[test]
    fn test_bessel_divisor_scales_covariance() {
        let x = group_a();
        let corrected = covariance_matrix(&x, true).expect("5 rows");
        let biased = covariance_matrix(&x, false).expect("5 rows");
        // S_biased = S · (n − 1) / n
        assert!((&corrected * (4.0 / 5.0) - biased).norm() < 1e-9);
        assert!((corrected[(0, 0)] - 5909.3).abs() < 1e-8);
    }

    #[test]
    fn test_covariance_is_symmetric() {
        let s = covariance_matrix(&group_b(), true).expect("5 rows");
        assert_eq!(s, s.transpose());
    }

    #[test]
    fn test_single_row_is_insufficient() {
        let x = ObservationMatrix::from_rows(&[[1.0, 2.0]]).expect("valid table");
        assert!(matches!(
            covariance_matrix(&x, true),
            Err(HotellingError::InsufficientData { needed: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_pooled_equal_sizes_is_average() {
        let a = group_a();
        let b = group_b();
        let sa = covariance_matrix(&a, true).expect("5 rows");
        let sb = covariance_matrix(&b, true).expect("5 rows");
        let sp = pooled_covariance(&a, &b, true).expect("same dims");
        assert!(((sa + sb) * 0.5 - sp).norm() < 1e-8);
    }

    #[test]
    fn test_pooled_identical_groups_equals_single() {
        let a = group_a();
        for bessel in [true, false] {
            let single = covariance_matrix(&a, bessel).expect("5 rows");
            let pooled = pooled_covariance(&a, &a, bessel).expect("same dims");
            assert!((single - pooled).norm() < 1e-8, "bessel = {bessel}");
        }
    }

    #[test]
    fn test_pooled_weights_by_degrees_of_freedom() {
        let a = group_a();
        let b = group_b().slice_rows(0, 3).expect("3 rows");
        let sa = covariance_matrix(&a, true).expect("5 rows");
        let sb = covariance_matrix(&b, true).expect("3 rows");
        let expected = (sa * 4.0 + sb * 2.0) / 6.0;
        let sp = pooled_covariance(&a, &b, true).expect("same dims");
        assert!((expected - sp).norm() < 1e-8);
    }

    #[test]
    fn test_pooled_dimension_mismatch() {
        let x = ObservationMatrix::from_rows(&[[1.0, 2.0], [2.0, 3.0]]).expect("valid table");
        assert_eq!(
            pooled_covariance(&group_a(), &x, true),
            Err(HotellingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_zero_variance_columns() {
        let x = ObservationMatrix::from_rows(&[[1.0, 5.0], [2.0, 5.0], [4.0, 5.0]])
            .expect("valid table");
        let s = covariance_matrix(&x, true).expect("3 rows");
        assert_eq!(zero_variance_columns(&s), vec![1]);
    }
}
