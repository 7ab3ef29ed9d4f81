//! Combinable partial aggregates for partitioned data.
//!
//! A [`PartialAggregate`] summarizes any subset of rows by its count, mean
//! vector, and centered cross-product (scatter) matrix. Two aggregates merge
//! with Chan's pairwise update, so partitions may be reduced in any order
//! and grouping and still reproduce the mean and covariance of the full
//! table. Raw sums and cross-products are available for exchange with
//! engines that work in those terms.
//!
//! # Algorithm
//!
//! ```text
//! n_AB = n_A + n_B
//! δ    = μ_B − μ_A
//! μ_AB = (n_A·μ_A + n_B·μ_B) / n_AB
//! M_AB = M_A + M_B + (n_A·n_B / n_AB)·δ·δᵀ
//! ```

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::estimator::divisor;
use crate::data::ObservationMatrix;
use crate::error::{HotellingError, Result};

/// Count, mean and scatter of a set of `p`-variate observations.
///
/// # Examples
///
/// ```
/// use u_hotelling::covariance::{covariance_matrix, PartialAggregate};
/// use u_hotelling::data::ObservationMatrix;
///
/// let x = ObservationMatrix::from_rows(&[[1.0, 2.0], [2.0, 1.0], [4.0, 5.0], [3.0, 3.0]]).unwrap();
/// let parts = x.partitions(2);
/// let merged = PartialAggregate::from_matrix(&parts[0])
///     .merge(&PartialAggregate::from_matrix(&parts[1]))
///     .unwrap();
/// let direct = covariance_matrix(&x, true).unwrap();
/// assert!((merged.covariance(true).unwrap() - direct).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialAggregate {
    count: usize,
    mean: DVector<f64>,
    scatter: DMatrix<f64>,
}

impl PartialAggregate {
    /// The empty aggregate over `p` variables (identity for [`merge`](Self::merge)).
    pub fn new(p: usize) -> Self {
        Self {
            count: 0,
            mean: DVector::zeros(p),
            scatter: DMatrix::zeros(p, p),
        }
    }

    /// Summarizes every row of `x` (two-pass: mean, then centered products).
    pub fn from_matrix(x: &ObservationMatrix) -> Self {
        let data = x.matrix();
        let p = data.ncols();
        let mean = DVector::from_fn(p, |j, _| data.column(j).mean());
        let mut centered = data.clone();
        for j in 0..p {
            centered.column_mut(j).add_scalar_mut(-mean[j]);
        }
        let scatter = centered.tr_mul(&centered);
        Self {
            count: data.nrows(),
            mean,
            scatter,
        }
    }

    /// Rebuilds an aggregate from raw totals: Σx and Σxxᵀ over `count` rows.
    pub fn from_sums(count: usize, sum: DVector<f64>, cross_products: DMatrix<f64>) -> Result<Self> {
        let p = sum.len();
        if cross_products.shape() != (p, p) {
            return Err(HotellingError::DimensionMismatch {
                expected: p,
                actual: cross_products.nrows(),
            });
        }
        if count == 0 {
            return Ok(Self::new(p));
        }
        let n = count as f64;
        let mean = &sum / n;
        let scatter = cross_products - (&sum * sum.transpose()) / n;
        Ok(Self {
            count,
            mean,
            scatter,
        })
    }

    /// Reduces partitions in parallel.
    ///
    /// # Errors
    ///
    /// [`HotellingError::DimensionMismatch`] if the partitions disagree on
    /// the variable count; [`HotellingError::InsufficientData`] if there
    /// are no partitions.
    pub fn from_partitions(parts: &[ObservationMatrix]) -> Result<Self> {
        let p = parts
            .first()
            .map(|x| x.n_vars())
            .ok_or(HotellingError::InsufficientData {
                needed: 1,
                actual: 0,
            })?;
        parts
            .par_iter()
            .map(|x| Ok(Self::from_matrix(x)))
            .try_reduce(|| Self::new(p), |a, b| a.merge(&b))
    }

    /// Adds one observation (Welford update).
    pub fn push(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.dim() {
            return Err(HotellingError::DimensionMismatch {
                expected: self.dim(),
                actual: row.len(),
            });
        }
        let x = DVector::from_column_slice(row);
        self.count += 1;
        let delta = &x - &self.mean;
        self.mean += &delta / self.count as f64;
        let delta_after = &x - &self.mean;
        self.scatter += &delta * delta_after.transpose();
        Ok(())
    }

    /// Combines two aggregates. Exactly commutative; associative up to
    /// floating-point rounding.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if other.dim() != self.dim() {
            return Err(HotellingError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        if other.count == 0 {
            return Ok(self.clone());
        }
        if self.count == 0 {
            return Ok(other.clone());
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n_ab = n_a + n_b;
        let delta = &other.mean - &self.mean;
        let mean = (&self.mean * n_a + &other.mean * n_b) / n_ab;
        let scatter = &self.scatter + &other.scatter + &delta * delta.transpose() * (n_a * n_b / n_ab);
        Ok(Self {
            count: self.count + other.count,
            mean,
            scatter,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of variables.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Centered cross-products Σ(x − μ)(x − μ)ᵀ.
    pub fn scatter(&self) -> &DMatrix<f64> {
        &self.scatter
    }

    /// Σx.
    pub fn sum(&self) -> DVector<f64> {
        &self.mean * self.count as f64
    }

    /// Raw cross-products Σxxᵀ.
    pub fn cross_products(&self) -> DMatrix<f64> {
        &self.scatter + &self.mean * self.mean.transpose() * self.count as f64
    }

    /// Sample covariance with divisor n − 1 (`bessel`) or n.
    ///
    /// # Errors
    ///
    /// [`HotellingError::InsufficientData`] when fewer than two rows were
    /// aggregated.
    pub fn covariance(&self, bessel: bool) -> Result<DMatrix<f64>> {
        if self.count < 2 {
            return Err(HotellingError::InsufficientData {
                needed: 2,
                actual: self.count,
            });
        }
        let s = &self.scatter / divisor(self.count, bessel) as f64;
        Ok((&s + s.transpose()) * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ObservationMatrix {
        ObservationMatrix::from_rows(&[
            [3.7, 48.5, 9.3],
            [5.7, 65.1, 8.0],
            [3.8, 47.2, 10.9],
            [3.2, 53.2, 12.0],
            [3.1, 55.5, 9.7],
            [4.6, 36.1, 7.9],
            [2.4, 24.8, 14.0],
        ])
        .expect("valid table")
    }

    #[test]
    fn test_push_matches_two_pass() {
        let x = table();
        let mut online = PartialAggregate::new(3);
        for i in 0..x.n_rows() {
            let row: Vec<f64> = x.row(i).iter().copied().collect();
            online.push(&row).expect("matching dimension");
        }
        let batch = PartialAggregate::from_matrix(&x);
        assert_eq!(online.count(), batch.count());
        assert!((online.mean() - batch.mean()).norm() < 1e-12);
        assert!((online.scatter() - batch.scatter()).norm() < 1e-9);
    }

    #[test]
    fn test_merge_is_commutative() {
        let parts = table().partitions(2);
        let a = PartialAggregate::from_matrix(&parts[0]);
        let b = PartialAggregate::from_matrix(&parts[1]);
        assert_eq!(a.merge(&b).expect("merge"), b.merge(&a).expect("merge"));
    }

    #[test]
    fn test_merge_identity() {
        let a = PartialAggregate::from_matrix(&table());
        let empty = PartialAggregate::new(3);
        assert_eq!(a.merge(&empty).expect("merge"), a);
        assert_eq!(empty.merge(&a).expect("merge"), a);
    }

    #[test]
    fn test_from_partitions_matches_whole() {
        let x = table();
        let whole = PartialAggregate::from_matrix(&x);
        for k in 1..=x.n_rows() {
            let merged = PartialAggregate::from_partitions(&x.partitions(k)).expect("reduce");
            assert_eq!(merged.count(), whole.count());
            assert!((merged.mean() - whole.mean()).norm() < 1e-10, "k = {k}");
            assert!((merged.scatter() - whole.scatter()).norm() < 1e-8, "k = {k}");
        }
    }

    #[test]
    fn test_raw_sums_round_trip() {
        let a = PartialAggregate::from_matrix(&table());
        let rebuilt =
            PartialAggregate::from_sums(a.count(), a.sum(), a.cross_products()).expect("rebuild");
        assert!((rebuilt.mean() - a.mean()).norm() < 1e-10);
        assert!((rebuilt.scatter() - a.scatter()).norm() < 1e-6);
    }

    #[test]
    fn test_dimension_checks() {
        let mut a = PartialAggregate::new(2);
        assert!(a.push(&[1.0, 2.0, 3.0]).is_err());
        assert!(a.merge(&PartialAggregate::new(3)).is_err());
        assert!(PartialAggregate::from_partitions(&[]).is_err());
    }

    #[test]
    fn test_covariance_needs_two_rows() {
        let mut a = PartialAggregate::new(2);
        a.push(&[1.0, 2.0]).expect("push");
        assert_eq!(
            a.covariance(true),
            Err(HotellingError::InsufficientData {
                needed: 2,
                actual: 1
            })
        );
    }
}
