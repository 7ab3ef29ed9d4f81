//! Observation matrices: rows of measurements over named variables.
//!
//! The engine consumes an already-parsed table. Construction checks the
//! table's shape and that every value is finite, so the estimators never
//! have to.
//!
//! # Examples
//!
//! ```
//! use u_hotelling::data::ObservationMatrix;
//!
//! let x = ObservationMatrix::from_columns(
//!     &["width", "height"],
//!     &[&[1.0, 2.0, 3.0], &[2.0, 4.1, 5.9]],
//! ).unwrap();
//! assert_eq!(x.n_rows(), 3);
//! assert_eq!(x.n_vars(), 2);
//! assert_eq!(x.column_names()[1], "height");
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{HotellingError, Result};

/// A table of `n_rows` observations over `n_vars` fixed-identity variables.
///
/// # Invariants
///
/// - Every row has `n_vars` values, `n_vars >= 1`, `n_rows >= 1`
/// - All values are finite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationMatrix {
    names: Vec<String>,
    data: DMatrix<f64>,
}

impl ObservationMatrix {
    /// Builds a matrix from row slices. Variables are named `x0`, `x1`, ...
    ///
    /// # Errors
    ///
    /// - [`HotellingError::InsufficientData`] for an empty table
    /// - [`HotellingError::DimensionMismatch`] for ragged rows
    /// - [`HotellingError::NonFiniteData`] for NaN or infinite values
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let first = rows.first().ok_or(HotellingError::InsufficientData {
            needed: 1,
            actual: 0,
        })?;
        let p = first.as_ref().len();
        if p == 0 {
            return Err(HotellingError::config("observation table has no variables"));
        }
        for row in rows {
            let row = row.as_ref();
            if row.len() != p {
                return Err(HotellingError::DimensionMismatch {
                    expected: p,
                    actual: row.len(),
                });
            }
        }
        let data = DMatrix::from_fn(rows.len(), p, |i, j| rows[i].as_ref()[j]);
        Self::from_matrix(data)
    }

    /// Builds a matrix from named columns of equal length.
    pub fn from_columns(names: &[&str], columns: &[&[f64]]) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(HotellingError::DimensionMismatch {
                expected: columns.len(),
                actual: names.len(),
            });
        }
        let first = columns
            .first()
            .ok_or_else(|| HotellingError::config("observation table has no variables"))?;
        let n = first.len();
        if n == 0 {
            return Err(HotellingError::InsufficientData {
                needed: 1,
                actual: 0,
            });
        }
        if let Some(bad) = columns.iter().find(|c| c.len() != n) {
            return Err(HotellingError::DimensionMismatch {
                expected: n,
                actual: bad.len(),
            });
        }
        let data = DMatrix::from_fn(n, columns.len(), |i, j| columns[j][i]);
        Self::from_matrix(data)?.with_names(names)
    }

    /// Wraps an `n × p` matrix (rows are observations).
    pub fn from_matrix(data: DMatrix<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(HotellingError::InsufficientData {
                needed: 1,
                actual: 0,
            });
        }
        if data.ncols() == 0 {
            return Err(HotellingError::config("observation table has no variables"));
        }
        for j in 0..data.ncols() {
            for i in 0..data.nrows() {
                if !data[(i, j)].is_finite() {
                    return Err(HotellingError::NonFiniteData { row: i, column: j });
                }
            }
        }
        let names = (0..data.ncols()).map(|j| format!("x{j}")).collect();
        Ok(Self { names, data })
    }

    /// Replaces the variable names.
    pub fn with_names(mut self, names: &[&str]) -> Result<Self> {
        if names.len() != self.n_vars() {
            return Err(HotellingError::DimensionMismatch {
                expected: self.n_vars(),
                actual: names.len(),
            });
        }
        self.names = names.iter().map(|s| s.to_string()).collect();
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_vars(&self) -> usize {
        self.data.ncols()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// The underlying `n × p` matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Row `i` as a column vector.
    pub fn row(&self, i: usize) -> DVector<f64> {
        self.data.row(i).transpose()
    }

    /// Values of variable `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.data.column(j).iter().copied().collect()
    }

    /// Consecutive rows `start..start + len` as a new matrix.
    pub fn slice_rows(&self, start: usize, len: usize) -> Result<Self> {
        if len == 0 || start + len > self.n_rows() {
            return Err(HotellingError::InsufficientData {
                needed: start + len.max(1),
                actual: self.n_rows(),
            });
        }
        Ok(Self {
            names: self.names.clone(),
            data: self.data.rows(start, len).into_owned(),
        })
    }

    /// Splits the rows into consecutive subgroups of `size`.
    ///
    /// Returns the subgroups and the number of trailing rows that did not
    /// fill a complete subgroup.
    pub fn batches(&self, size: usize) -> Result<(Vec<Self>, usize)> {
        if size == 0 {
            return Err(HotellingError::config("batch size must be positive"));
        }
        let count = self.n_rows() / size;
        let groups = (0..count)
            .map(|b| self.slice_rows(b * size, size))
            .collect::<Result<Vec<_>>>()?;
        Ok((groups, self.n_rows() - count * size))
    }

    /// Splits the rows into at most `parts` near-equal partitions, as an
    /// out-of-core source would deliver them.
    pub fn partitions(&self, parts: usize) -> Vec<Self> {
        let parts = parts.clamp(1, self.n_rows());
        let base = self.n_rows() / parts;
        let extra = self.n_rows() % parts;
        let mut out = Vec::with_capacity(parts);
        let mut start = 0;
        for i in 0..parts {
            let len = base + usize::from(i < extra);
            out.push(Self {
                names: self.names.clone(),
                data: self.data.rows(start, len).into_owned(),
            });
            start += len;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_shape() {
        let x = ObservationMatrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])
            .expect("valid table");
        assert_eq!(x.n_rows(), 3);
        assert_eq!(x.n_vars(), 2);
        assert_eq!(x.column_names(), &["x0".to_string(), "x1".to_string()]);
        assert_eq!(x.column(1), vec![2.0, 4.0, 6.0]);
        assert!((x.row(2)[0] - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert_eq!(
            ObservationMatrix::from_rows(&rows),
            Err(HotellingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(matches!(
            ObservationMatrix::from_rows(&empty),
            Err(HotellingError::InsufficientData { .. })
        ));
        assert_eq!(
            ObservationMatrix::from_rows(&[[1.0, f64::NAN]]),
            Err(HotellingError::NonFiniteData { row: 0, column: 1 })
        );
    }

    #[test]
    fn test_from_columns_checks_lengths() {
        assert!(ObservationMatrix::from_columns(&["a", "b"], &[&[1.0, 2.0], &[1.0]]).is_err());
        assert!(ObservationMatrix::from_columns(&["a"], &[&[1.0], &[2.0]]).is_err());
    }

    #[test]
    fn test_batches_report_leftover() {
        let rows: Vec<[f64; 2]> = (0..7).map(|i| [i as f64, 1.0]).collect();
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        let (groups, dropped) = x.batches(3).expect("valid size");
        assert_eq!(groups.len(), 2);
        assert_eq!(dropped, 1);
        assert!((groups[1].matrix()[(0, 0)] - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partitions_cover_all_rows() {
        let rows: Vec<[f64; 1]> = (0..10).map(|i| [i as f64]).collect();
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        let parts = x.partitions(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(|p| p.n_rows()).sum::<usize>(), 10);
        assert_eq!(x.partitions(50).len(), 10);
    }
}
