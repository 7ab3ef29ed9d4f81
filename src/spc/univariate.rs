//! Per-variable Shewhart charts.
//!
//! Each column gets its own mean ± k·σ limits estimated from the column,
//! and every observation beyond them is flagged. This complements the
//! multivariate chart by showing which variable moved.
//!
//! # Reference
//!
//! Shewhart, W.A. (1931). *Economic Control of Quality of Manufactured
//! Product*, Van Nostrand.

use serde::{Deserialize, Serialize};

use super::classify::{classify, Bounds, Classification};
use crate::covariance::divisor;
use crate::data::ObservationMatrix;
use crate::error::{HotellingError, Result};
use crate::special::normal_two_sided_tail;

/// Default limit width in standard deviations.
pub const DEFAULT_SIGMA_MULTIPLIER: f64 = 3.0;

/// Symmetric limits at `cl ± k·σ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaLimits {
    pub ucl: f64,
    pub cl: f64,
    pub lcl: f64,
    /// Width multiplier `k`.
    pub multiplier: f64,
}

impl SigmaLimits {
    pub fn new(mean: f64, sigma: f64, multiplier: f64) -> Self {
        Self {
            ucl: mean + multiplier * sigma,
            cl: mean,
            lcl: mean - multiplier * sigma,
            multiplier,
        }
    }

    /// Two-sided false-alarm probability of the limits for normal data.
    pub fn nominal_alpha(&self) -> f64 {
        normal_two_sided_tail(self.multiplier)
    }
}

impl Bounds for SigmaLimits {
    fn upper(&self) -> f64 {
        self.ucl
    }

    fn lower(&self) -> Option<f64> {
        Some(self.lcl)
    }
}

/// A single observation on a variable chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablePoint {
    pub index: usize,
    pub value: f64,
    pub classification: Classification,
    pub out_of_control: bool,
}

/// Chart of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableChart {
    pub name: String,
    pub column: usize,
    pub mean: f64,
    pub sigma: f64,
    pub limits: SigmaLimits,
    pub points: Vec<VariablePoint>,
}

impl VariableChart {
    /// Indices of out-of-control observations.
    pub fn out_of_control(&self) -> Vec<usize> {
        self.points
            .iter()
            .filter(|p| p.out_of_control)
            .map(|p| p.index)
            .collect()
    }
}

/// Builds one mean ± `multiplier`·σ chart per column of `data`.
///
/// σ is the sample standard deviation with divisor n − 1 (`bessel`) or n.
///
/// # Errors
///
/// - [`HotellingError::InvalidConfiguration`] if `multiplier` is not positive and finite
/// - [`HotellingError::InsufficientData`] if `data` has fewer than two rows
///
/// # Examples
///
/// ```
/// use u_hotelling::data::ObservationMatrix;
/// use u_hotelling::spc::{univariate_charts, DEFAULT_SIGMA_MULTIPLIER};
///
/// let mut rows: Vec<[f64; 2]> = (0..30).map(|i| [(i % 3) as f64, (i % 5) as f64]).collect();
/// rows.push([1.0, 40.0]);
/// let x = ObservationMatrix::from_rows(&rows).unwrap();
/// let charts = univariate_charts(&x, DEFAULT_SIGMA_MULTIPLIER, true).unwrap();
/// assert!(charts[0].out_of_control().is_empty());
/// assert_eq!(charts[1].out_of_control(), vec![30]);
/// ```
pub fn univariate_charts(
    data: &ObservationMatrix,
    multiplier: f64,
    bessel: bool,
) -> Result<Vec<VariableChart>> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(HotellingError::config(format!(
            "sigma multiplier must be positive and finite, got {multiplier}"
        )));
    }
    let n = data.n_rows();
    if n < 2 {
        return Err(HotellingError::InsufficientData {
            needed: 2,
            actual: n,
        });
    }
    let d = divisor(n, bessel) as f64;

    let charts: Vec<VariableChart> = data
        .column_names()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values = data.column(j);
            let mean = values.iter().sum::<f64>() / n as f64;
            let sigma = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / d).sqrt();
            let limits = SigmaLimits::new(mean, sigma, multiplier);
            let points = values
                .iter()
                .enumerate()
                .map(|(index, &value)| {
                    let classification = classify(value, &limits);
                    VariablePoint {
                        index,
                        value,
                        classification,
                        out_of_control: classification.is_out_of_control(),
                    }
                })
                .collect();
            VariableChart {
                name: name.clone(),
                column: j,
                mean,
                sigma,
                limits,
                points,
            }
        })
        .collect();

    log::debug!(
        "univariate charts: {} variables at ±{multiplier}σ (nominal α = {:.4})",
        charts.len(),
        normal_two_sided_tail(multiplier)
    );
    Ok(charts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spc::classify::Breach;

    #[test]
    fn test_limits_from_column_statistics() {
        let x = ObservationMatrix::from_columns(&["a"], &[&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]])
            .expect("valid table");
        let charts = univariate_charts(&x, 3.0, false).expect("8 rows");
        let c = &charts[0];
        assert_eq!(c.name, "a");
        assert!((c.mean - 5.0).abs() < 1e-12);
        // population σ = 2
        assert!((c.sigma - 2.0).abs() < 1e-12);
        assert!((c.limits.ucl - 11.0).abs() < 1e-12);
        assert!((c.limits.lcl + 1.0).abs() < 1e-12);
        assert!(c.out_of_control().is_empty());
    }

    #[test]
    fn test_flags_both_sides() {
        let mut values = vec![10.0; 40];
        for (i, v) in values.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.5 } else { -0.5 };
        }
        values[5] = 20.0;
        values[30] = 0.0;
        let x = ObservationMatrix::from_columns(&["v"], &[&values]).expect("valid table");
        let chart = &univariate_charts(&x, DEFAULT_SIGMA_MULTIPLIER, true).expect("40 rows")[0];
        assert_eq!(chart.out_of_control(), vec![5, 30]);
        assert_eq!(chart.points[5].classification.breach, Some(Breach::AboveUpper));
        assert_eq!(chart.points[30].classification.breach, Some(Breach::BelowLower));
    }

    #[test]
    fn test_constant_column_flags_nothing() {
        let x = ObservationMatrix::from_columns(&["c"], &[&[3.0; 6]]).expect("valid table");
        let chart = &univariate_charts(&x, 3.0, true).expect("6 rows")[0];
        assert_eq!(chart.sigma, 0.0);
        assert!(chart.out_of_control().is_empty());
    }

    #[test]
    fn test_nominal_alpha_three_sigma() {
        let limits = SigmaLimits::new(0.0, 1.0, 3.0);
        assert!((limits.nominal_alpha() - 0.0027).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_arguments() {
        let x = ObservationMatrix::from_rows(&[[1.0], [2.0]]).expect("valid table");
        assert!(univariate_charts(&x, 0.0, true).is_err());
        assert!(univariate_charts(&x, f64::NAN, true).is_err());
        let one = ObservationMatrix::from_rows(&[[1.0]]).expect("valid table");
        assert!(matches!(
            univariate_charts(&one, 3.0, true),
            Err(HotellingError::InsufficientData { .. })
        ));
    }
}
