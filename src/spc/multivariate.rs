//! Hotelling T² control charts.
//!
//! Each charted point is a quadratic distance from a reference mean in the
//! metric of a reference covariance:
//!
//! ```text
//! individual:  T²ᵢ = (xᵢ − μ)ᵀ S⁻¹ (xᵢ − μ)
//! subgroups:   T²ⱼ = n·(x̄ⱼ − μ)ᵀ S̄⁻¹ (x̄ⱼ − μ)
//! ```
//!
//! With an estimated reference, `μ` and `S` come from the charted rows
//! (grand mean and average within-subgroup covariance in batch mode). A
//! supplied reference must give both mean and covariance.
//!
//! Limits come from [`control_limits`]; the phase in the configuration
//! selects the reference distribution. A per-dimension CUSUM trace runs
//! alongside the chart whenever every variable has positive variance.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*,
//!   8th ed., §11.3.
//! - Mason, R.L., Young, J.C. (2002). *Multivariate Statistical Process
//!   Control with Industrial Applications*, SIAM.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::classify::{classify, classify_cusum, Classification};
use super::limits::{control_limits, ControlLimits};
use crate::config::HotellingConfig;
use crate::covariance::{divisor, zero_variance_columns, PartialAggregate};
use crate::data::ObservationMatrix;
use crate::detection::{CusumState, CusumStep, MultiCusum};
use crate::diagnostics::Diagnostic;
use crate::error::{HotellingError, Result};
use crate::inverse::invert;
use crate::t2::quadratic_form;

/// Reference mean and covariance for a chart.
///
/// Leave both unset to estimate them from the charted data. `size` is the
/// number of rows (or subgroups) the supplied reference was estimated from;
/// it defaults to the charted count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartReference<'a> {
    pub mean: Option<&'a [f64]>,
    pub covariance: Option<&'a DMatrix<f64>>,
    pub size: Option<usize>,
}

impl<'a> ChartReference<'a> {
    /// Estimate the reference from the charted data.
    pub fn estimated() -> Self {
        Self::default()
    }

    /// Use a caller-supplied mean and covariance.
    pub fn supplied(mean: &'a [f64], covariance: &'a DMatrix<f64>) -> Self {
        Self {
            mean: Some(mean),
            covariance: Some(covariance),
            size: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// What each chart point summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChartMode {
    Individual,
    Batch { size: usize },
}

/// A single point on a T² chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T2Point {
    /// Row index (individual) or subgroup index (batch).
    pub index: usize,
    pub statistic: f64,
    pub classification: Classification,
    pub out_of_control: bool,
}

/// Per-dimension CUSUM run over the charted points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CusumTrace {
    pub trackers: MultiCusum,
    /// One step per point, per dimension.
    pub steps: Vec<Vec<CusumStep>>,
    /// State after the last point; pass it back in to resume.
    pub state: Vec<CusumState>,
}

impl CusumTrace {
    /// Classifications of dimension `j`, one per point.
    pub fn classifications(&self, j: usize) -> Vec<Classification> {
        self.steps
            .get(j)
            .map(|steps| steps.iter().map(classify_cusum).collect())
            .unwrap_or_default()
    }

    /// Point indices where any dimension alarmed.
    pub fn alarms(&self) -> Vec<usize> {
        let len = self.steps.first().map_or(0, Vec::len);
        (0..len)
            .filter(|&i| self.steps.iter().any(|dim| dim[i].signal()))
            .collect()
    }
}

/// A computed T² chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T2Chart {
    pub mode: ChartMode,
    pub points: Vec<T2Point>,
    pub limits: ControlLimits,
    /// Reference mean the points are measured from.
    pub mean: DVector<f64>,
    /// Reference covariance (of individual observations).
    pub covariance: DMatrix<f64>,
    /// Reference size used for the limits.
    pub reference_size: usize,
    pub cusum: Option<CusumTrace>,
    pub diagnostics: Vec<Diagnostic>,
}

impl T2Chart {
    /// Indices of out-of-control points.
    pub fn out_of_control(&self) -> Vec<usize> {
        self.points
            .iter()
            .filter(|p| p.out_of_control)
            .map(|p| p.index)
            .collect()
    }

    pub fn is_in_control(&self) -> bool {
        self.points.iter().all(|p| !p.out_of_control)
    }

    pub fn statistics(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.statistic).collect()
    }
}

/// Computes a T² chart over the rows of `data`.
///
/// Individual observations are charted unless `config.batch_size` is set,
/// in which case consecutive rows form subgroups and a trailing incomplete
/// subgroup is dropped with a [`Diagnostic::IncompleteBatch`].
///
/// # Errors
///
/// - [`HotellingError::InvalidConfiguration`] if `config` is invalid or only
///   one of the reference mean and covariance is supplied
/// - [`HotellingError::DimensionMismatch`] if the reference disagrees with `data`
/// - [`HotellingError::SingularMatrix`] if the covariance cannot be inverted
/// - [`HotellingError::InsufficientData`] if there are too few rows or
///   subgroups for the limits
///
/// # Examples
///
/// ```
/// use nalgebra::DMatrix;
/// use u_hotelling::config::{HotellingConfig, LimitSide, Phase};
/// use u_hotelling::data::ObservationMatrix;
/// use u_hotelling::spc::{t2_chart, ChartReference};
///
/// let x = ObservationMatrix::from_rows(&[[0.1, -0.2], [0.3, 0.1], [-0.2, 0.0], [6.0, 6.0]]).unwrap();
/// let cov = DMatrix::identity(2, 2);
/// let config = HotellingConfig::default()
///     .with_phase(Phase::KnownParameters)
///     .with_side(LimitSide::Upper);
/// let chart = t2_chart(&x, &ChartReference::supplied(&[0.0, 0.0], &cov), &config).unwrap();
/// assert_eq!(chart.out_of_control(), vec![3]);
/// ```
pub fn t2_chart(
    data: &ObservationMatrix,
    reference: &ChartReference<'_>,
    config: &HotellingConfig,
) -> Result<T2Chart> {
    config.validate()?;
    let supplied = match (reference.mean, reference.covariance) {
        (Some(mean), Some(cov)) => {
            check_reference(data.n_vars(), mean, cov)?;
            Some((DVector::from_column_slice(mean), cov.clone()))
        }
        (None, None) => None,
        _ => {
            return Err(HotellingError::config(
                "reference mean and covariance must be supplied together",
            ))
        }
    };
    match config.batch_size {
        None => individual_chart(data, supplied, reference.size, config),
        Some(n) => batch_chart(data, n, supplied, reference.size, config),
    }
}

fn check_reference(p: usize, mean: &[f64], cov: &DMatrix<f64>) -> Result<()> {
    if mean.len() != p {
        return Err(HotellingError::DimensionMismatch {
            expected: p,
            actual: mean.len(),
        });
    }
    if cov.shape() != (p, p) {
        return Err(HotellingError::DimensionMismatch {
            expected: p,
            actual: cov.nrows(),
        });
    }
    if mean.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
        return Err(HotellingError::config("reference must be finite"));
    }
    Ok(())
}

fn individual_chart(
    data: &ObservationMatrix,
    supplied: Option<(DVector<f64>, DMatrix<f64>)>,
    size: Option<usize>,
    config: &HotellingConfig,
) -> Result<T2Chart> {
    let n = data.n_rows();
    let p = data.n_vars();
    let (mean, covariance) = match supplied {
        Some(reference) => reference,
        None => {
            let agg = PartialAggregate::from_matrix(data);
            let cov = agg.covariance(config.bessel)?;
            if n <= p {
                return Err(HotellingError::singular(format!(
                    "{n} observations cannot support {p} variables"
                )));
            }
            (agg.mean().clone(), cov)
        }
    };
    let reference_size = size.unwrap_or(n);
    let limits = control_limits(p, reference_size, config)?;

    let mut diagnostics = variance_diagnostics(&covariance);
    let inversion = invert(&covariance, config.inversion)?;
    diagnostics.extend(inversion.diagnostics);

    let statistics: Vec<f64> = (0..n)
        .map(|i| quadratic_form(&(data.row(i) - &mean), &inversion.inverse))
        .collect();
    let cusum = cusum_trace(data, &mean, &covariance, config)?;

    log::debug!(
        "T² chart: {n} observations, p = {p}, {} beyond limits",
        statistics.iter().filter(|&&t| t > limits.ucl).count()
    );

    Ok(T2Chart {
        mode: ChartMode::Individual,
        points: points(&statistics, &limits),
        limits,
        mean,
        covariance,
        reference_size,
        cusum,
        diagnostics,
    })
}

fn batch_chart(
    data: &ObservationMatrix,
    n: usize,
    supplied: Option<(DVector<f64>, DMatrix<f64>)>,
    size: Option<usize>,
    config: &HotellingConfig,
) -> Result<T2Chart> {
    let p = data.n_vars();
    let (groups, dropped) = data.batches(n)?;
    let mut diagnostics = Vec::new();
    if dropped > 0 {
        let d = Diagnostic::IncompleteBatch {
            dropped_rows: dropped,
        };
        d.emit();
        diagnostics.push(d);
    }
    if groups.is_empty() {
        return Err(HotellingError::InsufficientData {
            needed: n,
            actual: data.n_rows(),
        });
    }
    let m = groups.len();
    let aggregates: Vec<PartialAggregate> =
        groups.par_iter().map(PartialAggregate::from_matrix).collect();

    let (mean, covariance) = match supplied {
        Some(reference) => reference,
        None => {
            if m * (n - 1) < p {
                return Err(HotellingError::singular(format!(
                    "{m} subgroups of {n} cannot support {p} variables"
                )));
            }
            let grand = aggregates
                .iter()
                .fold(DVector::<f64>::zeros(p), |acc, a| acc + a.mean())
                / m as f64;
            let scatter = aggregates
                .iter()
                .fold(DMatrix::<f64>::zeros(p, p), |acc, a| acc + a.scatter());
            let s = scatter / (m * divisor(n, config.bessel)) as f64;
            let s = (&s + s.transpose()) * 0.5;
            (grand, s)
        }
    };
    let reference_size = size.unwrap_or(m);
    let limits = control_limits(p, reference_size, config)?;

    diagnostics.extend(variance_diagnostics(&covariance));
    let inversion = invert(&covariance, config.inversion)?;
    diagnostics.extend(inversion.diagnostics);

    let nf = n as f64;
    let statistics: Vec<f64> = aggregates
        .iter()
        .map(|a| nf * quadratic_form(&(a.mean() - &mean), &inversion.inverse))
        .collect();

    let rows: Vec<&[f64]> = aggregates.iter().map(|a| a.mean().as_slice()).collect();
    let subgroup_means = ObservationMatrix::from_rows(&rows)?;
    let cusum = cusum_trace(&subgroup_means, &mean, &(&covariance / nf), config)?;

    log::debug!(
        "T² batch chart: {m} subgroups of {n}, p = {p}, {} beyond limits",
        statistics.iter().filter(|&&t| t > limits.ucl).count()
    );

    Ok(T2Chart {
        mode: ChartMode::Batch { size: n },
        points: points(&statistics, &limits),
        limits,
        mean,
        covariance,
        reference_size,
        cusum,
        diagnostics,
    })
}

fn points(statistics: &[f64], limits: &ControlLimits) -> Vec<T2Point> {
    statistics
        .iter()
        .enumerate()
        .map(|(index, &statistic)| {
            let classification = classify(statistic, limits);
            T2Point {
                index,
                statistic,
                classification,
                out_of_control: classification.is_out_of_control(),
            }
        })
        .collect()
}

fn cusum_trace(
    series: &ObservationMatrix,
    mean: &DVector<f64>,
    covariance: &DMatrix<f64>,
    config: &HotellingConfig,
) -> Result<Option<CusumTrace>> {
    let trackers = match MultiCusum::from_reference(mean, covariance, &config.cusum, config.alpha) {
        Ok(trackers) => trackers,
        Err(e) => {
            log::debug!("CUSUM trace skipped: {e}");
            return Ok(None);
        }
    };
    let (state, steps) = trackers.run(trackers.initial_state(), series)?;
    Ok(Some(CusumTrace {
        trackers,
        steps,
        state,
    }))
}

fn variance_diagnostics(covariance: &DMatrix<f64>) -> Vec<Diagnostic> {
    zero_variance_columns(covariance)
        .into_iter()
        .map(|column| {
            let d = Diagnostic::ZeroVariance { column };
            d.emit();
            d
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InversionPolicy, LimitSide, Phase};
    use crate::spc::classify::Breach;

    fn sweat() -> ObservationMatrix {
        ObservationMatrix::from_rows(&[
            [3.7, 48.5, 9.3],
            [5.7, 65.1, 8.0],
            [3.8, 47.2, 10.9],
            [3.2, 53.2, 12.0],
            [3.1, 55.5, 9.7],
            [4.6, 36.1, 7.9],
            [2.4, 24.8, 14.0],
            [7.2, 33.1, 7.6],
            [6.7, 47.4, 8.5],
            [5.4, 54.1, 11.3],
            [3.9, 36.9, 12.7],
            [4.5, 58.8, 12.3],
            [3.5, 27.8, 9.8],
            [4.5, 40.2, 8.4],
            [1.5, 13.5, 10.1],
            [8.5, 56.4, 7.1],
            [4.5, 71.6, 8.2],
            [6.5, 52.8, 10.9],
            [4.1, 44.1, 11.2],
            [5.5, 40.9, 9.4],
        ])
        .expect("valid table")
    }

    const SPREAD: [[f64; 2]; 10] = [
        [1.0, 0.0],
        [-1.0, 0.0],
        [0.0, 1.0],
        [0.0, -1.0],
        [1.0, 1.0],
        [-1.0, -1.0],
        [1.0, -1.0],
        [-1.0, 1.0],
        [0.5, 0.2],
        [-0.5, -0.2],
    ];

    #[test]
    fn test_retrospective_statistics_sum_to_p_times_n_minus_1() {
        let config = HotellingConfig::default().with_phase(Phase::Retrospective);
        let chart = t2_chart(&sweat(), &ChartReference::estimated(), &config).expect("chartable");
        assert_eq!(chart.mode, ChartMode::Individual);
        assert_eq!(chart.points.len(), 20);
        assert_eq!(chart.reference_size, 20);
        let total: f64 = chart.statistics().iter().sum();
        assert!((total - 57.0).abs() < 1e-9, "ΣT² = {total}");
        // Phase-1 T² is bounded by (m − 1)²/m.
        assert!(chart.statistics().iter().all(|&t| t <= 19.0 * 19.0 / 20.0));
    }

    #[test]
    fn test_known_reference_flags_outlier() {
        let mut rows = SPREAD.to_vec();
        rows.push([5.0, 5.0]);
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        let cov = DMatrix::identity(2, 2);
        let config = HotellingConfig::default()
            .with_phase(Phase::KnownParameters)
            .with_side(LimitSide::Upper)
            .with_alpha(0.01);
        let chart = t2_chart(&x, &ChartReference::supplied(&[0.0, 0.0], &cov), &config)
            .expect("chartable");
        assert_eq!(chart.out_of_control(), vec![10]);
        assert!((chart.points[10].statistic - 50.0).abs() < 1e-12);
        assert_eq!(chart.points[10].classification.breach, Some(Breach::AboveUpper));
        assert!(!chart.is_in_control());
    }

    #[test]
    fn test_reference_must_be_complete() {
        let x = sweat();
        let mean = [4.0, 50.0, 10.0];
        let only_mean = ChartReference {
            mean: Some(&mean),
            ..ChartReference::default()
        };
        assert!(matches!(
            t2_chart(&x, &only_mean, &HotellingConfig::default()),
            Err(HotellingError::InvalidConfiguration(_))
        ));
        let cov = DMatrix::identity(3, 3);
        let only_cov = ChartReference {
            covariance: Some(&cov),
            ..ChartReference::default()
        };
        assert!(t2_chart(&x, &only_cov, &HotellingConfig::default()).is_err());
    }

    #[test]
    fn test_reference_dimensions_checked() {
        let cov = DMatrix::identity(2, 2);
        let reference = ChartReference::supplied(&[0.0, 0.0], &cov);
        assert!(matches!(
            t2_chart(&sweat(), &reference, &HotellingConfig::default()),
            Err(HotellingError::DimensionMismatch { expected: 3, .. })
        ));
    }

    #[test]
    fn test_supplied_reference_size_drives_limits() {
        let x = sweat();
        let mean = [4.6, 45.4, 9.97];
        let cov = crate::covariance::covariance_matrix(&x, true).expect("20 rows");
        let small = t2_chart(
            &x,
            &ChartReference::supplied(&mean, &cov).with_size(10),
            &HotellingConfig::default(),
        )
        .expect("chartable");
        let large = t2_chart(
            &x,
            &ChartReference::supplied(&mean, &cov).with_size(200),
            &HotellingConfig::default(),
        )
        .expect("chartable");
        assert_eq!(small.reference_size, 10);
        assert!(small.limits.ucl > large.limits.ucl);
        assert_eq!(small.statistics(), large.statistics());
    }

    #[test]
    fn test_bessel_flag_does_not_change_flags() {
        let x = sweat();
        let config = HotellingConfig::default().with_phase(Phase::Retrospective);
        let with = t2_chart(&x, &ChartReference::estimated(), &config).expect("chartable");
        let without = t2_chart(&x, &ChartReference::estimated(), &config.with_bessel(false))
            .expect("chartable");
        for (a, b) in with.points.iter().zip(&without.points) {
            assert!((b.statistic - a.statistic * 20.0 / 19.0).abs() < 1e-9);
            assert_eq!(a.out_of_control, b.out_of_control);
        }
        assert!((without.limits.ucl - with.limits.ucl * 20.0 / 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_chart_drops_incomplete_subgroup() {
        let base = sweat();
        let mut rows: Vec<[f64; 3]> = (0..base.n_rows())
            .map(|i| {
                let r = base.row(i);
                [r[0], r[1], r[2]]
            })
            .collect();
        rows.push([4.0, 50.0, 10.0]);
        rows.push([4.1, 49.0, 10.2]);
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        let config = HotellingConfig::default().with_batch_size(5);
        let chart = t2_chart(&x, &ChartReference::estimated(), &config).expect("chartable");
        assert_eq!(chart.mode, ChartMode::Batch { size: 5 });
        assert_eq!(chart.points.len(), 4);
        assert_eq!(chart.reference_size, 4);
        assert!(chart
            .diagnostics
            .contains(&Diagnostic::IncompleteBatch { dropped_rows: 2 }));
        assert!(chart.statistics().iter().all(|&t| t >= 0.0));
    }

    #[test]
    fn test_batch_chart_flags_shifted_subgroup() {
        let mut rows: Vec<[f64; 2]> = Vec::new();
        for _ in 0..6 {
            rows.extend_from_slice(&SPREAD);
        }
        rows.extend(SPREAD[..5].iter().map(|r| [r[0] + 5.0, r[1] + 5.0]));
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        let config = HotellingConfig::default()
            .with_batch_size(5)
            .with_phase(Phase::Retrospective);
        let chart = t2_chart(&x, &ChartReference::estimated(), &config).expect("chartable");
        assert_eq!(chart.points.len(), 13);
        let last = &chart.points[12];
        assert!(last.out_of_control, "T² = {}, ucl = {}", last.statistic, chart.limits.ucl);
        assert_eq!(last.classification.breach, Some(Breach::AboveUpper));
        assert!(chart.diagnostics.is_empty());

        let trace = chart.cusum.as_ref().expect("positive variances");
        assert!(trace.alarms().contains(&12));
        assert_eq!(trace.state[0].count, 13);
    }

    #[test]
    fn test_cusum_trace_follows_rows() {
        let chart = t2_chart(&sweat(), &ChartReference::estimated(), &HotellingConfig::default())
            .expect("chartable");
        let trace = chart.cusum.as_ref().expect("positive variances");
        assert_eq!(trace.steps.len(), 3);
        assert!(trace.steps.iter().all(|s| s.len() == 20));
        assert_eq!(trace.classifications(0).len(), 20);
        assert!(trace.classifications(7).is_empty());
    }

    #[test]
    fn test_singular_reference_is_reported() {
        let rows: Vec<[f64; 2]> = (0..8).map(|i| [i as f64, 2.0 * i as f64]).collect();
        let x = ObservationMatrix::from_rows(&rows).expect("valid table");
        assert!(matches!(
            t2_chart(&x, &ChartReference::estimated(), &HotellingConfig::default()),
            Err(HotellingError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_too_few_rows_for_estimated_reference() {
        let x = ObservationMatrix::from_rows(&[[1.0, 2.0, 3.0], [2.0, 1.0, 5.0], [0.5, 4.0, 1.0]])
            .expect("valid table");
        let config = HotellingConfig::default()
            .with_phase(Phase::KnownParameters)
            .with_inversion(InversionPolicy::PseudoInverse);
        assert!(matches!(
            t2_chart(&x, &ChartReference::estimated(), &config),
            Err(HotellingError::SingularMatrix { .. })
        ));

        let batched = ObservationMatrix::from_rows(&[
            [1.0, 2.0, 3.0],
            [2.0, 1.0, 5.0],
            [0.5, 4.0, 1.0],
            [3.0, 0.0, 2.0],
        ])
        .expect("valid table");
        assert!(matches!(
            t2_chart(&batched, &ChartReference::estimated(), &config.with_batch_size(2)),
            Err(HotellingError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_chart_serializes_limits_and_flags() {
        let chart = t2_chart(&sweat(), &ChartReference::estimated(), &HotellingConfig::default())
            .expect("chartable");
        let value = serde_json::to_value(&chart).expect("serialize");
        for key in ["ucl", "lcl", "cl"] {
            assert!(value["limits"].get(key).is_some(), "missing limits.{key}");
        }
        assert!(value["points"][0].get("out_of_control").is_some());
        assert!(value["points"][0].get("statistic").is_some());
    }
}
