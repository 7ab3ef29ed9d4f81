//! Hotelling's T² statistic for one and two samples.
//!
//! # Algorithm
//!
//! One sample against a reference mean μ₀ (n rows, p variables, covariance
//! divisor d = n − 1 or n):
//!
//! ```text
//! T² = n·(x̄ − μ₀)ᵀ S⁻¹ (x̄ − μ₀)
//! F  = T²·(n − p) / (p·d)          ~ F(p, n − p)
//! ```
//!
//! Two independent samples with pooled covariance Sₚ (divisors d₁, d₂):
//!
//! ```text
//! T² = (n₁n₂ / (n₁ + n₂))·(x̄₁ − x̄₂)ᵀ Sₚ⁻¹ (x̄₁ − x̄₂)
//! F  = T²·(n₁ + n₂ − p − 1) / (p·(d₁ + d₂))   ~ F(p, n₁ + n₂ − p − 1)
//! ```
//!
//! The divisor that scales the covariance also scales the F conversion, so
//! F and the p-value are the same with or without Bessel correction.
//!
//! # References
//!
//! - Hotelling, H. (1931). "The Generalization of Student's Ratio",
//!   *Annals of Mathematical Statistics* 2(3), pp. 360-378.
//! - Johnson, R.A., Wichern, D.W. (2007). *Applied Multivariate Statistical
//!   Analysis*, 6th ed., §5.2 and §6.3.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::HotellingConfig;
use crate::covariance::{divisor, pooled_from_aggregates, zero_variance_columns, PartialAggregate};
use crate::data::ObservationMatrix;
use crate::diagnostics::Diagnostic;
use crate::error::{HotellingError, Result};
use crate::inverse::invert;
use crate::spc::{classify, critical_region, Classification, ControlLimits};
use crate::special;

/// The hypothesis under test, selected once at call time.
#[derive(Debug, Clone, Copy)]
pub enum TestMode<'a> {
    /// H₀: μ = `reference`. The reference mean is required; pass a zero
    /// vector explicitly to test against the origin.
    OneSample {
        sample: &'a ObservationMatrix,
        reference: &'a [f64],
    },
    /// H₀: μ₁ = μ₂.
    TwoSample {
        first: &'a ObservationMatrix,
        second: &'a ObservationMatrix,
    },
}

/// [`TestMode`] over pre-reduced partial aggregates (out-of-core data).
#[derive(Debug, Clone, Copy)]
pub enum AggregateMode<'a> {
    OneSample {
        sample: &'a PartialAggregate,
        reference: &'a [f64],
    },
    TwoSample {
        first: &'a PartialAggregate,
        second: &'a PartialAggregate,
    },
}

/// Which form of the test produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    OneSample,
    TwoSample,
}

/// Numerator and denominator degrees of freedom of the F reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreesOfFreedom {
    pub numerator: f64,
    pub denominator: f64,
}

/// Outcome of a Hotelling T² test. Produced fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct T2Result {
    pub kind: TestKind,
    /// The T² statistic.
    pub statistic: f64,
    /// F-equivalent statistic.
    pub f_statistic: f64,
    /// Upper-tail probability of `f_statistic`.
    pub p_value: f64,
    pub df: DegreesOfFreedom,
    /// Sample mean vector(s), one per group.
    pub means: Vec<DVector<f64>>,
    /// Reference mean (one-sample only).
    pub reference: Option<DVector<f64>>,
    /// Row count per group.
    pub sample_sizes: Vec<usize>,
    /// Sample covariance (one-sample) or pooled covariance (two-sample).
    pub covariance: DMatrix<f64>,
    /// Covariance divisor total (`d` or `d₁ + d₂`) used in the F conversion.
    pub divisor: usize,
    pub bessel: bool,
    /// Critical region at the configured α, in T² units. Upper-sided, so
    /// `lcl` is absent.
    pub limits: ControlLimits,
    pub classification: Classification,
    /// `statistic` lies beyond `limits.ucl`.
    pub out_of_control: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl T2Result {
    /// Number of variables.
    pub fn dimension(&self) -> usize {
        self.covariance.nrows()
    }

    /// Whether H₀ is rejected at level `alpha`.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    /// Converts a T² value to the F scale of this test.
    pub fn t2_to_f(&self, t2: f64) -> f64 {
        t2 * self.df.denominator / (self.df.numerator * self.divisor as f64)
    }

    /// Converts an F value back to T² units.
    pub fn f_to_t2(&self, f: f64) -> f64 {
        f * self.df.numerator * self.divisor as f64 / self.df.denominator
    }
}

/// Computes Hotelling's T² for the selected mode.
///
/// # Errors
///
/// - [`HotellingError::InvalidConfiguration`] if `config` is invalid
/// - [`HotellingError::InsufficientData`] if a group has fewer than 2 rows
/// - [`HotellingError::DimensionMismatch`] if groups or the reference disagree on `p`
/// - [`HotellingError::SingularMatrix`] if the covariance cannot be inverted
///   (always when there are too few rows for `p` variables)
///
/// # Examples
///
/// ```
/// use u_hotelling::config::HotellingConfig;
/// use u_hotelling::data::ObservationMatrix;
/// use u_hotelling::t2::{hotelling_t2, TestMode};
///
/// let a = ObservationMatrix::from_rows(&[[1.0, 2.0], [2.0, 1.0], [3.0, 3.5], [2.5, 2.0]]).unwrap();
/// let b = ObservationMatrix::from_rows(&[[5.0, 6.0], [6.0, 5.5], [7.0, 7.5], [6.5, 6.0]]).unwrap();
/// let r = hotelling_t2(TestMode::TwoSample { first: &a, second: &b }, &HotellingConfig::default()).unwrap();
/// assert!(r.statistic > 0.0);
/// assert!(r.p_value < 0.05);
/// assert_eq!(r.df.denominator, 5.0);
/// ```
pub fn hotelling_t2(mode: TestMode<'_>, config: &HotellingConfig) -> Result<T2Result> {
    config.validate()?;
    match mode {
        TestMode::OneSample { sample, reference } => {
            let agg = PartialAggregate::from_matrix(sample);
            t2_from_aggregates(
                AggregateMode::OneSample {
                    sample: &agg,
                    reference,
                },
                config,
            )
        }
        TestMode::TwoSample { first, second } => {
            let a = PartialAggregate::from_matrix(first);
            let b = PartialAggregate::from_matrix(second);
            t2_from_aggregates(
                AggregateMode::TwoSample {
                    first: &a,
                    second: &b,
                },
                config,
            )
        }
    }
}

/// One-sample shorthand for [`hotelling_t2`].
pub fn one_sample(
    sample: &ObservationMatrix,
    reference: &[f64],
    config: &HotellingConfig,
) -> Result<T2Result> {
    hotelling_t2(TestMode::OneSample { sample, reference }, config)
}

/// Two-sample shorthand for [`hotelling_t2`].
pub fn two_sample(
    first: &ObservationMatrix,
    second: &ObservationMatrix,
    config: &HotellingConfig,
) -> Result<T2Result> {
    hotelling_t2(TestMode::TwoSample { first, second }, config)
}

/// Computes T² from partial aggregates; identical to [`hotelling_t2`] on the
/// rows the aggregates were reduced from.
pub fn t2_from_aggregates(mode: AggregateMode<'_>, config: &HotellingConfig) -> Result<T2Result> {
    config.validate()?;
    match mode {
        AggregateMode::OneSample { sample, reference } => one_sample_core(sample, reference, config),
        AggregateMode::TwoSample { first, second } => two_sample_core(first, second, config),
    }
}

/// (x − μ)ᵀ S⁻¹ (x − μ), clamped at zero against round-off.
pub fn quadratic_form(diff: &DVector<f64>, inverse: &DMatrix<f64>) -> f64 {
    diff.dot(&(inverse * diff)).max(0.0)
}

fn one_sample_core(
    agg: &PartialAggregate,
    reference: &[f64],
    config: &HotellingConfig,
) -> Result<T2Result> {
    let p = agg.dim();
    let n = agg.count();
    if reference.len() != p {
        return Err(HotellingError::DimensionMismatch {
            expected: p,
            actual: reference.len(),
        });
    }
    if reference.iter().any(|v| !v.is_finite()) {
        return Err(HotellingError::config("reference mean must be finite"));
    }
    if n < 2 {
        return Err(HotellingError::InsufficientData {
            needed: 2,
            actual: n,
        });
    }
    if n <= p {
        return Err(HotellingError::singular(format!(
            "{n} observations cannot support {p} variables"
        )));
    }

    let covariance = agg.covariance(config.bessel)?;
    let mut diagnostics = variance_diagnostics(&covariance);
    let inversion = invert(&covariance, config.inversion)?;
    diagnostics.extend(inversion.diagnostics);

    let mu0 = DVector::from_column_slice(reference);
    let diff = agg.mean() - &mu0;
    let statistic = n as f64 * quadratic_form(&diff, &inversion.inverse);

    let d = divisor(n, config.bessel);
    let df = DegreesOfFreedom {
        numerator: p as f64,
        denominator: (n - p) as f64,
    };
    let f_statistic = statistic * df.denominator / (df.numerator * d as f64);
    let p_value = special::f_sf(f_statistic, df.numerator, df.denominator);

    log::debug!(
        "one-sample T² = {statistic:.6}, F = {f_statistic:.6} on ({}, {}), p = {p_value:.3e}",
        df.numerator,
        df.denominator
    );

    let (limits, classification) = verdict(statistic, df, d, config.alpha);

    Ok(T2Result {
        kind: TestKind::OneSample,
        statistic,
        f_statistic,
        p_value,
        df,
        means: vec![agg.mean().clone()],
        reference: Some(mu0),
        sample_sizes: vec![n],
        covariance,
        divisor: d,
        bessel: config.bessel,
        limits,
        classification,
        out_of_control: classification.is_out_of_control(),
        diagnostics,
    })
}

fn two_sample_core(
    a: &PartialAggregate,
    b: &PartialAggregate,
    config: &HotellingConfig,
) -> Result<T2Result> {
    let p = a.dim();
    if b.dim() != p {
        return Err(HotellingError::DimensionMismatch {
            expected: p,
            actual: b.dim(),
        });
    }
    let (n1, n2) = (a.count(), b.count());
    for n in [n1, n2] {
        if n < 2 {
            return Err(HotellingError::InsufficientData {
                needed: 2,
                actual: n,
            });
        }
    }
    if n1 + n2 <= p + 1 {
        return Err(HotellingError::singular(format!(
            "{} pooled observations cannot support {p} variables",
            n1 + n2
        )));
    }

    let covariance = pooled_from_aggregates(a, b, config.bessel)?;
    let mut diagnostics = variance_diagnostics(&covariance);
    let inversion = invert(&covariance, config.inversion)?;
    diagnostics.extend(inversion.diagnostics);

    let diff = a.mean() - b.mean();
    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let statistic = n1f * n2f / (n1f + n2f) * quadratic_form(&diff, &inversion.inverse);

    let d = divisor(n1, config.bessel) + divisor(n2, config.bessel);
    let df = DegreesOfFreedom {
        numerator: p as f64,
        denominator: (n1 + n2 - p - 1) as f64,
    };
    let f_statistic = statistic * df.denominator / (df.numerator * d as f64);
    let p_value = special::f_sf(f_statistic, df.numerator, df.denominator);

    log::debug!(
        "two-sample T² = {statistic:.6}, F = {f_statistic:.6} on ({}, {}), p = {p_value:.3e}",
        df.numerator,
        df.denominator
    );

    let (limits, classification) = verdict(statistic, df, d, config.alpha);

    Ok(T2Result {
        kind: TestKind::TwoSample,
        statistic,
        f_statistic,
        p_value,
        df,
        means: vec![a.mean().clone(), b.mean().clone()],
        reference: None,
        sample_sizes: vec![n1, n2],
        covariance,
        divisor: d,
        bessel: config.bessel,
        limits,
        classification,
        out_of_control: classification.is_out_of_control(),
        diagnostics,
    })
}

fn verdict(
    statistic: f64,
    df: DegreesOfFreedom,
    divisor: usize,
    alpha: f64,
) -> (ControlLimits, Classification) {
    let scale = df.numerator * divisor as f64 / df.denominator;
    let limits = critical_region(df, scale, alpha);
    let classification = classify(statistic, &limits);
    (limits, classification)
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
