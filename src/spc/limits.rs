//! Control limits for T² charts and tests.
//!
//! Limits are quantiles of the reference distribution of T², expressed in
//! T² units. They are a pure function of the dimension `p`, the reference
//! size `m`, the subgroup size, α, the Bessel flag, the side and the phase;
//! no data is inspected.
//!
//! # Reference distributions
//!
//! Individual observations, reference estimated from `m` rows:
//!
//! ```text
//! phase 1 (retrospective):  T² ~ ((m − 1)² / m) · Beta(p/2, (m − p − 1)/2)
//! phase 2 (monitoring):     T² ~ p(m + 1)(m − 1) / (m(m − p)) · F(p, m − p)
//! ```
//!
//! Subgroups of size `n`, `m` subgroups:
//!
//! ```text
//! phase 1:  T² ~ p(m − 1)(n − 1) / (mn − m − p + 1) · F(p, mn − m − p + 1)
//! phase 2:  T² ~ p(m + 1)(n − 1) / (mn − m − p + 1) · F(p, mn − m − p + 1)
//! ```
//!
//! Known mean and covariance: `T² ~ χ²(p)`.
//!
//! Without Bessel correction the estimated covariance shrinks by
//! (m − 1)/m (or (n − 1)/n within subgroups), so the estimated-parameter
//! limits grow by the reciprocal.
//!
//! # References
//!
//! - Tracy, N.D., Young, J.C., Mason, R.L. (1992). "Multivariate Control
//!   Charts for Individual Observations", *Journal of Quality Technology*
//!   24(2), pp. 88-95.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*,
//!   8th ed., §11.3.

use serde::{Deserialize, Serialize};

use crate::config::{HotellingConfig, LimitSide, Phase};
use crate::error::{HotellingError, Result};
use crate::special;
use crate::t2::{DegreesOfFreedom, T2Result};

/// Scaled reference distribution of T².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum LimitDistribution {
    /// `scale · Beta(a, b)`
    Beta { a: f64, b: f64, scale: f64 },
    /// `scale · F(d1, d2)`
    F { d1: f64, d2: f64, scale: f64 },
    /// `scale · χ²(k)`
    ChiSquared { k: f64, scale: f64 },
}

impl LimitDistribution {
    /// The `q`-quantile in T² units.
    pub fn quantile(&self, q: f64) -> f64 {
        match *self {
            Self::Beta { a, b, scale } => scale * special::beta_quantile(q, a, b),
            Self::F { d1, d2, scale } => scale * special::f_quantile(q, d1, d2),
            Self::ChiSquared { k, scale } => scale * special::chi_squared_quantile(q, k),
        }
    }

    /// Probability that T² exceeds `t2`.
    pub fn upper_tail(&self, t2: f64) -> f64 {
        match *self {
            Self::Beta { a, b, scale } => 1.0 - special::beta_cdf(t2 / scale, a, b),
            Self::F { d1, d2, scale } => special::f_sf(t2 / scale, d1, d2),
            Self::ChiSquared { k, scale } => 1.0 - special::chi_squared_cdf(t2 / scale, k),
        }
    }
}

/// Upper and lower control limits with the center line, in T² units.
///
/// # Invariants
///
/// - `lcl <= cl <= ucl` when `lcl` is present
/// - `lcl` is `None` for one-sided limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    /// Upper control limit.
    pub ucl: f64,
    /// Center line (median of the reference distribution).
    pub cl: f64,
    /// Lower control limit, two-sided limits only.
    pub lcl: Option<f64>,
    pub alpha: f64,
    pub side: LimitSide,
    pub distribution: LimitDistribution,
}

impl ControlLimits {
    fn from_distribution(distribution: LimitDistribution, alpha: f64, side: LimitSide) -> Self {
        let (lcl, ucl) = match side {
            LimitSide::Upper => (None, distribution.quantile(1.0 - alpha)),
            LimitSide::TwoSided => (
                Some(distribution.quantile(alpha / 2.0)),
                distribution.quantile(1.0 - alpha / 2.0),
            ),
        };
        Self {
            ucl,
            cl: distribution.quantile(0.5),
            lcl,
            alpha,
            side,
            distribution,
        }
    }
}

/// Computes T² control limits for `p` variables and a reference of size `m`.
///
/// `m` counts rows in individual mode and subgroups when
/// `config.batch_size` is set. It is ignored for
/// [`Phase::KnownParameters`].
///
/// # Errors
///
/// - [`HotellingError::InvalidConfiguration`] if `config` is invalid or `p` is zero
/// - [`HotellingError::InsufficientData`] if `m` leaves no degrees of freedom
///
/// # Examples
///
/// ```
/// use u_hotelling::config::{HotellingConfig, LimitSide};
/// use u_hotelling::spc::control_limits;
///
/// let config = HotellingConfig::default().with_side(LimitSide::Upper);
/// let limits = control_limits(2, 20, &config).unwrap();
/// assert!(limits.lcl.is_none());
/// assert!(limits.ucl > limits.cl);
///
/// let strict = control_limits(2, 20, &config.with_alpha(0.01)).unwrap();
/// assert!(strict.ucl > limits.ucl);
/// ```
pub fn control_limits(p: usize, m: usize, config: &HotellingConfig) -> Result<ControlLimits> {
    config.validate()?;
    if p == 0 {
        return Err(HotellingError::config("at least one variable is required"));
    }
    let distribution = reference_distribution(p, m, config)?;
    let limits = ControlLimits::from_distribution(distribution, config.alpha, config.side);
    log::debug!(
        "T² limits for p = {p}, m = {m}, batch = {:?}: ucl = {:.4}, cl = {:.4}, lcl = {:?}",
        config.batch_size,
        limits.ucl,
        limits.cl,
        limits.lcl
    );
    Ok(limits)
}

/// Critical region of a completed hypothesis test, in T² units.
///
/// The upper limit is the T² value whose F equivalent sits at the 1 − α
/// quantile of the test's F reference; there is no lower limit.
pub fn critical_limits(result: &T2Result, alpha: f64) -> Result<ControlLimits> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(HotellingError::config(format!(
            "alpha must be in (0, 1), got {alpha}"
        )));
    }
    Ok(critical_region(result.df, result.f_to_t2(1.0), alpha))
}

/// Upper-sided limits of an F-referenced test; `scale` converts F to T².
pub(crate) fn critical_region(df: DegreesOfFreedom, scale: f64, alpha: f64) -> ControlLimits {
    let distribution = LimitDistribution::F {
        d1: df.numerator,
        d2: df.denominator,
        scale,
    };
    ControlLimits::from_distribution(distribution, alpha, LimitSide::Upper)
}

fn reference_distribution(p: usize, m: usize, config: &HotellingConfig) -> Result<LimitDistribution> {
    let pf = p as f64;
    if config.phase == Phase::KnownParameters {
        return Ok(LimitDistribution::ChiSquared { k: pf, scale: 1.0 });
    }
    let mf = m as f64;

    match config.batch_size {
        None => {
            let needed = match config.phase {
                Phase::Retrospective => p + 2,
                _ => p + 1,
            };
            if m < needed {
                return Err(HotellingError::InsufficientData { needed, actual: m });
            }
            let bessel = if config.bessel { 1.0 } else { mf / (mf - 1.0) };
            Ok(match config.phase {
                Phase::Retrospective => LimitDistribution::Beta {
                    a: pf / 2.0,
                    b: (mf - pf - 1.0) / 2.0,
                    scale: bessel * (mf - 1.0).powi(2) / mf,
                },
                _ => LimitDistribution::F {
                    d1: pf,
                    d2: mf - pf,
                    scale: bessel * pf * (mf + 1.0) * (mf - 1.0) / (mf * (mf - pf)),
                },
            })
        }
        Some(n) => {
            // mn − m − p + 1 > 0  ⇔  m(n − 1) ≥ p
            let needed = (p + n - 2) / (n - 1);
            if m == 0 || m < needed {
                return Err(HotellingError::InsufficientData {
                    needed: needed.max(1),
                    actual: m,
                });
            }
            let nf = n as f64;
            let d2 = mf * nf - mf - pf + 1.0;
            let bessel = if config.bessel { 1.0 } else { nf / (nf - 1.0) };
            let factor = match config.phase {
                Phase::Retrospective => mf - 1.0,
                _ => mf + 1.0,
            };
            Ok(LimitDistribution::F {
                d1: pf,
                d2,
                scale: bessel * pf * factor * (nf - 1.0) / d2,
            })
        }
    }
}
