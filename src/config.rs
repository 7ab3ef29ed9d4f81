//! Configuration surface shared by every entry point.
//!
//! A [`HotellingConfig`] is validated at the call boundary, before any
//! computation begins. Changing the limit-related options (α, side, phase,
//! batch size) changes the returned limits but never the T² values.
//!
//! # Examples
//!
//! ```
//! use u_hotelling::config::{HotellingConfig, LimitSide};
//!
//! let config = HotellingConfig::default()
//!     .with_alpha(0.01)
//!     .with_side(LimitSide::Upper);
//! assert!(config.validate().is_ok());
//! assert!(HotellingConfig::default().with_alpha(1.5).validate().is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{HotellingError, Result};

/// Which distribution governs the charted T² values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: the observations being charted also produced the reference
    /// mean and covariance (Beta-distributed T²).
    Retrospective,
    /// Phase 2: new observations are charted against a reference estimated
    /// from an independent phase-1 sample (F-distributed T²).
    Monitoring,
    /// Mean and covariance are known population values (χ²-distributed T²).
    KnownParameters,
}

/// One-sided (upper only) or two-sided limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSide {
    /// UCL at the 1 − α quantile, no LCL.
    Upper,
    /// LCL at α/2, UCL at 1 − α/2.
    TwoSided,
}

/// How a covariance matrix that fails the singularity check is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionPolicy {
    /// Fail with [`HotellingError::SingularMatrix`].
    Strict,
    /// Fall back to the Moore–Penrose pseudo-inverse and attach a diagnostic.
    PseudoInverse,
}

/// CUSUM slack and decision threshold, in standard-deviation units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumConfig {
    /// Reference value (allowance). Half the shift to be detected.
    pub k: f64,
    /// Decision interval. `None` derives it from α.
    pub h: Option<f64>,
}

impl Default for CusumConfig {
    fn default() -> Self {
        Self { k: 0.5, h: None }
    }
}

/// Options recognized by every test and chart entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotellingConfig {
    /// Significance level α, in (0, 1).
    pub alpha: f64,
    /// Use the n − 1 divisor for covariance estimates.
    pub bessel: bool,
    /// One- or two-sided control limits.
    pub side: LimitSide,
    /// Chart phase used to pick the limit distribution.
    pub phase: Phase,
    /// Rational subgroup size; `None` charts individual observations.
    pub batch_size: Option<usize>,
    /// Singular-covariance handling.
    pub inversion: InversionPolicy,
    /// CUSUM parameters.
    pub cusum: CusumConfig,
}

impl Default for HotellingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            bessel: true,
            side: LimitSide::TwoSided,
            phase: Phase::Monitoring,
            batch_size: None,
            inversion: InversionPolicy::Strict,
            cusum: CusumConfig::default(),
        }
    }
}

impl HotellingConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_bessel(mut self, bessel: bool) -> Self {
        self.bessel = bessel;
        self
    }

    pub fn with_side(mut self, side: LimitSide) -> Self {
        self.side = side;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_inversion(mut self, inversion: InversionPolicy) -> Self {
        self.inversion = inversion;
        self
    }

    pub fn with_cusum(mut self, k: f64, h: Option<f64>) -> Self {
        self.cusum = CusumConfig { k, h };
        self
    }

    /// Checks every option against its valid range.
    ///
    /// # Errors
    ///
    /// [`HotellingError::InvalidConfiguration`] when α is outside (0, 1),
    /// the batch size is below 2, or a CUSUM parameter is negative or NaN.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(HotellingError::config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if let Some(size) = self.batch_size {
            if size < 2 {
                return Err(HotellingError::config(format!(
                    "batch size must be at least 2, got {size}"
                )));
            }
        }
        let CusumConfig { k, h } = self.cusum;
        if !k.is_finite() || k < 0.0 {
            return Err(HotellingError::config(format!(
                "CUSUM slack k must be finite and non-negative, got {k}"
            )));
        }
        if let Some(h) = h {
            if h.is_nan() || h <= 0.0 {
                return Err(HotellingError::config(format!(
                    "CUSUM threshold h must be positive, got {h}"
                )));
            }
        }
        Ok(())
    }
}
