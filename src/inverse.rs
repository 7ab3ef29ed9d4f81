//! Covariance inversion with singularity detection.
//!
//! # Algorithm
//!
//! 1. Compute singular values σ₁ ≥ … ≥ σ_p of the symmetric input.
//! 2. The numerical rank counts σᵢ > σ₁·ε_rel (ε_rel = 1e-12). A rank below
//!    `p` is singular: [`InversionPolicy::Strict`] fails, while
//!    [`InversionPolicy::PseudoInverse`] returns the Moore–Penrose inverse.
//! 3. Full-rank inputs are inverted through Cholesky, falling back to LU
//!    for symmetric inputs that are not numerically positive definite.
//! 4. A condition number σ₁/σ_p above
//!    [`NEAR_SINGULAR_CONDITION`](crate::diagnostics::NEAR_SINGULAR_CONDITION)
//!    is attached as a diagnostic.
//!
//! The tolerance is relative to the matrix scale, so measurements in
//! very small or very large units are treated alike.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::config::InversionPolicy;
use crate::diagnostics::{Diagnostic, NEAR_SINGULAR_CONDITION};
use crate::error::{HotellingError, Result};

/// Singular values at or below `σ_max · RELATIVE_TOLERANCE` count as zero.
pub const RELATIVE_TOLERANCE: f64 = 1e-12;

/// Decomposition used to produce the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionMethod {
    Cholesky,
    Lu,
    PseudoInverse,
}

/// An inverted covariance matrix with conditioning information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inversion {
    /// The (pseudo-)inverse, symmetrized.
    pub inverse: DMatrix<f64>,
    /// σ_max / σ_min (infinite when rank-deficient).
    pub condition_number: f64,
    /// Numerical rank.
    pub rank: usize,
    pub method: InversionMethod,
    /// Non-fatal warnings raised while inverting.
    pub diagnostics: Vec<Diagnostic>,
}

/// Inverts a square symmetric matrix.
///
/// # Errors
///
/// - [`HotellingError::DimensionMismatch`] if `s` is not square
/// - [`HotellingError::SingularMatrix`] if `s` is rank-deficient under
///   [`InversionPolicy::Strict`], or contains non-finite entries
///
/// # Examples
///
/// ```
/// use nalgebra::DMatrix;
/// use u_hotelling::config::InversionPolicy;
/// use u_hotelling::inverse::invert;
///
/// let s = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
/// let inv = invert(&s, InversionPolicy::Strict).unwrap();
/// assert!((&s * &inv.inverse - DMatrix::identity(2, 2)).norm() < 1e-12);
///
/// let collinear = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
/// assert!(invert(&collinear, InversionPolicy::Strict).is_err());
/// ```
pub fn invert(s: &DMatrix<f64>, policy: InversionPolicy) -> Result<Inversion> {
    let p = s.nrows();
    if s.ncols() != p {
        return Err(HotellingError::DimensionMismatch {
            expected: p,
            actual: s.ncols(),
        });
    }
    if p == 0 {
        return Err(HotellingError::singular("empty matrix"));
    }
    if s.iter().any(|v| !v.is_finite()) {
        return Err(HotellingError::singular("non-finite entries"));
    }

    let singular_values = s.singular_values();
    let sigma_max = singular_values.max();
    let sigma_min = singular_values.min();
    let tolerance = sigma_max * RELATIVE_TOLERANCE;
    let rank = singular_values.iter().filter(|&&v| v > tolerance).count();

    if rank < p {
        return match policy {
            InversionPolicy::Strict => Err(HotellingError::singular(format!(
                "numerical rank {rank} < {p} variables"
            ))),
            InversionPolicy::PseudoInverse => {
                let inverse = s
                    .clone()
                    .pseudo_inverse(tolerance.max(f64::MIN_POSITIVE))
                    .map_err(|msg| HotellingError::singular(msg))?;
                let diagnostic = Diagnostic::PseudoInverse { rank, dimension: p };
                diagnostic.emit();
                Ok(Inversion {
                    inverse: symmetrize(inverse),
                    condition_number: f64::INFINITY,
                    rank,
                    method: InversionMethod::PseudoInverse,
                    diagnostics: vec![diagnostic],
                })
            }
        };
    }

    let condition_number = sigma_max / sigma_min;
    let mut diagnostics = Vec::new();
    if condition_number > NEAR_SINGULAR_CONDITION {
        let diagnostic = Diagnostic::NearSingular { condition_number };
        diagnostic.emit();
        diagnostics.push(diagnostic);
    }

    let (inverse, method) = match s.clone().cholesky() {
        Some(chol) => (chol.inverse(), InversionMethod::Cholesky),
        None => {
            let inverse = s
                .clone()
                .try_inverse()
                .ok_or_else(|| HotellingError::singular("LU factorization failed"))?;
            (inverse, InversionMethod::Lu)
        }
    };

    Ok(Inversion {
        inverse: symmetrize(inverse),
        condition_number,
        rank,
        method,
        diagnostics,
    })
}

fn symmetrize(m: DMatrix<f64>) -> DMatrix<f64> {
    (&m + m.transpose()) * 0.5
}
