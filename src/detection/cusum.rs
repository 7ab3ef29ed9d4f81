//! Cumulative Sum (CUSUM) tracking for small persistent mean shifts.
//!
//! # Algorithm
//!
//! Given observations x_1, ..., x_n with target mean mu_0 and standard
//! deviation sigma, the standardized values are:
//!
//! ```text
//! z_i = (x_i - mu_0) / sigma
//! ```
//!
//! The upper and lower CUSUM statistics are:
//!
//! ```text
//! S_H(i) = max(0, S_H(i-1) + z_i - k)
//! S_L(i) = max(0, S_L(i-1) - z_i - k)
//! ```
//!
//! A side alarms when its statistic strictly exceeds `h`.
//!
//! The running sums live in a caller-owned [`CusumState`]. Every update takes
//! the previous state by value and returns the next one, so independent
//! series never share state and a series can be replayed or resumed from
//! any saved state.
//!
//! # Parameters
//!
//! - **k**: reference value (allowance), typically 0.5 (designed to detect a 1-sigma shift)
//! - **h**: decision interval; when not given it is derived from α with
//!   Siegmund's ARL approximation (see [`decision_interval`])
//!
//! # References
//!
//! - Page, E.S. (1954). "Continuous inspection schemes", *Biometrika* 41(1-2), pp. 100-115.
//! - Siegmund, D. (1985). *Sequential Analysis: Tests and Confidence
//!   Intervals*, Springer, §X.2.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::CusumConfig;
use crate::data::ObservationMatrix;
use crate::error::{HotellingError, Result};

/// Siegmund's boundary correction, E[overshoot] ≈ 0.583 per side.
const SIEGMUND_CORRECTION: f64 = 1.166;

const SERIES_THRESHOLD: f64 = 1e-3;

/// CUSUM parameters for one monitored series.
///
/// # Examples
///
/// ```
/// use u_hotelling::detection::{CusumParams, CusumState};
///
/// let cusum = CusumParams::new(10.0, 1.0, 0.5, 5.0).unwrap();
/// // In-control data
/// let data = [10.1, 9.8, 10.2, 9.9, 10.0, 10.1, 9.7, 10.3];
/// let (_, steps) = cusum.run(CusumState::default(), &data);
/// assert_eq!(steps.len(), data.len());
/// assert!(cusum.signal_points(&data).is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumParams {
    /// Target process mean (mu_0).
    target: f64,
    /// Process standard deviation (sigma).
    sigma: f64,
    /// Reference value (allowance).
    k: f64,
    /// Decision interval; may be infinite.
    h: f64,
}

/// Running sums of one series. Start from `CusumState::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CusumState {
    /// Upper cumulative sum S_H.
    pub upper: f64,
    /// Lower cumulative sum S_L.
    pub lower: f64,
    /// Observations consumed so far (including skipped non-finite ones).
    pub count: usize,
}

/// Result of CUSUM tracking for a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumStep {
    /// Index of this observation in the series.
    pub index: usize,
    /// Upper cumulative sum S_H(i).
    pub s_upper: f64,
    /// Lower cumulative sum S_L(i).
    pub s_lower: f64,
    /// S_H(i) > h.
    pub upper_alarm: bool,
    /// S_L(i) > h.
    pub lower_alarm: bool,
}

impl CusumStep {
    /// Whether either side alarmed.
    pub fn signal(&self) -> bool {
        self.upper_alarm || self.lower_alarm
    }
}

impl CusumParams {
    /// Creates CUSUM parameters.
    ///
    /// # Errors
    ///
    /// [`HotellingError::InvalidConfiguration`] if `target` is not finite,
    /// `sigma` is not positive and finite, `k` is negative or not finite, or
    /// `h` is NaN or not positive. `h = +∞` is accepted and never alarms.
    pub fn new(target: f64, sigma: f64, k: f64, h: f64) -> Result<Self> {
        if !target.is_finite() {
            return Err(HotellingError::config(format!(
                "CUSUM target must be finite, got {target}"
            )));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(HotellingError::config(format!(
                "CUSUM sigma must be positive and finite, got {sigma}"
            )));
        }
        if !k.is_finite() || k < 0.0 {
            return Err(HotellingError::config(format!(
                "CUSUM slack k must be finite and non-negative, got {k}"
            )));
        }
        if h.is_nan() || h <= 0.0 {
            return Err(HotellingError::config(format!(
                "CUSUM threshold h must be positive, got {h}"
            )));
        }
        Ok(Self {
            target,
            sigma,
            k,
            h,
        })
    }

    /// Creates parameters from a [`CusumConfig`], deriving `h` from `alpha`
    /// when the config leaves it unset.
    pub fn from_config(target: f64, sigma: f64, config: &CusumConfig, alpha: f64) -> Result<Self> {
        let h = match config.h {
            Some(h) => h,
            None => decision_interval(config.k, alpha)?,
        };
        Self::new(target, sigma, config.k, h)
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    /// Advances `state` by one observation.
    ///
    /// A non-finite `x` consumes an index but carries both sums forward
    /// without alarming.
    pub fn step(&self, state: CusumState, x: f64) -> (CusumState, CusumStep) {
        let index = state.count;
        let (upper, lower, armed) = if x.is_finite() {
            let z = (x - self.target) / self.sigma;
            (
                (state.upper + z - self.k).max(0.0),
                (state.lower - z - self.k).max(0.0),
                true,
            )
        } else {
            (state.upper, state.lower, false)
        };
        let next = CusumState {
            upper,
            lower,
            count: index + 1,
        };
        let step = CusumStep {
            index,
            s_upper: upper,
            s_lower: lower,
            upper_alarm: armed && upper > self.h,
            lower_alarm: armed && lower > self.h,
        };
        (next, step)
    }

    /// Folds `data` starting from `state`; returns the final state and one
    /// step per observation.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_hotelling::detection::{CusumParams, CusumState};
    ///
    /// let cusum = CusumParams::new(10.0, 1.0, 0.5, 5.0).unwrap();
    /// // Data with upward shift, delivered in two pieces
    /// let (state, _) = cusum.run(CusumState::default(), &[10.0; 10]);
    /// let (_, steps) = cusum.run(state, &[12.0; 10]);
    /// assert!(steps.iter().any(|s| s.upper_alarm));
    /// assert_eq!(steps[0].index, 10);
    /// ```
    ///
    /// # Complexity
    ///
    /// Time: O(n), Space: O(n)
    pub fn run(&self, state: CusumState, data: &[f64]) -> (CusumState, Vec<CusumStep>) {
        let mut steps = Vec::with_capacity(data.len());
        let mut state = state;
        for &x in data {
            let (next, step) = self.step(state, x);
            steps.push(step);
            state = next;
        }
        (state, steps)
    }

    /// Indices of observations where either side alarmed, from a fresh state.
    pub fn signal_points(&self, data: &[f64]) -> Vec<usize> {
        self.run(CusumState::default(), data)
            .1
            .into_iter()
            .filter(CusumStep::signal)
            .map(|s| s.index)
            .collect()
    }
}

/// One-sided in-control average run length (Siegmund's approximation).
///
/// ```text
/// ARL₀ ≈ (exp(2kb) − 2kb − 1) / (2k²),   b = h + 1.166
/// ARL₀ ≈ b²                              (k = 0)
/// ```
///
/// For small `a = 2kb` the numerator is summed as a series, which tends to
/// b² continuously as k → 0.
pub fn average_run_length(k: f64, h: f64) -> f64 {
    let b = h + SIEGMUND_CORRECTION;
    let a = 2.0 * k * b;
    if a < SERIES_THRESHOLD {
        // (a²/2 + a³/6 + a⁴/24) / (2k²)
        return b * b * (1.0 + a / 3.0 + a * a / 12.0);
    }
    (a.exp_m1() - a) / (2.0 * k * k)
}

/// Decision interval `h` giving a two-sided false-alarm rate of about `alpha`
/// per observation, i.e. a one-sided ARL₀ of 2/α.
///
/// # Errors
///
/// [`HotellingError::InvalidConfiguration`] if `alpha` is outside (0, 1) or
/// `k` is negative or not finite.
///
/// ```
/// use u_hotelling::detection::decision_interval;
///
/// let h = decision_interval(0.5, 0.0027).unwrap();
/// assert!((h - 4.767).abs() < 0.01);
/// ```
pub fn decision_interval(k: f64, alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(HotellingError::config(format!(
            "alpha must be in (0, 1), got {alpha}"
        )));
    }
    if !k.is_finite() || k < 0.0 {
        return Err(HotellingError::config(format!(
            "CUSUM slack k must be finite and non-negative, got {k}"
        )));
    }
    let target = 2.0 / alpha;
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    while average_run_length(k, hi) < target {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if average_run_length(k, mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Independent CUSUM parameters for each dimension of a multivariate series.
///
/// The per-dimension state (`Vec<CusumState>`) is owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiCusum {
    params: Vec<CusumParams>,
}

impl MultiCusum {
    pub fn new(params: Vec<CusumParams>) -> Self {
        Self { params }
    }

    /// One tracker per variable, targeting `mean` and standardized by the
    /// square roots of the diagonal of `covariance`.
    ///
    /// # Errors
    ///
    /// [`HotellingError::DimensionMismatch`] if the shapes disagree;
    /// [`HotellingError::InvalidConfiguration`] if a variance is not
    /// positive or the CUSUM parameters are invalid.
    pub fn from_reference(
        mean: &DVector<f64>,
        covariance: &DMatrix<f64>,
        config: &CusumConfig,
        alpha: f64,
    ) -> Result<Self> {
        let p = mean.len();
        if covariance.shape() != (p, p) {
            return Err(HotellingError::DimensionMismatch {
                expected: p,
                actual: covariance.nrows(),
            });
        }
        let params = (0..p)
            .map(|j| CusumParams::from_config(mean[j], covariance[(j, j)].sqrt(), config, alpha))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { params })
    }

    pub fn dim(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[CusumParams] {
        &self.params
    }

    /// A zeroed state per dimension.
    pub fn initial_state(&self) -> Vec<CusumState> {
        vec![CusumState::default(); self.params.len()]
    }

    /// Advances every dimension by one row.
    pub fn step(&self, state: &[CusumState], row: &[f64]) -> Result<(Vec<CusumState>, Vec<CusumStep>)> {
        for len in [state.len(), row.len()] {
            if len != self.dim() {
                return Err(HotellingError::DimensionMismatch {
                    expected: self.dim(),
                    actual: len,
                });
            }
        }
        Ok(self
            .params
            .iter()
            .zip(state)
            .zip(row)
            .map(|((params, &s), &x)| params.step(s, x))
            .unzip())
    }

    /// Runs each column of `x` through its tracker.
    ///
    /// Returns the final states and, per dimension, one step per row.
    pub fn run(
        &self,
        state: Vec<CusumState>,
        x: &ObservationMatrix,
    ) -> Result<(Vec<CusumState>, Vec<Vec<CusumStep>>)> {
        if x.n_vars() != self.dim() {
            return Err(HotellingError::DimensionMismatch {
                expected: self.dim(),
                actual: x.n_vars(),
            });
        }
        if state.len() != self.dim() {
            return Err(HotellingError::DimensionMismatch {
                expected: self.dim(),
                actual: state.len(),
            });
        }
        Ok(self
            .params
            .iter()
            .zip(state)
            .enumerate()
            .map(|(j, (params, s))| params.run(s, &x.column(j)))
            .unzip())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sums_stay_non_negative(
            data in proptest::collection::vec(-1e3_f64..1e3, 0..200),
            k in 0.0_f64..2.0,
        ) {
            let cusum = CusumParams::new(0.0, 1.0, k, 5.0).expect("valid");
            let (_, steps) = cusum.run(CusumState::default(), &data);
            for s in &steps {
                prop_assert!(s.s_upper >= 0.0 && s.s_lower >= 0.0);
            }
        }
    }
}
