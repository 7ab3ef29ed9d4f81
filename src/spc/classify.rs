//! Out-of-control classification.
//!
//! Pure functions: a charted value (or a CUSUM step) and its limits go in,
//! a [`Classification`] comes out. Limits are strict: a value exactly on a
//! limit is in control. Non-finite values are never flagged.

use serde::{Deserialize, Serialize};

use super::limits::ControlLimits;
use crate::detection::CusumStep;

/// In-control / out-of-control verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    InControl,
    OutOfControl,
}

/// Which limit or CUSUM side triggered an out-of-control verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breach {
    /// Above the upper control limit.
    AboveUpper,
    /// Below the lower control limit.
    BelowLower,
    /// Upper CUSUM exceeded its decision interval.
    CusumUpper,
    /// Lower CUSUM exceeded its decision interval.
    CusumLower,
    /// Both CUSUM sides alarmed on the same step.
    CusumBoth,
}

/// Classification of a single charted point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: Status,
    /// Present exactly when `status` is [`Status::OutOfControl`].
    pub breach: Option<Breach>,
}

impl Classification {
    pub const IN_CONTROL: Self = Self {
        status: Status::InControl,
        breach: None,
    };

    fn breached(breach: Breach) -> Self {
        Self {
            status: Status::OutOfControl,
            breach: Some(breach),
        }
    }

    pub fn is_out_of_control(&self) -> bool {
        self.status == Status::OutOfControl
    }

    /// Short symbol for renderers; empty when in control.
    pub fn marker(&self) -> &'static str {
        match self.breach {
            None => "",
            Some(Breach::AboveUpper) => "UCL",
            Some(Breach::BelowLower) => "LCL",
            Some(Breach::CusumUpper) => "C+",
            Some(Breach::CusumLower) => "C-",
            Some(Breach::CusumBoth) => "C±",
        }
    }
}

/// Anything with an upper limit and an optional lower limit.
pub trait Bounds {
    fn upper(&self) -> f64;
    fn lower(&self) -> Option<f64>;
}

impl Bounds for ControlLimits {
    fn upper(&self) -> f64 {
        self.ucl
    }

    fn lower(&self) -> Option<f64> {
        self.lcl
    }
}

/// Classifies `value` against `limits`.
///
/// # Examples
///
/// ```
/// use u_hotelling::config::HotellingConfig;
/// use u_hotelling::spc::{classify, control_limits, Breach};
///
/// let limits = control_limits(2, 20, &HotellingConfig::default()).unwrap();
/// let c = classify(limits.ucl + 1.0, &limits);
/// assert!(c.is_out_of_control());
/// assert_eq!(c.breach, Some(Breach::AboveUpper));
/// assert!(!classify(limits.cl, &limits).is_out_of_control());
/// ```
pub fn classify<B: Bounds + ?Sized>(value: f64, limits: &B) -> Classification {
    if value > limits.upper() {
        Classification::breached(Breach::AboveUpper)
    } else if limits.lower().is_some_and(|lcl| value < lcl) {
        Classification::breached(Breach::BelowLower)
    } else {
        Classification::IN_CONTROL
    }
}

/// Classifies a CUSUM step by which side alarmed.
pub fn classify_cusum(step: &CusumStep) -> Classification {
    match (step.upper_alarm, step.lower_alarm) {
        (true, true) => Classification::breached(Breach::CusumBoth),
        (true, false) => Classification::breached(Breach::CusumUpper),
        (false, true) => Classification::breached(Breach::CusumLower),
        (false, false) => Classification::IN_CONTROL,
    }
}
