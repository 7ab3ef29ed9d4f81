//! Independent processing of many groups.
//!
//! Each task reads only its own observations and the shared configuration,
//! so tasks run in parallel with rayon. A failing group is recorded in the
//! error list and never aborts the others; an invalid configuration fails
//! the whole call before any group is touched.

use serde::{Serialize, Serializer};

use rayon::prelude::*;

use crate::config::HotellingConfig;
use crate::data::ObservationMatrix;
use crate::error::{HotellingError, Result};
use crate::spc::{t2_chart, ChartReference, T2Chart};
use crate::t2::{hotelling_t2, T2Result, TestMode};

/// One unit of work, selected once per group.
#[derive(Debug, Clone, Copy)]
pub enum GroupTask<'a> {
    /// A one- or two-sample hypothesis test.
    Test(TestMode<'a>),
    /// A T² chart over the group's rows.
    Chart {
        data: &'a ObservationMatrix,
        reference: ChartReference<'a>,
    },
}

/// Output of a successful task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum GroupOutcome {
    Test(T2Result),
    Chart(T2Chart),
}

/// A successful group, by position in the task list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResult {
    pub group: usize,
    pub outcome: GroupOutcome,
}

/// A failed group, by position in the task list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupError {
    pub group: usize,
    /// Serialized as its message.
    #[serde(serialize_with = "serialize_display")]
    pub error: HotellingError,
}

/// Partial results plus per-group errors, both in task order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchReport {
    pub results: Vec<GroupResult>,
    pub errors: Vec<GroupError>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// The result for `group`, if it succeeded.
    pub fn get(&self, group: usize) -> Option<&GroupOutcome> {
        self.results
            .iter()
            .find(|r| r.group == group)
            .map(|r| &r.outcome)
    }
}

/// Runs every task in parallel.
///
/// # Errors
///
/// [`HotellingError::InvalidConfiguration`] if `config` is invalid. Errors
/// of individual groups are returned inside the report.
///
/// # Examples
///
/// ```
/// use u_hotelling::batch::{process_groups, GroupTask};
/// use u_hotelling::config::HotellingConfig;
/// use u_hotelling::data::ObservationMatrix;
/// use u_hotelling::t2::TestMode;
///
/// let good = ObservationMatrix::from_rows(&[[1.0, 2.0], [2.0, 1.0], [3.0, 3.5], [2.5, 2.0]]).unwrap();
/// let tiny = ObservationMatrix::from_rows(&[[1.0, 2.0]]).unwrap();
/// let tasks = [
///     GroupTask::Test(TestMode::OneSample { sample: &good, reference: &[0.0, 0.0] }),
///     GroupTask::Test(TestMode::OneSample { sample: &tiny, reference: &[0.0, 0.0] }),
/// ];
/// let report = process_groups(&tasks, &HotellingConfig::default()).unwrap();
/// assert_eq!(report.results.len(), 1);
/// assert_eq!(report.errors[0].group, 1);
/// ```
pub fn process_groups(tasks: &[GroupTask<'_>], config: &HotellingConfig) -> Result<BatchReport> {
    config.validate()?;

    let outcomes: Vec<(usize, Result<GroupOutcome>)> = tasks
        .par_iter()
        .enumerate()
        .map(|(group, task)| (group, run_task(task, config)))
        .collect();

    let mut report = BatchReport::default();
    for (group, outcome) in outcomes {
        match outcome {
            Ok(outcome) => report.results.push(GroupResult { group, outcome }),
            Err(error) => {
                log::warn!("group {group} failed: {error}");
                report.errors.push(GroupError { group, error });
            }
        }
    }
    log::debug!(
        "processed {} groups: {} succeeded, {} failed",
        tasks.len(),
        report.results.len(),
        report.errors.len()
    );
    Ok(report)
}

/// Two-sample tests of each pair of groups.
pub fn compare_pairs(
    pairs: &[(ObservationMatrix, ObservationMatrix)],
    config: &HotellingConfig,
) -> Result<BatchReport> {
    let tasks: Vec<GroupTask<'_>> = pairs
        .iter()
        .map(|(first, second)| GroupTask::Test(TestMode::TwoSample { first, second }))
        .collect();
    process_groups(&tasks, config)
}

/// One T² chart per group, each with an estimated reference.
pub fn chart_groups(groups: &[ObservationMatrix], config: &HotellingConfig) -> Result<BatchReport> {
    let tasks: Vec<GroupTask<'_>> = groups
        .iter()
        .map(|data| GroupTask::Chart {
            data,
            reference: ChartReference::estimated(),
        })
        .collect();
    process_groups(&tasks, config)
}

fn serialize_display<S: Serializer>(
    error: &HotellingError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

fn run_task(task: &GroupTask<'_>, config: &HotellingConfig) -> Result<GroupOutcome> {
    match *task {
        GroupTask::Test(mode) => hotelling_t2(mode, config).map(GroupOutcome::Test),
        GroupTask::Chart { data, reference } => {
            t2_chart(data, &reference, config).map(GroupOutcome::Chart)
        }
    }
}
