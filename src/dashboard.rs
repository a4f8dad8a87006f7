use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::{build_distribution, DistributionSlice};
use crate::filter::{FilterState, RecordPredicate};
use crate::grouping::{group_by_grade, group_by_student, GroupOptions, TotalsRow};
use crate::models::{AggregateRow, MonitoredRecord, StudentKey, Viewer};
use crate::policy::RolePolicy;
use crate::series::{build_series, Granularity, TimeSeries};

/// Everything the dashboard and record screens derive from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// The filter after role scoping, as actually applied.
    pub filter: FilterState,
    pub policy: RolePolicy,
    pub matched_records: usize,
    pub grades: Vec<AggregateRow<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grand_total: Option<TotalsRow>,
    pub students: Vec<AggregateRow<StudentKey>>,
    pub series: TimeSeries,
    pub distribution: Vec<DistributionSlice>,
}

/// Recomputes every view from scratch. Nothing is cached between calls.
///
/// A selected grade narrows the grade table to that single row; with no grade
/// selected every grade in `grade_universe` is listed and a grand total row
/// is added. The distribution is taken over the grade rows shown.
pub fn build_dashboard(
    records: &[MonitoredRecord],
    filter: &FilterState,
    viewer: &Viewer,
    grade_universe: &[u32],
) -> DashboardView {
    let policy = RolePolicy::resolve(viewer.role);
    let scoped = policy.scope_filter(filter, viewer);
    let predicate = RecordPredicate::build(&scoped);
    let matches = |record: &MonitoredRecord| predicate.matches(record);

    let (grades, options) = match scoped.grade_number() {
        Some(grade) => (vec![grade], GroupOptions::default()),
        None => (
            grade_universe.to_vec(),
            GroupOptions {
                include_grand_total: true,
            },
        ),
    };

    let matched_records = records.iter().filter(|record| matches(record)).count();
    let grade_table = group_by_grade(records, matches, &grades, &policy, options);
    let students = group_by_student(records, matches, &policy);
    let series = build_series(records, matches, Granularity::for_filter(&scoped), &policy);
    let distribution = build_distribution(&grade_table.rows, &policy);

    debug!(
        role = viewer.role.code(),
        matched_records,
        grade_rows = grade_table.rows.len(),
        student_rows = students.len(),
        "built dashboard view"
    );

    DashboardView {
        filter: scoped,
        policy,
        matched_records,
        grades: grade_table.rows,
        grand_total: grade_table.grand_total,
        students,
        series,
        distribution,
    }
}
