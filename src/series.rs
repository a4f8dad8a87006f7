use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::filter::FilterState;
use crate::grouping::{group, GroupOptions, GroupUniverse};
use crate::models::MonitoredRecord;
use crate::policy::RolePolicy;
use crate::taxonomy::Category;

/// School-year months, August through May.
pub const ACADEMIC_MONTHS: [u32; 10] = [8, 9, 10, 11, 12, 1, 2, 3, 4, 5];

/// Day buckets are never clamped to the month's length.
pub const DAYS_PER_MONTH_BUCKETS: u32 = 31;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Day,
}

impl Granularity {
    /// Days once a month is selected, academic months otherwise.
    pub fn for_filter(filter: &FilterState) -> Self {
        if filter.has_month() {
            Granularity::Day
        } else {
            Granularity::Month
        }
    }

    pub fn buckets(self) -> Vec<TimeBucket> {
        match self {
            Granularity::Month => ACADEMIC_MONTHS.into_iter().map(TimeBucket::Month).collect(),
            Granularity::Day => (1..=DAYS_PER_MONTH_BUCKETS).map(TimeBucket::Day).collect(),
        }
    }

    pub fn bucket_of(self, record: &MonitoredRecord) -> TimeBucket {
        match self {
            Granularity::Month => TimeBucket::Month(record.record_date.month()),
            Granularity::Day => TimeBucket::Day(record.record_date.day()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Month(u32),
    Day(u32),
}

impl TimeBucket {
    pub fn label(self) -> String {
        match self {
            TimeBucket::Month(month) => month_name(month).to_string(),
            TimeBucket::Day(day) => day.to_string(),
        }
    }
}

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub buckets: Vec<TimeBucket>,
    /// One value per bucket for each visible category, keyed in display order.
    pub series: BTreeMap<Category, Vec<u64>>,
    pub totals: Vec<u64>,
}

impl TimeSeries {
    pub fn values(&self, category: Category) -> Option<&[u64]> {
        self.series.get(&category).map(Vec::as_slice)
    }

    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(|bucket| bucket.label()).collect()
    }
}

/// Trend series over fixed buckets. Every bucket is present even when empty;
/// records dated outside the bucket set (June and July by month) are skipped.
pub fn build_series<P>(
    records: &[MonitoredRecord],
    predicate: P,
    granularity: Granularity,
    policy: &RolePolicy,
) -> TimeSeries
where
    P: Fn(&MonitoredRecord) -> bool,
{
    let buckets = granularity.buckets();
    let grouping = group(
        records,
        predicate,
        &GroupUniverse::Fixed(buckets.clone()),
        |record| granularity.bucket_of(record),
        policy,
        GroupOptions::default(),
    );

    let series: BTreeMap<Category, Vec<u64>> = policy
        .columns()
        .map(|category| {
            let values: Vec<u64> = grouping
                .rows
                .iter()
                .map(|row| row.counts.get(category))
                .collect();
            (category, values)
        })
        .collect();
    let totals: Vec<u64> = grouping.rows.iter().map(|row| row.total).collect();

    TimeSeries {
        granularity,
        buckets,
        series,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordSource, StudentRef};
    use crate::policy::ViewerRole;
    use chrono::NaiveDate;

    fn record(date: (i32, u32, u32), category: &str, sanction: bool) -> MonitoredRecord {
        MonitoredRecord {
            id: format!("{}-{}-{}", date.0, date.1, date.2),
            student: StudentRef {
                id: "s-1".to_string(),
                name: "Kiara Patel".to_string(),
                grade: 9,
                section: "Mabini".to_string(),
                school_year: "2024-2025".to_string(),
            },
            category: Some(Category::parse(category)),
            has_sanction: sanction,
            record_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            source: RecordSource::Complaint,
        }
    }

    #[test]
    fn month_buckets_follow_academic_order() {
        let records = vec![
            record((2024, 8, 20), "Absent", false),
            record((2025, 1, 9), "Absent", true),
            record((2024, 10, 3), "Tardy", false),
        ];
        let series = build_series(&records, |_| true, Granularity::Month, &RolePolicy::identity());

        assert_eq!(series.buckets.len(), 10);
        assert_eq!(series.buckets[0], TimeBucket::Month(8));
        assert_eq!(series.buckets[9], TimeBucket::Month(5));
        assert_eq!(series.labels()[5], "January");

        let absent = series.values(Category::Absent).unwrap();
        assert_eq!(absent, &[1, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        let september = series.buckets.iter().position(|b| *b == TimeBucket::Month(9)).unwrap();
        assert!(series.series.values().all(|values| values[september] == 0));
        assert_eq!(series.totals[5], 2);
    }

    #[test]
    fn summer_records_fall_outside_month_buckets() {
        let records = vec![record((2025, 6, 15), "Clinic", false)];
        let series = build_series(&records, |_| true, Granularity::Month, &RolePolicy::identity());
        assert!(series.totals.iter().all(|total| *total == 0));
    }

    #[test]
    fn day_buckets_span_thirty_one_days() {
        let records = vec![
            record((2025, 2, 3), "Tardy", false),
            record((2025, 2, 3), "Tardy", false),
            record((2025, 2, 28), "Clinic", false),
        ];
        let series = build_series(&records, |_| true, Granularity::Day, &RolePolicy::identity());

        assert_eq!(series.buckets.len(), 31);
        assert_eq!(series.values(Category::Tardy).unwrap()[2], 2);
        assert_eq!(series.values(Category::Clinic).unwrap()[27], 1);
        assert_eq!(series.totals[29], 0);
        assert_eq!(series.totals[30], 0);
    }

    #[test]
    fn merge_applies_per_bucket_and_keeps_order() {
        let records = vec![
            record((2024, 11, 5), "Misbehavior", false),
            record((2024, 11, 6), "Offense", true),
        ];
        let policy = RolePolicy::resolve(ViewerRole::Principal);
        let series = build_series(&records, |_| true, Granularity::Month, &policy);

        assert!(series.values(Category::Misbehavior).is_none());
        let november = 3;
        assert_eq!(series.values(Category::Offense).unwrap()[november], 2);
        assert_eq!(series.totals[november], 3);

        let legend: Vec<Category> = series.series.keys().copied().collect();
        let expected: Vec<Category> = policy.columns().collect();
        assert_eq!(legend, expected);
        assert_eq!(legend.first(), Some(&Category::Absent));
    }

    #[test]
    fn granularity_tracks_month_selection() {
        assert_eq!(Granularity::for_filter(&FilterState::default()), Granularity::Month);
        let filter = FilterState::default().with_month("March");
        assert_eq!(Granularity::for_filter(&filter), Granularity::Day);
    }

    #[test]
    fn month_names_are_english() {
        assert_eq!(month_name(8), "August");
        assert_eq!(month_name(0), "Unknown");
        assert_eq!(month_name(13), "Unknown");
    }
}
