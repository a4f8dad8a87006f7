use std::fmt::Write;

use crate::dashboard::DashboardView;
use crate::distribution::round_one_decimal;
use crate::grouping::CategoryCounts;
use crate::models::Viewer;
use crate::taxonomy::Category;

fn header_row(columns: &[Category], first: &str) -> String {
    let mut line = format!("| {first} |");
    for column in columns {
        let _ = write!(line, " {} |", column.label());
    }
    line.push_str(" Total |");
    line
}

fn divider_row(width: usize) -> String {
    let mut line = String::from("|");
    for _ in 0..width {
        line.push_str(" --- |");
    }
    line
}

fn counts_row(label: &str, columns: &[Category], counts: &CategoryCounts, total: u64) -> String {
    let mut line = format!("| {label} |");
    for column in columns {
        let _ = write!(line, " {} |", counts.get(*column));
    }
    let _ = write!(line, " {total} |");
    line
}

/// Describes the applied filter in one line, e.g. `grade 7, month October`.
pub fn describe_filter(view: &DashboardView) -> String {
    let filter = &view.filter;
    let parts: Vec<String> = [
        ("school year", &filter.school_year),
        ("grade", &filter.grade),
        ("section", &filter.section),
        ("month", &filter.month),
        ("week", &filter.week),
        ("category", &filter.category),
        ("source", &filter.source),
        ("search", &filter.search),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| format!("{name} {value}"))
    })
    .collect();

    if parts.is_empty() {
        "all records".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn build_report(view: &DashboardView, viewer: &Viewer, top_students: usize) -> String {
    let columns: Vec<Category> = view.policy.columns().collect();
    let mut output = String::new();

    let _ = writeln!(output, "# Monitored Records Report");
    let _ = writeln!(
        output,
        "Prepared for {} view ({}), {} matching records",
        viewer.role.title(),
        describe_filter(view),
        view.matched_records
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Frequency by Grade");

    if view.grades.is_empty() {
        let _ = writeln!(output, "No grades to report.");
    } else {
        let _ = writeln!(output, "{}", header_row(&columns, "Grade"));
        let _ = writeln!(output, "{}", divider_row(columns.len() + 2));
        for row in &view.grades {
            let label = format!("Grade {}", row.group_key);
            let _ = writeln!(output, "{}", counts_row(&label, &columns, &row.counts, row.total));
        }
        if let Some(totals) = &view.grand_total {
            let _ = writeln!(
                output,
                "{}",
                counts_row("**All grades**", &columns, &totals.counts, totals.total)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");
    let series = &view.series;
    if series.totals.iter().all(|total| *total == 0) {
        let _ = writeln!(output, "No records fall inside the trend buckets.");
    } else {
        let _ = writeln!(output, "{}", header_row(&columns, "Period"));
        let _ = writeln!(output, "{}", divider_row(columns.len() + 2));
        for (index, bucket) in series.buckets.iter().enumerate() {
            let total = series.totals.get(index).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            let mut line = format!("| {} |", bucket.label());
            for column in &columns {
                let value = series
                    .values(*column)
                    .and_then(|values| values.get(index))
                    .copied()
                    .unwrap_or(0);
                let _ = write!(line, " {value} |");
            }
            let _ = write!(line, " {total} |");
            let _ = writeln!(output, "{line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution");
    if view.distribution.iter().all(|slice| slice.value == 0) {
        let _ = writeln!(output, "No records to distribute.");
    } else {
        for slice in &view.distribution {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%)",
                slice.category.label(),
                slice.value,
                round_one_decimal(slice.percentage)
            );
        }
    }

    let mut students: Vec<_> = view.students.iter().collect();
    students.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.group_key.cmp(&b.group_key)));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students With Most Records");

    if students.is_empty() {
        let _ = writeln!(output, "No students with records for this filter.");
    } else {
        for row in students.iter().take(top_students) {
            let _ = writeln!(
                output,
                "- {} ({}): {} across {} categories",
                row.group_key.name,
                row.group_key.id,
                row.total,
                row.counts.iter().filter(|(_, count)| *count > 0).count()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::build_dashboard;
    use crate::filter::FilterState;
    use crate::models::{MonitoredRecord, RecordSource, StudentRef};
    use crate::policy::ViewerRole;
    use chrono::NaiveDate;

    fn record(name: &str, grade: u32, category: &str, sanction: bool) -> MonitoredRecord {
        MonitoredRecord {
            id: name.to_string(),
            student: StudentRef {
                id: format!("sid-{name}"),
                name: name.to_string(),
                grade,
                section: "Rizal".to_string(),
                school_year: "2024-2025".to_string(),
            },
            category: Some(Category::parse(category)),
            has_sanction: sanction,
            record_date: NaiveDate::from_ymd_opt(2024, 11, 18).unwrap(),
            source: RecordSource::Logbook,
        }
    }

    #[test]
    fn report_lists_grades_trend_and_shares() {
        let records = vec![
            record("Avery Lee", 7, "Absent", false),
            record("Jules Moreno", 8, "Offense", true),
        ];
        let viewer = Viewer::with_role(ViewerRole::Sso);
        let view = build_dashboard(&records, &FilterState::default(), &viewer, &[7, 8]);
        let report = build_report(&view, &viewer, 5);

        assert!(report.contains("Prepared for SSO view (all records), 2 matching records"));
        assert!(report.contains("| Grade | Absent | Tardy | Cutting Classes |"));
        assert!(report.contains("| Grade 8 |"));
        assert!(report.contains("| **All grades** |"));
        assert!(report.contains("| November |"));
        assert!(report.contains("- Absent: 1 (33.3%)"));
        assert!(report.contains("- Jules Moreno (sid-Jules Moreno): 2 across 2 categories"));
    }

    #[test]
    fn principal_report_drops_misbehavior_column() {
        let records = vec![record("Avery Lee", 7, "Misbehavior", false)];
        let viewer = Viewer::with_role(ViewerRole::Principal);
        let view = build_dashboard(&records, &FilterState::default(), &viewer, &[7]);
        let report = build_report(&view, &viewer, 5);

        assert!(!report.contains("Misbehavior"));
        assert!(report.contains("- Offense: 1 (100.0%)"));
    }

    #[test]
    fn empty_snapshot_reports_gracefully() {
        let viewer = Viewer::with_role(ViewerRole::Admin);
        let filter = FilterState::default().with_grade(9).with_month("May");
        let view = build_dashboard(&[], &filter, &viewer, &[]);
        let report = build_report(&view, &viewer, 5);

        assert!(report.contains("grade 9, month May"));
        assert!(report.contains("No records fall inside the trend buckets."));
        assert!(report.contains("No records to distribute."));
        assert!(report.contains("No students with records for this filter."));
    }
}
