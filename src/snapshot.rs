use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;

use crate::models::{MonitoredRecord, RecordSource, StudentRef};
use crate::taxonomy::Category;

/// Loads a record snapshot. `.csv` files use flat columns; anything else is
/// read as a JSON array in the fetch layer's record shape.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<MonitoredRecord>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        load_csv(path)?
    } else {
        load_json(path)?
    };

    info!(count = records.len(), path = %path.display(), "loaded record snapshot");
    Ok(records)
}

pub fn load_json(path: &Path) -> anyhow::Result<Vec<MonitoredRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_json(&raw).with_context(|| format!("failed to parse records in {}", path.display()))
}

pub fn parse_json(raw: &str) -> anyhow::Result<Vec<MonitoredRecord>> {
    Ok(serde_json::from_str(raw)?)
}

pub fn load_csv(path: &Path) -> anyhow::Result<Vec<MonitoredRecord>> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_csv(reader)
}

#[derive(serde::Deserialize)]
struct CsvRow {
    id: String,
    student_id: String,
    student_name: String,
    grade: u32,
    #[serde(default)]
    section: String,
    #[serde(default)]
    school_year: String,
    category: Option<String>,
    has_sanction: Option<bool>,
    record_date: NaiveDate,
    source: Option<String>,
}

impl From<CsvRow> for MonitoredRecord {
    fn from(row: CsvRow) -> Self {
        MonitoredRecord {
            id: row.id,
            student: StudentRef {
                id: row.student_id,
                name: row.student_name,
                grade: row.grade,
                section: row.section,
                school_year: row.school_year,
            },
            category: row
                .category
                .filter(|value| !value.trim().is_empty())
                .map(|value| Category::parse(&value)),
            has_sanction: row.has_sanction.unwrap_or(false),
            record_date: row.record_date,
            source: row
                .source
                .as_deref()
                .and_then(RecordSource::lookup)
                .unwrap_or_default(),
        }
    }
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<MonitoredRecord>> {
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid record on csv row {}", index + 1))?;
        records.push(MonitoredRecord::from(row));
    }

    Ok(records)
}
