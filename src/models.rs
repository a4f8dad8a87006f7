use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::grouping::CategoryCounts;
use crate::policy::ViewerRole;
use crate::taxonomy::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    pub name: String,
    pub grade: u32,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub school_year: String,
}

/// Where a record was logged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Logbook,
    Complaint,
    #[default]
    Unspecified,
}

impl RecordSource {
    /// Parses a filter value. `None` means the value names no source at all.
    pub fn lookup(raw: &str) -> Option<RecordSource> {
        match raw.trim().to_lowercase().as_str() {
            "logbook" | "log book" | "1" => Some(RecordSource::Logbook),
            "complaint" | "2" => Some(RecordSource::Complaint),
            "unspecified" | "n/a" | "na" | "0" => Some(RecordSource::Unspecified),
            _ => None,
        }
    }
}

/// Accepts the same labels and numeric codes as [`RecordSource::lookup`];
/// anything else, null included, is `Unspecified`.
impl<'de> Deserialize<'de> for RecordSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = lenient::opt_string(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(RecordSource::lookup)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredRecord {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(alias = "studentRef")]
    pub student: StudentRef,
    #[serde(default, deserialize_with = "lenient::record_category")]
    pub category: Option<Category>,
    #[serde(default)]
    pub has_sanction: bool,
    pub record_date: NaiveDate,
    #[serde(default)]
    pub source: RecordSource,
}

impl MonitoredRecord {
    /// The category counter this record bumps. Missing categories are counted
    /// as `Unknown` so per-row sums reconcile with the record count.
    pub fn counted_category(&self) -> Category {
        self.category.unwrap_or(Category::Unknown)
    }
}

/// The person looking at the aggregates. Advisers carry their own class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub role: ViewerRole,
    #[serde(default)]
    pub grade: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
}

impl Viewer {
    pub fn with_role(role: ViewerRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow<K> {
    pub group_key: K,
    pub counts: CategoryCounts,
    pub total: u64,
}

/// Grouping key for the per-student summary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentKey {
    pub name: String,
    pub id: String,
}

impl StudentKey {
    pub fn of(record: &MonitoredRecord) -> Self {
        Self {
            name: record.student.name.clone(),
            id: record.student.id.clone(),
        }
    }
}

/// Upstream payloads mix numeric and string ids and filter values; both are
/// accepted and kept as text.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    use crate::taxonomy::Category;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    impl Raw {
        fn into_string(self) -> String {
            match self {
                Raw::Int(value) => value.to_string(),
                Raw::Float(value) => value.to_string(),
                Raw::Text(value) => value,
            }
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Raw::deserialize(deserializer).map(Raw::into_string)
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Raw>::deserialize(deserializer)?.map(Raw::into_string))
    }

    /// Record categories go through [`Category::parse`], so a `"Sanction"`
    /// label never feeds the flag-driven counter.
    pub fn record_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_string(deserializer)?.map(|raw| Category::parse(&raw)))
    }
}
