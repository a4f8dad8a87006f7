use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{lenient, MonitoredRecord, RecordSource};
use crate::taxonomy::Category;

/// Filter selections as the host sends them. Every field is optional and kept
/// as raw text; interpretation happens once, in [`RecordPredicate::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub school_year: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub section: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub week: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub search: Option<String>,
}

impl FilterState {
    pub fn with_school_year(mut self, value: impl Into<String>) -> Self {
        self.school_year = Some(value.into());
        self
    }

    pub fn with_grade(mut self, value: impl ToString) -> Self {
        self.grade = Some(value.to_string());
        self
    }

    pub fn with_section(mut self, value: impl Into<String>) -> Self {
        self.section = Some(value.into());
        self
    }

    pub fn with_month(mut self, value: impl ToString) -> Self {
        self.month = Some(value.to_string());
        self
    }

    pub fn with_week(mut self, value: impl ToString) -> Self {
        self.week = Some(value.to_string());
        self
    }

    pub fn with_category(mut self, value: impl Into<String>) -> Self {
        self.category = Some(value.into());
        self
    }

    pub fn with_source(mut self, value: impl Into<String>) -> Self {
        self.source = Some(value.into());
        self
    }

    pub fn with_search(mut self, value: impl Into<String>) -> Self {
        self.search = Some(value.into());
        self
    }

    /// The selected month as 1..=12, when one is set and readable.
    pub fn month_number(&self) -> Option<u32> {
        present(&self.month).and_then(parse_month)
    }

    pub fn grade_number(&self) -> Option<u32> {
        present(&self.grade).and_then(|raw| raw.parse().ok())
    }

    pub fn has_month(&self) -> bool {
        present(&self.month).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    SchoolYear(String),
    Grade(u32),
    Section(String),
    Month(u32),
    Week(u32),
    Category(Category),
    Source(RecordSource),
    Search(String),
    Never,
}

impl Term {
    fn matches(&self, record: &MonitoredRecord) -> bool {
        match self {
            Term::SchoolYear(year) => record.student.school_year == *year,
            Term::Grade(grade) => record.student.grade == *grade,
            Term::Section(section) => record.student.section.to_lowercase() == *section,
            Term::Month(month) => record.record_date.month() == *month,
            Term::Week(week) => week_of_month(record.record_date.day()) == *week,
            Term::Category(Category::Sanction) => record.has_sanction,
            Term::Category(category) => record.counted_category() == *category,
            Term::Source(source) => record.source == *source,
            Term::Search(query) => {
                record.student.name.to_lowercase().contains(query.as_str())
                    || record.student.id.to_lowercase().contains(query.as_str())
            }
            Term::Never => false,
        }
    }
}

/// Conjunction of the constraints a [`FilterState`] sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPredicate {
    terms: Vec<Term>,
}

impl RecordPredicate {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn build(filter: &FilterState) -> Self {
        let mut terms = Vec::new();

        if let Some(year) = present(&filter.school_year) {
            terms.push(Term::SchoolYear(year.to_string()));
        }

        if let Some(raw) = present(&filter.grade) {
            terms.push(raw.parse().map(Term::Grade).unwrap_or(Term::Never));
        }

        if let Some(section) = present(&filter.section) {
            terms.push(Term::Section(section.to_lowercase()));
        }

        // Week only narrows inside a month; on its own it is ignored.
        if let Some(raw) = present(&filter.month) {
            terms.push(parse_month(raw).map(Term::Month).unwrap_or(Term::Never));

            if let Some(raw) = present(&filter.week) {
                let week = raw.parse::<u32>().ok().filter(|week| (1..=5).contains(week));
                terms.push(week.map(Term::Week).unwrap_or(Term::Never));
            }
        }

        if let Some(raw) = present(&filter.category) {
            terms.push(Category::lookup(raw).map(Term::Category).unwrap_or(Term::Never));
        }

        if let Some(raw) = present(&filter.source) {
            if !raw.eq_ignore_ascii_case("all") {
                terms.push(RecordSource::lookup(raw).map(Term::Source).unwrap_or(Term::Never));
            }
        }

        if let Some(query) = present(&filter.search) {
            terms.push(Term::Search(query.to_lowercase()));
        }

        debug!(
            terms = terms.len(),
            never = terms.contains(&Term::Never),
            "compiled record predicate"
        );

        Self { terms }
    }

    pub fn matches(&self, record: &MonitoredRecord) -> bool {
        self.terms.iter().all(|term| term.matches(record))
    }

    pub fn is_identity(&self) -> bool {
        self.terms.is_empty()
    }

    /// True when some filter value was unreadable, so nothing can match.
    pub fn matches_nothing(&self) -> bool {
        self.terms.contains(&Term::Never)
    }
}

/// Closure form of [`RecordPredicate::build`].
pub fn build(filter: &FilterState) -> impl Fn(&MonitoredRecord) -> bool {
    let predicate = RecordPredicate::build(filter);
    move |record: &MonitoredRecord| predicate.matches(record)
}

/// Week of the month as `ceil(day / 7)`, so days 29..=31 are week 5.
pub fn week_of_month(day: u32) -> u32 {
    day.div_ceil(7)
}

/// Accepts 1..=12 or an English month name, full or abbreviated.
pub fn parse_month(raw: &str) -> Option<u32> {
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok().filter(|month| (1..=12).contains(month));
    }
    chrono::Month::from_str(raw)
        .ok()
        .map(|month| month.number_from_month())
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
