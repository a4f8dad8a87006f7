use std::fmt;

use serde::{Deserialize, Serialize};

/// Monitored-record categories in display order.
///
/// The derived `Ord` follows declaration order, so any `BTreeMap` keyed by
/// `Category` iterates in the order tables and chart legends render columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Category {
    Absent,
    Tardy,
    CuttingClasses,
    ImproperUniform,
    Offense,
    Misbehavior,
    Clinic,
    RequestPermit,
    Sanction,
    Unknown,
}

pub const ALL_CATEGORIES: [Category; 10] = [
    Category::Absent,
    Category::Tardy,
    Category::CuttingClasses,
    Category::ImproperUniform,
    Category::Offense,
    Category::Misbehavior,
    Category::Clinic,
    Category::RequestPermit,
    Category::Sanction,
    Category::Unknown,
];

/// Categories that take part in the share view. `Unknown` is an overflow
/// bucket, not part of the declared taxonomy.
pub const DISTRIBUTION_CATEGORIES: [Category; 9] = [
    Category::Absent,
    Category::Tardy,
    Category::CuttingClasses,
    Category::ImproperUniform,
    Category::Offense,
    Category::Misbehavior,
    Category::Clinic,
    Category::RequestPermit,
    Category::Sanction,
];

impl Category {
    /// Lenient parse used for record data: case and whitespace are ignored,
    /// so `"Cutting Classes"`, `"cuttingclasses"` and `"CUTTING_CLASSES"` all
    /// land on the same key. Anything unrecognised becomes `Unknown`, and so
    /// does `"Sanction"`: that counter is fed by the sanction flag alone.
    pub fn parse(raw: &str) -> Category {
        match Self::lookup(raw) {
            Some(Category::Sanction) | None => Category::Unknown,
            Some(category) => category,
        }
    }

    /// Strict variant for filter values, where an unrecognised name must not
    /// silently collapse into the overflow bucket.
    pub fn lookup(raw: &str) -> Option<Category> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        let category = match key.as_str() {
            "absent" => Category::Absent,
            "tardy" => Category::Tardy,
            "cuttingclasses" => Category::CuttingClasses,
            "improperuniform" => Category::ImproperUniform,
            "offense" => Category::Offense,
            "misbehavior" => Category::Misbehavior,
            "clinic" => Category::Clinic,
            "requestpermit" => Category::RequestPermit,
            "sanction" => Category::Sanction,
            "unknown" => Category::Unknown,
            _ => return None,
        };
        Some(category)
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::Absent => "Absent",
            Category::Tardy => "Tardy",
            Category::CuttingClasses => "CuttingClasses",
            Category::ImproperUniform => "ImproperUniform",
            Category::Offense => "Offense",
            Category::Misbehavior => "Misbehavior",
            Category::Clinic => "Clinic",
            Category::RequestPermit => "RequestPermit",
            Category::Sanction => "Sanction",
            Category::Unknown => "Unknown",
        }
    }

    /// Human label used by column headers.
    pub fn label(self) -> &'static str {
        match self {
            Category::CuttingClasses => "Cutting Classes",
            Category::ImproperUniform => "Improper Uniform",
            Category::RequestPermit => "Request Permit",
            other => other.key(),
        }
    }
}

/// Counter keys in serialized output name every category, `Sanction` included.
impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::lookup(&value).unwrap_or(Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_case_and_spacing() {
        assert_eq!(Category::parse("Cutting Classes"), Category::CuttingClasses);
        assert_eq!(Category::parse("improperuniform"), Category::ImproperUniform);
        assert_eq!(Category::parse("REQUEST_PERMIT"), Category::RequestPermit);
        assert_eq!(Category::parse(" Absent "), Category::Absent);
    }

    #[test]
    fn unrecognised_names_fall_into_unknown() {
        assert_eq!(Category::parse("Vandalism"), Category::Unknown);
        assert_eq!(Category::parse(""), Category::Unknown);
        assert_eq!(Category::lookup("Vandalism"), None);
    }

    #[test]
    fn sanction_is_not_a_record_category() {
        assert_eq!(Category::parse("Sanction"), Category::Unknown);
        assert_eq!(Category::lookup("sanction"), Some(Category::Sanction));
        let key: Category = serde_json::from_str("\"Sanction\"").unwrap();
        assert_eq!(key, Category::Sanction);
    }

    #[test]
    fn ordering_matches_display_order() {
        let mut shuffled = vec![
            Category::Sanction,
            Category::Absent,
            Category::Misbehavior,
            Category::Offense,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                Category::Absent,
                Category::Offense,
                Category::Misbehavior,
                Category::Sanction
            ]
        );
    }

    #[test]
    fn deserializes_from_labels() {
        let parsed: Vec<Category> =
            serde_json::from_str(r#"["Improper Uniform", "Tardy", "bogus"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Category::ImproperUniform, Category::Tardy, Category::Unknown]
        );
        assert_eq!(
            serde_json::to_string(&Category::CuttingClasses).unwrap(),
            "\"CuttingClasses\""
        );
    }

    #[test]
    fn distribution_subset_excludes_overflow() {
        assert!(!DISTRIBUTION_CATEGORIES.contains(&Category::Unknown));
        assert_eq!(DISTRIBUTION_CATEGORIES.len() + 1, ALL_CATEGORIES.len());
    }
}
