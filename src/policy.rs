use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::FilterState;
use crate::grouping::CategoryCounts;
use crate::models::{RecordSource, Viewer};
use crate::taxonomy::{Category, ALL_CATEGORIES};

/// Account types as the school's user table numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ViewerRole {
    #[default]
    Sso,
    Principal,
    Adviser,
    Admin,
    Teacher,
    Guidance,
    Other(i64),
}

impl ViewerRole {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ViewerRole::Sso,
            2 => ViewerRole::Principal,
            3 => ViewerRole::Adviser,
            4 => ViewerRole::Admin,
            5 => ViewerRole::Teacher,
            6 => ViewerRole::Guidance,
            other => ViewerRole::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ViewerRole::Sso => 1,
            ViewerRole::Principal => 2,
            ViewerRole::Adviser => 3,
            ViewerRole::Admin => 4,
            ViewerRole::Teacher => 5,
            ViewerRole::Guidance => 6,
            ViewerRole::Other(code) => code,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewerRole::Sso => "SSO",
            ViewerRole::Principal => "Principal",
            ViewerRole::Adviser => "Adviser",
            ViewerRole::Admin => "Admin",
            ViewerRole::Teacher => "Teacher",
            ViewerRole::Guidance => "Guidance",
            ViewerRole::Other(_) => "Unknown",
        }
    }
}

impl From<i64> for ViewerRole {
    fn from(code: i64) -> Self {
        ViewerRole::from_code(code)
    }
}

impl From<ViewerRole> for i64 {
    fn from(role: ViewerRole) -> Self {
        role.code()
    }
}

#[derive(Debug, Clone, Copy)]
enum RuleKind {
    MergeInto { from: Category, into: Category },
    PinClass,
    DefaultSource(RecordSource),
}

#[derive(Debug, Clone, Copy)]
struct RoleRule {
    role: ViewerRole,
    kind: RuleKind,
}

const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        role: ViewerRole::Principal,
        kind: RuleKind::MergeInto {
            from: Category::Misbehavior,
            into: Category::Offense,
        },
    },
    RoleRule {
        role: ViewerRole::Adviser,
        kind: RuleKind::PinClass,
    },
    RoleRule {
        role: ViewerRole::Teacher,
        kind: RuleKind::DefaultSource(RecordSource::Complaint),
    },
    RoleRule {
        role: ViewerRole::Guidance,
        kind: RuleKind::DefaultSource(RecordSource::Complaint),
    },
];

/// What a viewer role does to aggregates: which categories fold into which,
/// which columns remain, and how the role narrows the filter it starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicy {
    pub merged_categories: BTreeMap<Category, Category>,
    pub visible_categories: BTreeSet<Category>,
    pub class_scoped: bool,
    pub default_source: Option<RecordSource>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::identity()
    }
}

impl RolePolicy {
    pub fn identity() -> Self {
        Self {
            merged_categories: BTreeMap::new(),
            visible_categories: ALL_CATEGORIES.into_iter().collect(),
            class_scoped: false,
            default_source: None,
        }
    }

    /// Looks the role up in the rule table. Roles without rules, including
    /// codes nobody recognises, get the identity policy.
    pub fn resolve(role: ViewerRole) -> Self {
        let mut policy = Self::identity();

        for rule in ROLE_RULES.iter().filter(|rule| rule.role == role) {
            match rule.kind {
                RuleKind::MergeInto { from, into } => {
                    policy.merged_categories.insert(from, into);
                    policy.visible_categories.remove(&from);
                }
                RuleKind::PinClass => policy.class_scoped = true,
                RuleKind::DefaultSource(source) => policy.default_source = Some(source),
            }
        }

        debug!(
            role = role.code(),
            merges = policy.merged_categories.len(),
            class_scoped = policy.class_scoped,
            "resolved role policy"
        );
        policy
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn is_visible(&self, category: Category) -> bool {
        self.visible_categories.contains(&category)
    }

    /// Visible categories in display order.
    pub fn columns(&self) -> impl Iterator<Item = Category> + '_ {
        self.visible_categories.iter().copied()
    }

    pub fn merge_target(&self, category: Category) -> Category {
        self.merged_categories
            .get(&category)
            .copied()
            .unwrap_or(category)
    }

    /// Folds merged categories into their targets and drops hidden columns.
    /// A second application finds nothing left to fold.
    pub fn apply(&self, counts: &mut CategoryCounts) {
        for (&from, &into) in &self.merged_categories {
            counts.merge_into(from, into);
        }
        counts.retain(|category| self.is_visible(category));
    }

    /// The filter a viewer actually gets. Advisers are pinned to their own
    /// class; roles with a default source start there when none is chosen.
    pub fn scope_filter(&self, filter: &FilterState, viewer: &Viewer) -> FilterState {
        let mut scoped = filter.clone();

        if self.class_scoped {
            if let Some(grade) = viewer.grade {
                scoped.grade = Some(grade.to_string());
            }
            if let Some(section) = &viewer.section {
                scoped.section = Some(section.clone());
            }
            if let Some(year) = &viewer.school_year {
                scoped.school_year = Some(year.clone());
            }
        }

        if let Some(source) = self.default_source {
            if scoped.source.as_deref().map_or(true, |raw| raw.trim().is_empty()) {
                scoped.source = Some(source_label(source).to_string());
            }
        }

        scoped
    }
}

/// Shorthand for `RolePolicy::resolve(ViewerRole::from_code(code))`.
pub fn resolve(code: i64) -> RolePolicy {
    RolePolicy::resolve(ViewerRole::from_code(code))
}

fn source_label(source: RecordSource) -> &'static str {
    match source {
        RecordSource::Logbook => "logbook",
        RecordSource::Complaint => "complaint",
        RecordSource::Unspecified => "unspecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(Category, u64)]) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for &(category, value) in pairs {
            counts.add(category, value);
        }
        counts
    }

    #[test]
    fn principal_merges_misbehavior_into_offense() {
        let policy = RolePolicy::resolve(ViewerRole::Principal);
        let mut row = counts(&[(Category::Offense, 2), (Category::Misbehavior, 3)]);
        policy.apply(&mut row);

        assert_eq!(row.get(Category::Offense), 5);
        assert!(!row.contains(Category::Misbehavior));
        assert!(!policy.is_visible(Category::Misbehavior));
        assert_eq!(policy.merge_target(Category::Misbehavior), Category::Offense);
    }

    #[test]
    fn merge_is_idempotent() {
        let policy = resolve(2);
        let mut once = counts(&[
            (Category::Offense, 1),
            (Category::Misbehavior, 4),
            (Category::Absent, 2),
        ]);
        policy.apply(&mut once);
        let mut twice = once.clone();
        policy.apply(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn other_roles_get_identity() {
        for code in [1, 3, 4, 5, 6, 42, -1] {
            let policy = resolve(code);
            assert!(policy.merged_categories.is_empty(), "role {code}");
            assert!(policy.is_visible(Category::Misbehavior), "role {code}");
        }
        assert!(resolve(1).is_identity());
        assert!(resolve(99).is_identity());
    }

    #[test]
    fn role_codes_round_trip_through_json() {
        let role: ViewerRole = serde_json::from_str("3").unwrap();
        assert_eq!(role, ViewerRole::Adviser);
        assert_eq!(serde_json::to_string(&ViewerRole::Other(9)).unwrap(), "9");
        assert_eq!(ViewerRole::Other(9).title(), "Unknown");
    }

    #[test]
    fn adviser_is_pinned_to_own_class() {
        let viewer = Viewer {
            role: ViewerRole::Adviser,
            grade: Some(8),
            section: Some("Mabini".to_string()),
            school_year: Some("2024-2025".to_string()),
        };
        let policy = RolePolicy::resolve(viewer.role);
        let requested = FilterState::default().with_grade(10).with_month("May");
        let scoped = policy.scope_filter(&requested, &viewer);

        assert_eq!(scoped.grade.as_deref(), Some("8"));
        assert_eq!(scoped.section.as_deref(), Some("Mabini"));
        assert_eq!(scoped.school_year.as_deref(), Some("2024-2025"));
        assert_eq!(scoped.month.as_deref(), Some("May"));
    }

    #[test]
    fn teachers_default_to_complaints_only_when_unset() {
        let viewer = Viewer::with_role(ViewerRole::Teacher);
        let policy = RolePolicy::resolve(viewer.role);

        let scoped = policy.scope_filter(&FilterState::default(), &viewer);
        assert_eq!(scoped.source.as_deref(), Some("complaint"));

        let chosen = FilterState::default().with_source("logbook");
        let kept = policy.scope_filter(&chosen, &viewer);
        assert_eq!(kept.source.as_deref(), Some("logbook"));

        let everything = FilterState::default().with_source("All");
        assert_eq!(
            policy.scope_filter(&everything, &viewer).source.as_deref(),
            Some("All")
        );
    }
}
