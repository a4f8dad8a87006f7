use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AggregateRow, MonitoredRecord, StudentKey};
use crate::policy::RolePolicy;
use crate::taxonomy::{Category, ALL_CATEGORIES};

/// Per-category counters, iterated in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<Category, u64>);

impl CategoryCounts {
    /// Every category present at zero, so empty groups still render a full row.
    pub fn zeroed() -> Self {
        Self(ALL_CATEGORIES.into_iter().map(|category| (category, 0)).collect())
    }

    pub fn get(&self, category: Category) -> u64 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    pub fn add(&mut self, category: Category, amount: u64) {
        *self.0.entry(category).or_insert(0) += amount;
    }

    pub fn increment(&mut self, category: Category) {
        self.add(category, 1);
    }

    /// Counts one record: its category, plus `Sanction` when sanctioned.
    pub fn tally(&mut self, record: &MonitoredRecord) {
        self.increment(record.counted_category());
        if record.has_sanction {
            self.increment(Category::Sanction);
        }
    }

    /// Moves the `from` counter onto `into`. No-op once `from` is gone.
    pub fn merge_into(&mut self, from: Category, into: Category) {
        if from == into {
            return;
        }
        if let Some(amount) = self.0.remove(&from) {
            self.add(into, amount);
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(Category) -> bool) {
        self.0.retain(|category, _| keep(*category));
    }

    pub fn absorb(&mut self, other: &CategoryCounts) {
        for (&category, &amount) in &other.0 {
            self.add(category, amount);
        }
    }

    /// Sum of every counter present. After a policy has been applied only
    /// visible columns remain, and a sanctioned record contributes twice.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        self.0.iter().map(|(&category, &amount)| (category, amount))
    }
}

/// Which groups a grouping reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupUniverse<K> {
    /// Exactly these groups, in this order, whether or not records hit them.
    Fixed(Vec<K>),
    /// Whatever keys the filtered records produce, in key order.
    Observed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    pub include_grand_total: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsRow {
    pub counts: CategoryCounts,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouping<K> {
    pub rows: Vec<AggregateRow<K>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grand_total: Option<TotalsRow>,
}

pub fn group<K, P, F>(
    records: &[MonitoredRecord],
    predicate: P,
    universe: &GroupUniverse<K>,
    key_fn: F,
    policy: &RolePolicy,
    options: GroupOptions,
) -> Grouping<K>
where
    K: Ord + Clone,
    P: Fn(&MonitoredRecord) -> bool,
    F: Fn(&MonitoredRecord) -> K,
{
    let mut order: Vec<K> = Vec::new();
    let mut buckets: BTreeMap<K, CategoryCounts> = BTreeMap::new();

    if let GroupUniverse::Fixed(keys) = universe {
        for key in keys {
            if !buckets.contains_key(key) {
                buckets.insert(key.clone(), CategoryCounts::zeroed());
                order.push(key.clone());
            }
        }
    }

    let mut skipped = 0usize;
    for record in records.iter().filter(|record| predicate(record)) {
        let key = key_fn(record);
        if let Some(counts) = buckets.get_mut(&key) {
            counts.tally(record);
            continue;
        }
        match universe {
            GroupUniverse::Observed => {
                let mut counts = CategoryCounts::zeroed();
                counts.tally(record);
                buckets.insert(key, counts);
            }
            GroupUniverse::Fixed(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "records outside the group universe were not counted");
    }

    if let GroupUniverse::Observed = universe {
        order = buckets.keys().cloned().collect();
    }

    let rows: Vec<AggregateRow<K>> = order
        .into_iter()
        .filter_map(|key| {
            let mut counts = buckets.remove(&key)?;
            policy.apply(&mut counts);
            let total = counts.total();
            Some(AggregateRow {
                group_key: key,
                counts,
                total,
            })
        })
        .collect();

    let totals = options.include_grand_total.then(|| grand_total(&rows));

    Grouping {
        rows,
        grand_total: totals,
    }
}

/// Column sums over already-merged rows.
pub fn grand_total<K>(rows: &[AggregateRow<K>]) -> TotalsRow {
    let mut counts = CategoryCounts::default();
    for row in rows {
        counts.absorb(&row.counts);
    }
    let total = counts.total();
    TotalsRow { counts, total }
}

/// Frequency table per grade, over a caller-supplied grade list.
pub fn group_by_grade<P>(
    records: &[MonitoredRecord],
    predicate: P,
    grades: &[u32],
    policy: &RolePolicy,
    options: GroupOptions,
) -> Grouping<u32>
where
    P: Fn(&MonitoredRecord) -> bool,
{
    group(
        records,
        predicate,
        &GroupUniverse::Fixed(grades.to_vec()),
        |record| record.student.grade,
        policy,
        options,
    )
}

/// Class overview: one row per student seen in the filtered records.
pub fn group_by_student<P>(
    records: &[MonitoredRecord],
    predicate: P,
    policy: &RolePolicy,
) -> Vec<AggregateRow<StudentKey>>
where
    P: Fn(&MonitoredRecord) -> bool,
{
    group(
        records,
        predicate,
        &GroupUniverse::Observed,
        StudentKey::of,
        policy,
        GroupOptions::default(),
    )
    .rows
}

/// Distinct grades in a snapshot, ascending. Used when no class list exists.
pub fn observed_grades(records: &[MonitoredRecord]) -> Vec<u32> {
    let mut grades: Vec<u32> = records.iter().map(|record| record.student.grade).collect();
    grades.sort_unstable();
    grades.dedup();
    grades
}
