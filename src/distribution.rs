use serde::{Deserialize, Serialize};

use crate::grouping::CategoryCounts;
use crate::models::AggregateRow;
use crate::policy::RolePolicy;
use crate::taxonomy::{Category, DISTRIBUTION_CATEGORIES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSlice {
    pub category: Category,
    pub value: u64,
    /// Unrounded share in percent. Round with [`round_one_decimal`] when
    /// rendering, never before summing.
    pub percentage: f64,
}

/// Share of each distribution category across `rows`.
///
/// The role merge is applied again on the summed counts, which is a no-op for
/// rows the same policy already produced.
pub fn build_distribution<K>(rows: &[AggregateRow<K>], policy: &RolePolicy) -> Vec<DistributionSlice> {
    let mut summed = CategoryCounts::default();
    for row in rows {
        summed.absorb(&row.counts);
    }
    policy.apply(&mut summed);

    let values: Vec<(Category, u64)> = DISTRIBUTION_CATEGORIES
        .into_iter()
        .filter(|category| policy.is_visible(*category))
        .map(|category| (category, summed.get(category)))
        .collect();
    let sum: u64 = values.iter().map(|(_, value)| value).sum();

    values
        .into_iter()
        .map(|(category, value)| DistributionSlice {
            category,
            value,
            percentage: if sum == 0 {
                0.0
            } else {
                value as f64 / sum as f64 * 100.0
            },
        })
        .collect()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
