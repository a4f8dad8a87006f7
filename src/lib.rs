//! Aggregation of monitored student records into the frequency tables, trend
//! series and share views a school dashboard renders.
//!
//! Everything outside [`snapshot`] and [`report`] is pure: each call takes an
//! in-memory snapshot and returns fresh values.

pub mod dashboard;
pub mod distribution;
pub mod filter;
pub mod grouping;
pub mod models;
pub mod policy;
pub mod report;
pub mod series;
pub mod snapshot;
pub mod taxonomy;

pub use dashboard::{build_dashboard, DashboardView};
pub use distribution::{build_distribution, DistributionSlice};
pub use filter::{FilterState, RecordPredicate};
pub use grouping::{group, CategoryCounts, GroupOptions, GroupUniverse, Grouping, TotalsRow};
pub use models::{AggregateRow, MonitoredRecord, RecordSource, StudentKey, StudentRef, Viewer};
pub use policy::{RolePolicy, ViewerRole};
pub use series::{build_series, Granularity, TimeBucket, TimeSeries};
pub use taxonomy::Category;
