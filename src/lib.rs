pub mod aggregate;
pub mod config;
pub mod date_util;
pub mod error;
pub mod export;
pub mod filter;
pub mod group;
pub mod metrics;
pub mod normalize;
pub mod pivot;
pub mod query;
pub mod record;
pub mod series;
pub mod source;

pub use aggregate::{aggregate, BucketSpec, Distribution, LeadTime, Measure, MetricValue, Predicate, Stat, TimeUnit};
pub use config::Settings;
pub use error::{Error, Result};
pub use export::{to_csv, CsvRows};
pub use filter::{filter, DateRange, FilterFields, FilterSpec, Member, RecordFilter, Roster};
pub use group::{group_by, Granularity, GroupKey, KeyFn};
pub use metrics::{
    compute_incident_metrics, compute_issue_metrics, compute_occupancy_metrics, IncidentFields,
    IncidentMetrics, IssueFields, IssueMetrics, MetricsOptions, MetricsReport, OccupancyMetrics,
    SlaPolicy, WorkLogFields,
};
pub use pivot::{pivot, AggregateRow, Column, PivotSpec, RowOrder};
pub use query::period::Period;
pub use record::{records_from_str, records_from_value, Record};
pub use series::{build_series, Series, SeriesOptions, SeriesPoint};
pub use source::{Dashboard, FetchPolicy, JsonFileSource, RecordSource, Refreshed, StaticSource};
