pub mod incident;
pub mod issue;
pub mod occupancy;
pub mod sla;
pub mod types;

pub use incident::{compute_incident_metrics, IncidentFields};
pub use issue::{compute_issue_metrics, IssueFields};
pub use occupancy::{compute_occupancy_metrics, WorkLogFields};
pub use sla::{PriorityTier, SlaPolicy};
pub use types::*;

use serde::Serialize;

use crate::config::Settings;
use crate::pivot::AggregateRow;

/// Tunables shared by the dashboards.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOptions {
    pub standard_hours_per_day: f64,
    pub sla: SlaPolicy,
    /// Rows kept in "top N" tables.
    pub top_n: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            standard_hours_per_day: 8.0,
            sla: SlaPolicy::default(),
            top_n: 10,
        }
    }
}

impl From<&Settings> for MetricsOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            standard_hours_per_day: settings.standard_hours_per_day,
            sla: settings.sla,
            top_n: settings.top_n,
        }
    }
}

/// Any dashboard result, tagged with its kind when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dashboard", rename_all = "lowercase")]
pub enum MetricsReport {
    Incidents(IncidentMetrics),
    Occupancy(OccupancyMetrics),
    Issues(IssueMetrics),
}

impl MetricsReport {
    pub fn name(&self) -> &'static str {
        match self {
            MetricsReport::Incidents(_) => "incidents",
            MetricsReport::Occupancy(_) => "occupancy",
            MetricsReport::Issues(_) => "issues",
        }
    }
}

impl From<IncidentMetrics> for MetricsReport {
    fn from(m: IncidentMetrics) -> Self {
        MetricsReport::Incidents(m)
    }
}

impl From<OccupancyMetrics> for MetricsReport {
    fn from(m: OccupancyMetrics) -> Self {
        MetricsReport::Occupancy(m)
    }
}

impl From<IssueMetrics> for MetricsReport {
    fn from(m: IssueMetrics) -> Self {
        MetricsReport::Issues(m)
    }
}

fn label_counts(rows: Vec<AggregateRow>, column: &str) -> Vec<LabelCount> {
    rows.into_iter()
        .map(|r| LabelCount {
            count: r.count(column),
            label: r.key.joined(),
        })
        .collect()
}

fn priority_counts(rows: Vec<AggregateRow>, column: &str) -> Vec<PriorityCount> {
    rows.into_iter()
        .map(|r| PriorityCount {
            count: r.count(column),
            priority: r.key.joined(),
        })
        .collect()
}
