use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{Distribution, LeadTime};
use crate::filter::DateRange;
use crate::series::Series;

/// Count of records carrying one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityCount {
    pub priority: String,
    pub count: u64,
}

/// One cell of the month × priority incident trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPriorityCount {
    /// `YYYY-MM`
    pub month: String,
    /// `Jan-25`
    pub label: String,
    pub month_start: NaiveDate,
    pub priority: String,
    pub count: u64,
}

/// One cell of the assignee × month workload heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadCell {
    pub assignee: String,
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeStats {
    pub assignee: String,
    pub assigned: u64,
    pub resolved: u64,
    /// Minutes.
    pub mean_time_to_resolve: f64,
}

/// SLA outcome for the resolved incidents of one priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritySla {
    pub priority: String,
    pub threshold_hours: f64,
    pub resolved: u64,
    pub within_sla: u64,
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMttr {
    pub priority: String,
    pub resolved: u64,
    /// Minutes.
    pub mean_time_to_resolve: f64,
}

/// Incident (ITSM ticket) dashboard.
///
/// Durations are in minutes, rates are percentages on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentMetrics {
    pub range: Option<DateRange>,
    pub total_incidents: u64,
    pub resolved_incidents: u64,
    pub open_incidents: u64,
    pub incidents_by_priority: Vec<PriorityCount>,
    pub incidents_by_status: Vec<LabelCount>,
    pub mean_time_to_resolve: f64,
    pub max_time_to_resolve: f64,
    pub mean_time_to_respond: f64,
    pub resolution_time_buckets: Distribution,
    pub sla_compliance_rate: f64,
    pub sla_by_priority: Vec<PrioritySla>,
    pub first_call_resolution_rate: f64,
    pub monthly_trend: Vec<MonthlyPriorityCount>,
    pub assignee_workload: Vec<WorkloadCell>,
    pub top_assignees: Vec<AssigneeStats>,
    pub mttr_by_priority: Vec<PriorityMttr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOccupancy {
    pub user: String,
    pub team: String,
    pub hours: f64,
    pub available_hours: f64,
    pub occupancy_rate: f64,
    pub fte: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHours {
    pub project: String,
    pub hours: f64,
    /// Share of all worked hours, 0-100.
    pub share: f64,
}

/// Hours a user logged per weekday, Monday first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayHours {
    pub user: String,
    pub hours: [f64; 7],
}

/// Team occupancy (capacity) dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyMetrics {
    /// The filter range, or the span of the dated logs when none was given.
    pub range: Option<DateRange>,
    pub entries: u64,
    pub worked_hours: f64,
    pub working_days: u32,
    pub member_count: u64,
    pub available_hours: f64,
    pub occupancy_rate: f64,
    pub fte: f64,
    pub by_user: Vec<UserOccupancy>,
    pub hours_by_project: Vec<ProjectHours>,
    pub daily_hours: Series,
    pub weekday_heatmap: Vec<WeekdayHours>,
}

/// Issues created and resolved in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPoint {
    pub month: String,
    pub label: String,
    pub month_start: NaiveDate,
    pub created: u64,
    pub resolved: u64,
}

/// Issue-tracker dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMetrics {
    pub range: Option<DateRange>,
    pub total_issues: u64,
    pub resolved_issues: u64,
    pub open_issues: u64,
    pub resolution_rate: f64,
    pub by_status: Vec<LabelCount>,
    pub by_type: Vec<LabelCount>,
    pub by_priority: Vec<PriorityCount>,
    pub by_assignee: Vec<LabelCount>,
    pub monthly_flow: Vec<FlowPoint>,
    /// Days from creation to resolution.
    pub lead_time: LeadTime,
}
