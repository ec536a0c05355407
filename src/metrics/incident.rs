use crate::aggregate::{aggregate, rate, BucketSpec, Distribution, Measure, MetricValue, Predicate, Stat, TimeUnit};
use crate::filter::{FilterFields, FilterSpec, RecordFilter};
use crate::group::{group_by, Granularity, KeyFn};
use crate::normalize;
use crate::pivot::{pivot, PivotSpec};
use crate::record::Record;

use super::{label_counts, priority_counts, MetricsOptions};
use super::types::*;

/// Where each incident attribute lives in a ticket record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentFields {
    pub id: String,
    pub reported: String,
    pub first_response: String,
    pub resolved: String,
    /// Precomputed resolution time in minutes; wins over resolved - reported.
    pub resolution_minutes: String,
    pub priority: String,
    pub status: String,
    pub assignee: String,
    pub team: String,
    pub project: String,
    pub transfers: String,
}

impl Default for IncidentFields {
    fn default() -> Self {
        Self {
            id: "ticket_id".to_string(),
            reported: "reported_date".to_string(),
            first_response: "first_response_date".to_string(),
            resolved: "resolved_date".to_string(),
            resolution_minutes: "resolution_time_minutes".to_string(),
            priority: "priority".to_string(),
            status: "status".to_string(),
            assignee: "assignee".to_string(),
            team: "team".to_string(),
            project: "project".to_string(),
            transfers: "transfer_count".to_string(),
        }
    }
}

impl IncidentFields {
    /// Incidents are dated by their report time and attributed to their assignee.
    pub fn filter_fields(&self) -> FilterFields {
        FilterFields::new(&self.reported, &self.team, &self.project, &self.assignee)
    }

    /// Resolution time in minutes.
    pub fn resolution(&self) -> Measure {
        Measure::field(&self.resolution_minutes)
            .or_elapsed(&self.reported, &self.resolved)
            .in_unit(TimeUnit::Minutes)
    }

    /// Time to first response in minutes.
    pub fn response(&self) -> Measure {
        Measure::elapsed(&self.reported, &self.first_response)
    }

    pub fn is_resolved(&self) -> Predicate {
        Predicate::Any(vec![
            Predicate::Dated(self.resolved.clone()),
            Predicate::HasValue(Measure::field(&self.resolution_minutes)),
        ])
    }

    /// Resolved without being transferred to another group.
    pub fn is_first_call(&self) -> Predicate {
        let transfers = Measure::field(&self.transfers);
        Predicate::Any(vec![
            Predicate::Not(Box::new(Predicate::HasValue(transfers.clone()))),
            Predicate::AtMost {
                measure: transfers,
                max: 0.0,
            },
        ])
    }
}

/// Build the incident dashboard from `records` narrowed by `spec`.
pub fn compute_incident_metrics(
    records: &[Record],
    spec: &FilterSpec,
    fields: &IncidentFields,
    options: &MetricsOptions,
) -> IncidentMetrics {
    let filter_fields = fields.filter_fields();
    let incidents = RecordFilter::new(spec, &filter_fields).apply(records);
    let all: Vec<&Record> = incidents.iter().collect();

    let is_resolved = fields.is_resolved();
    let resolved: Vec<&Record> = all.iter().copied().filter(|r| is_resolved.matches(r)).collect();
    let resolution = fields.resolution();

    let total = all.len() as u64;
    let resolved_count = resolved.len() as u64;

    let within_sla = resolved
        .iter()
        .filter(|r| within_sla(r, fields, &resolution, options))
        .count() as u64;

    let by_priority = pivot(
        &incidents,
        &PivotSpec::new(KeyFn::field(&fields.priority)).column("count", Stat::Count),
    );
    let by_status = pivot(
        &incidents,
        &PivotSpec::new(KeyFn::field(&fields.status))
            .column("count", Stat::Count)
            .descending("count"),
    );

    let (sla_by_priority, mttr_by_priority) = per_priority(&resolved, fields, &resolution, options);

    log::debug!(
        "Incident metrics over {} incidents ({} resolved)",
        total,
        resolved_count
    );

    IncidentMetrics {
        range: spec.date_range,
        total_incidents: total,
        resolved_incidents: resolved_count,
        open_incidents: total - resolved_count,
        incidents_by_priority: priority_counts(by_priority, "count"),
        incidents_by_status: label_counts(by_status, "count"),
        mean_time_to_resolve: aggregate(&resolved, &Stat::MeanOfPresent(resolution.clone())).as_f64(),
        max_time_to_resolve: aggregate(&resolved, &Stat::Max(resolution.clone())).as_f64(),
        mean_time_to_respond: aggregate(&all, &Stat::MeanOfPresent(fields.response())).as_f64(),
        resolution_time_buckets: resolution_buckets(&resolved, &resolution),
        sla_compliance_rate: rate(within_sla, resolved_count),
        sla_by_priority,
        first_call_resolution_rate: aggregate(&resolved, &Stat::Rate(fields.is_first_call())).as_f64(),
        monthly_trend: monthly_trend(&incidents, fields),
        assignee_workload: assignee_workload(&incidents, fields),
        top_assignees: top_assignees(&incidents, fields, &resolution, options.top_n),
        mttr_by_priority,
    }
}

/// Every resolved incident lands in one bucket; an unmeasurable one counts as 0 minutes.
fn resolution_buckets(resolved: &[&Record], resolution: &Measure) -> Distribution {
    match aggregate(resolved, &Stat::Buckets(resolution.clone(), BucketSpec::resolution_minutes())) {
        MetricValue::Distribution(d) => d,
        _ => BucketSpec::resolution_minutes().distribute(std::iter::empty()),
    }
}

/// A resolved incident without a measurable resolution time never meets its target.
fn within_sla(record: &Record, fields: &IncidentFields, resolution: &Measure, options: &MetricsOptions) -> bool {
    let priority = normalize::category(record, &fields.priority);
    resolution
        .value(record)
        .is_some_and(|minutes| options.sla.is_within(&priority, minutes))
}

fn per_priority(
    resolved: &[&Record],
    fields: &IncidentFields,
    resolution: &Measure,
    options: &MetricsOptions,
) -> (Vec<PrioritySla>, Vec<PriorityMttr>) {
    let groups = group_by(resolved.iter().copied(), &KeyFn::field(&fields.priority));
    let mut sla = Vec::with_capacity(groups.len());
    let mut mttr = Vec::with_capacity(groups.len());
    for group in groups.iter() {
        let priority = group.key.joined();
        let count = group.len() as u64;
        let within = group
            .records
            .iter()
            .filter(|r| within_sla(r, fields, resolution, options))
            .count() as u64;
        sla.push(PrioritySla {
            threshold_hours: options.sla.threshold_hours(&priority),
            resolved: count,
            within_sla: within,
            compliance_rate: rate(within, count),
            priority: priority.clone(),
        });
        mttr.push(PriorityMttr {
            priority,
            resolved: count,
            mean_time_to_resolve: aggregate(&group.records, &Stat::MeanOfPresent(resolution.clone())).as_f64(),
        });
    }
    (sla, mttr)
}

fn monthly_trend(incidents: &[Record], fields: &IncidentFields) -> Vec<MonthlyPriorityCount> {
    let spec = PivotSpec::new(KeyFn::composite(vec![
        KeyFn::month(&fields.reported),
        KeyFn::field(&fields.priority),
    ]))
    .column("count", Stat::Count)
    .chronological();

    pivot(incidents, &spec)
        .into_iter()
        .filter_map(|row| {
            let month_start = row.period_start?;
            Some(MonthlyPriorityCount {
                month: Granularity::Month.label(month_start),
                label: Granularity::Month.display_label(month_start),
                month_start,
                priority: row.key.part(1)?.to_string(),
                count: row.count("count"),
            })
        })
        .collect()
}

fn assignee_workload(incidents: &[Record], fields: &IncidentFields) -> Vec<WorkloadCell> {
    let spec = PivotSpec::new(KeyFn::composite(vec![
        KeyFn::month(&fields.reported),
        KeyFn::assignee(&fields.assignee),
    ]))
    .column("count", Stat::Count)
    .chronological();

    pivot(incidents, &spec)
        .into_iter()
        .filter_map(|row| {
            Some(WorkloadCell {
                month: row.key.part(0)?.to_string(),
                assignee: row.key.part(1)?.to_string(),
                count: row.count("count"),
            })
        })
        .collect()
}

fn top_assignees(incidents: &[Record], fields: &IncidentFields, resolution: &Measure, n: usize) -> Vec<AssigneeStats> {
    let spec = PivotSpec::new(KeyFn::assignee(&fields.assignee))
        .column("assigned", Stat::Count)
        .column("resolved", Stat::CountWhere(fields.is_resolved()))
        .column("mttr", Stat::MeanOfPresent(resolution.clone()))
        .descending("resolved")
        .limit(n);

    pivot(incidents, &spec)
        .into_iter()
        .map(|row| AssigneeStats {
            assigned: row.count("assigned"),
            resolved: row.count("resolved"),
            mean_time_to_resolve: row.value("mttr"),
            assignee: row.key.joined(),
        })
        .collect()
}
