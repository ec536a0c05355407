use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aggregate::{lead_time, rate, Measure, Predicate, Stat, TimeUnit};
use crate::filter::{FilterFields, FilterSpec, RecordFilter};
use crate::group::{group_by, Granularity, KeyFn};
use crate::pivot::{pivot, PivotSpec};
use crate::record::Record;

use super::types::*;
use super::{label_counts, priority_counts, MetricsOptions};

/// Where each issue attribute lives. Defaults follow the issue-tracker
/// search response, where attributes sit under `fields` as objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFields {
    pub key: String,
    pub created: String,
    pub resolved: String,
    pub status: String,
    pub issue_type: String,
    pub priority: String,
    /// Display name, used for grouping.
    pub assignee: String,
    /// Stable identifier, used for user selection.
    pub assignee_id: String,
    pub project: String,
    pub team: String,
}

impl Default for IssueFields {
    fn default() -> Self {
        Self {
            key: "key".to_string(),
            created: "fields.created".to_string(),
            resolved: "fields.resolutiondate".to_string(),
            status: "fields.status.name".to_string(),
            issue_type: "fields.issuetype.name".to_string(),
            priority: "fields.priority.name".to_string(),
            assignee: "fields.assignee.displayName".to_string(),
            assignee_id: "fields.assignee.accountId".to_string(),
            project: "fields.project.key".to_string(),
            team: "fields.components.0.name".to_string(),
        }
    }
}

impl IssueFields {
    pub fn filter_fields(&self) -> FilterFields {
        FilterFields::new(&self.created, &self.team, &self.project, &self.assignee_id)
    }

    pub fn lead_time(&self) -> Measure {
        Measure::elapsed(&self.created, &self.resolved).in_unit(TimeUnit::Days)
    }
}

/// Build the issue dashboard from `records` narrowed by `spec`.
pub fn compute_issue_metrics(
    records: &[Record],
    spec: &FilterSpec,
    fields: &IssueFields,
    options: &MetricsOptions,
) -> IssueMetrics {
    let filter_fields = fields.filter_fields();
    let issues = RecordFilter::new(spec, &filter_fields).apply(records);

    let is_resolved = Predicate::Dated(fields.resolved.clone());
    let resolved: Vec<&Record> = issues.iter().filter(|r| is_resolved.matches(r)).collect();
    let total = issues.len() as u64;
    let resolved_count = resolved.len() as u64;

    let count_by = |key: KeyFn| PivotSpec::new(key).column("count", Stat::Count);
    let by_status = pivot(&issues, &count_by(KeyFn::field(&fields.status)).descending("count"));
    let by_type = pivot(&issues, &count_by(KeyFn::field(&fields.issue_type)).descending("count"));
    let by_priority = pivot(&issues, &count_by(KeyFn::field(&fields.priority)));
    let by_assignee = pivot(&issues, &count_by(KeyFn::assignee(&fields.assignee)).descending("count"));

    let measure = fields.lead_time();
    let days: Vec<f64> = resolved.iter().filter_map(|r| measure.value(r)).collect();

    log::debug!("Issue metrics over {} issues ({} resolved)", total, resolved_count);

    IssueMetrics {
        range: spec.date_range,
        total_issues: total,
        resolved_issues: resolved_count,
        open_issues: total - resolved_count,
        resolution_rate: rate(resolved_count, total),
        by_status: label_counts(by_status, "count"),
        by_type: label_counts(by_type, "count"),
        by_priority: priority_counts(by_priority, "count"),
        by_assignee: label_counts(by_assignee, "count")
            .into_iter()
            .take(options.top_n)
            .collect(),
        monthly_flow: monthly_flow(&issues, &resolved, fields),
        lead_time: lead_time(&days, TimeUnit::Days),
    }
}

/// Created and resolved counts per month, merged on the month start.
fn monthly_flow(issues: &[Record], resolved: &[&Record], fields: &IssueFields) -> Vec<FlowPoint> {
    let mut months: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for group in group_by(issues, &KeyFn::month(&fields.created)).iter() {
        if let Some(start) = group.period_start {
            months.entry(start).or_default().0 += group.len() as u64;
        }
    }
    for group in group_by(resolved.iter().copied(), &KeyFn::month(&fields.resolved)).iter() {
        if let Some(start) = group.period_start {
            months.entry(start).or_default().1 += group.len() as u64;
        }
    }

    months
        .into_iter()
        .map(|(start, (created, resolved))| FlowPoint {
            month: Granularity::Month.label(start),
            label: Granularity::Month.display_label(start),
            month_start: start,
            created,
            resolved,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(key: &str, created: &str, resolved: Option<&str>, status: &str, assignee: Option<(&str, &str)>) -> Record {
        let mut fields = json!({
            "created": created,
            "resolutiondate": resolved,
            "status": { "name": status },
            "issuetype": { "name": "Bug" },
            "priority": { "name": "Medium" },
            "project": { "key": "OPS" },
        });
        if let Some((id, name)) = assignee {
            fields["assignee"] = json!({ "accountId": id, "displayName": name });
        }
        Record::new().with("key", key).with("fields", fields)
    }

    fn sample() -> Vec<Record> {
        vec![
            issue("OPS-1", "2024-12-30T10:00:00.000+0000", Some("2025-01-02T10:00:00.000+0000"), "Done", Some(("a1", "Ana"))),
            issue("OPS-2", "2025-01-05T10:00:00.000+0000", Some("2025-01-06T10:00:00.000+0000"), "Done", Some(("a1", "Ana"))),
            issue("OPS-3", "2025-01-10T10:00:00.000+0000", None, "In Progress", Some(("b2", "Bob"))),
            issue("OPS-4", "2025-02-01T10:00:00.000+0000", None, "To Do", None),
        ]
    }

    fn compute(records: &[Record], spec: &FilterSpec) -> IssueMetrics {
        compute_issue_metrics(records, spec, &IssueFields::default(), &MetricsOptions::default())
    }

    #[test]
    fn test_totals_and_breakdowns() {
        let m = compute(&sample(), &FilterSpec::new());
        assert_eq!(m.total_issues, 4);
        assert_eq!(m.resolved_issues, 2);
        assert_eq!(m.open_issues, 2);
        assert_eq!(m.resolution_rate, 50.0);
        assert_eq!(m.by_status[0], LabelCount { label: "Done".into(), count: 2 });
        assert_eq!(m.by_type, vec![LabelCount { label: "Bug".into(), count: 4 }]);
        let assignees: Vec<(&str, u64)> = m.by_assignee.iter().map(|a| (a.label.as_str(), a.count)).collect();
        assert_eq!(assignees, vec![("Ana", 2), ("Bob", 1), ("Unassigned", 1)]);
    }

    #[test]
    fn test_monthly_flow_across_year_boundary() {
        let m = compute(&sample(), &FilterSpec::new());
        let flow: Vec<(&str, u64, u64)> = m
            .monthly_flow
            .iter()
            .map(|p| (p.label.as_str(), p.created, p.resolved))
            .collect();
        assert_eq!(flow, vec![("Dec-24", 1, 0), ("Jan-25", 2, 2), ("Feb-25", 1, 0)]);
    }

    #[test]
    fn test_lead_time_in_days() {
        let m = compute(&sample(), &FilterSpec::new());
        assert_eq!(m.lead_time.count, 2);
        assert_eq!(m.lead_time.mean, 2.0);
        assert_eq!(m.lead_time.median, 2.0);
        assert_eq!(m.lead_time.max, 3.0);
        assert_eq!(m.lead_time.unit, TimeUnit::Days);
    }

    #[test]
    fn test_user_selection_uses_account_id() {
        let spec = FilterSpec::new().user("a1");
        let m = compute(&sample(), &spec);
        assert_eq!(m.total_issues, 2);
        assert_eq!(m.resolution_rate, 100.0);
    }

    #[test]
    fn test_created_range_and_empty_result() {
        let spec = FilterSpec::new().date_range(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        );
        let m = compute(&sample(), &spec);
        assert_eq!(m.total_issues, 0);
        assert_eq!(m.resolution_rate, 0.0);
        assert!(m.monthly_flow.is_empty());
        assert_eq!(m.lead_time.mean, 0.0);
    }
}
