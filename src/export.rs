use crate::group::KEY_SEPARATOR;
use crate::metrics::{IncidentMetrics, IssueMetrics, MetricsReport, OccupancyMetrics};

/// One exported cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub section: String,
    pub key: String,
    pub value: String,
}

impl CsvRow {
    fn new(section: &str, key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            section: section.to_string(),
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// Types that can be flattened into CSV rows.
pub trait CsvRows {
    fn csv_rows(&self) -> Vec<CsvRow>;
}

/// Render `metrics` as CSV with a `section,key,value` header.
pub fn to_csv<M: CsvRows + ?Sized>(metrics: &M) -> String {
    let mut out = String::from("section,key,value\n");
    for row in metrics.csv_rows() {
        out.push_str(&format!(
            "{},{},{}\n",
            csv_escape(&row.section),
            csv_escape(&row.key),
            csv_escape(&row.value)
        ));
    }
    out
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn num(v: f64) -> String {
    format!("{v:.2}")
}

fn key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

impl CsvRows for IncidentMetrics {
    fn csv_rows(&self) -> Vec<CsvRow> {
        let mut rows = vec![
            CsvRow::new("summary", "totalIncidents", self.total_incidents),
            CsvRow::new("summary", "resolvedIncidents", self.resolved_incidents),
            CsvRow::new("summary", "openIncidents", self.open_incidents),
            CsvRow::new("summary", "meanTimeToResolve", num(self.mean_time_to_resolve)),
            CsvRow::new("summary", "maxTimeToResolve", num(self.max_time_to_resolve)),
            CsvRow::new("summary", "meanTimeToRespond", num(self.mean_time_to_respond)),
            CsvRow::new("summary", "slaComplianceRate", num(self.sla_compliance_rate)),
            CsvRow::new("summary", "firstCallResolutionRate", num(self.first_call_resolution_rate)),
        ];
        rows.extend(
            self.incidents_by_priority
                .iter()
                .map(|p| CsvRow::new("incidentsByPriority", p.priority.as_str(), p.count)),
        );
        rows.extend(
            self.incidents_by_status
                .iter()
                .map(|s| CsvRow::new("incidentsByStatus", s.label.as_str(), s.count)),
        );
        rows.extend(
            self.resolution_time_buckets
                .iter()
                .map(|(label, n)| CsvRow::new("resolutionTimeBuckets", label, n)),
        );
        rows.extend(
            self.sla_by_priority
                .iter()
                .map(|p| CsvRow::new("slaByPriority", p.priority.as_str(), num(p.compliance_rate))),
        );
        rows.extend(
            self.mttr_by_priority
                .iter()
                .map(|p| CsvRow::new("mttrByPriority", p.priority.as_str(), num(p.mean_time_to_resolve))),
        );
        rows.extend(
            self.monthly_trend
                .iter()
                .map(|c| CsvRow::new("monthlyTrend", key(&[c.month.as_str(), c.priority.as_str()]), c.count)),
        );
        rows.extend(
            self.assignee_workload
                .iter()
                .map(|c| CsvRow::new("assigneeWorkload", key(&[c.assignee.as_str(), c.month.as_str()]), c.count)),
        );
        rows.extend(
            self.top_assignees
                .iter()
                .map(|a| CsvRow::new("topAssignees", a.assignee.as_str(), a.resolved)),
        );
        rows
    }
}

impl CsvRows for OccupancyMetrics {
    fn csv_rows(&self) -> Vec<CsvRow> {
        let mut rows = vec![
            CsvRow::new("summary", "workedHours", num(self.worked_hours)),
            CsvRow::new("summary", "workingDays", self.working_days),
            CsvRow::new("summary", "memberCount", self.member_count),
            CsvRow::new("summary", "availableHours", num(self.available_hours)),
            CsvRow::new("summary", "occupancyRate", num(self.occupancy_rate)),
            CsvRow::new("summary", "fte", num(self.fte)),
        ];
        for u in &self.by_user {
            rows.push(CsvRow::new("hoursByUser", u.user.as_str(), num(u.hours)));
            rows.push(CsvRow::new("occupancyByUser", u.user.as_str(), num(u.occupancy_rate)));
        }
        rows.extend(
            self.hours_by_project
                .iter()
                .map(|p| CsvRow::new("hoursByProject", p.project.as_str(), num(p.hours))),
        );
        rows.extend(
            self.daily_hours
                .points
                .iter()
                .map(|p| CsvRow::new("dailyHours", p.period.as_str(), num(p.value("hours")))),
        );
        rows
    }
}

impl CsvRows for IssueMetrics {
    fn csv_rows(&self) -> Vec<CsvRow> {
        let mut rows = vec![
            CsvRow::new("summary", "totalIssues", self.total_issues),
            CsvRow::new("summary", "resolvedIssues", self.resolved_issues),
            CsvRow::new("summary", "openIssues", self.open_issues),
            CsvRow::new("summary", "resolutionRate", num(self.resolution_rate)),
        ];
        let sections = [
            ("byStatus", &self.by_status),
            ("byType", &self.by_type),
            ("byAssignee", &self.by_assignee),
        ];
        for (section, counts) in sections {
            rows.extend(counts.iter().map(|c| CsvRow::new(section, c.label.as_str(), c.count)));
        }
        rows.extend(
            self.by_priority
                .iter()
                .map(|p| CsvRow::new("byPriority", p.priority.as_str(), p.count)),
        );
        for p in &self.monthly_flow {
            rows.push(CsvRow::new("monthlyCreated", p.month.as_str(), p.created));
            rows.push(CsvRow::new("monthlyResolved", p.month.as_str(), p.resolved));
        }
        let lt = &self.lead_time;
        for (name, value) in [
            ("mean", lt.mean),
            ("median", lt.median),
            ("p90", lt.p90),
            ("min", lt.min),
            ("max", lt.max),
        ] {
            rows.push(CsvRow::new("leadTimeDays", name, num(value)));
        }
        rows
    }
}

impl CsvRows for MetricsReport {
    fn csv_rows(&self) -> Vec<CsvRow> {
        match self {
            MetricsReport::Incidents(m) => m.csv_rows(),
            MetricsReport::Occupancy(m) => m.csv_rows(),
            MetricsReport::Issues(m) => m.csv_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use crate::metrics::{compute_incident_metrics, IncidentFields, MetricsOptions};
    use crate::record::Record;

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("hello"), "hello");
        assert_eq!(csv_escape("hello,world"), "\"hello,world\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_incident_csv() {
        let records = vec![
            Record::new()
                .with("priority", "High, urgent")
                .with("reported_date", "2025-01-06T09:00:00Z")
                .with("resolved_date", "2025-01-06T09:30:00Z"),
            Record::new().with("priority", "Low"),
        ];
        let m = compute_incident_metrics(
            &records,
            &FilterSpec::new(),
            &IncidentFields::default(),
            &MetricsOptions::default(),
        );
        let csv = to_csv(&MetricsReport::from(m));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "section,key,value");
        assert!(lines.contains(&"summary,totalIncidents,2"));
        assert!(lines.contains(&"summary,meanTimeToResolve,30.00"));
        assert!(lines.contains(&"incidentsByPriority,\"High, urgent\",1"));
        assert!(lines.contains(&"resolutionTimeBuckets,lessThan1Hour,1"));
        assert!(lines.contains(&"monthlyTrend,\"2025-01|High, urgent\",1"));
    }
}
