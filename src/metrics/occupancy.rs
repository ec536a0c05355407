use std::collections::BTreeSet;

use chrono::Datelike;

use crate::aggregate::{aggregate, ratio, Measure, Stat, TimeUnit};
use crate::filter::{DateRange, FilterFields, FilterSpec, RecordFilter, Roster};
use crate::group::{group_by, Granularity, KeyFn};
use crate::normalize::{self, UNKNOWN};
use crate::pivot::{pivot, Column, PivotSpec};
use crate::record::Record;
use crate::series::{build_series, SeriesOptions};

use super::types::*;
use super::MetricsOptions;

/// Where each work-log attribute lives in a time-entry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLogFields {
    pub date: String,
    pub user: String,
    pub team: String,
    pub project: String,
    pub hours: String,
    /// Used when the hours field is absent.
    pub minutes: String,
}

impl Default for WorkLogFields {
    fn default() -> Self {
        Self {
            date: "start_time".to_string(),
            user: "user_id".to_string(),
            team: "team".to_string(),
            project: "project".to_string(),
            hours: "hours".to_string(),
            minutes: "duration_minutes".to_string(),
        }
    }
}

impl WorkLogFields {
    pub fn filter_fields(&self) -> FilterFields {
        FilterFields::new(&self.date, &self.team, &self.project, &self.user)
    }

    pub fn hours_measure(&self) -> Measure {
        Measure::field(&self.hours)
            .or_field_divided(&self.minutes, 60.0)
            .in_unit(TimeUnit::Hours)
    }
}

/// Build the occupancy dashboard from work logs narrowed by `spec`.
///
/// Available hours are `standard_hours_per_day * working_days * members`,
/// where working days are Monday to Friday of the range. Members are the
/// selected users, else the roster members of the selected teams, else the
/// distinct users found in the logs, with unattributed logs as one
/// `Unknown` user.
pub fn compute_occupancy_metrics(
    records: &[Record],
    spec: &FilterSpec,
    fields: &WorkLogFields,
    roster: Option<&Roster>,
    options: &MetricsOptions,
) -> OccupancyMetrics {
    let filter_fields = fields.filter_fields();
    let logs = RecordFilter::new(spec, &filter_fields)
        .with_roster(roster)
        .apply(records);
    let all: Vec<&Record> = logs.iter().collect();
    let hours = fields.hours_measure();

    let worked_hours = aggregate(&all, &Stat::Sum(hours.clone())).as_f64();
    let range = spec.date_range.or_else(|| dated_span(&logs, &fields.date));
    let working_days = range.map_or(0, |r| r.working_days());
    let capacity_per_member = options.standard_hours_per_day * f64::from(working_days);

    let applicable = applicable_users(spec, roster);
    let member_count = match &applicable {
        Some(users) => users.len() as u64,
        // Unattributed logs form one `Unknown` member, matching the per-user rows.
        None => group_by(&logs, &KeyFn::field(&fields.user)).len() as u64,
    };
    let available_hours = capacity_per_member * member_count as f64;

    let daily_options = match range {
        Some(r) => SeriesOptions::fill_gaps(r),
        None => SeriesOptions::sparse(),
    };
    let daily_hours = build_series(
        &logs,
        &fields.date,
        Granularity::Day,
        &[
            Column::new("hours", Stat::Sum(hours.clone())),
            Column::new("entries", Stat::Count),
        ],
        &daily_options,
    );

    log::debug!(
        "Occupancy over {} logs: {:.2}h worked, {} members, {} working days",
        all.len(),
        worked_hours,
        member_count,
        working_days
    );

    OccupancyMetrics {
        range,
        entries: all.len() as u64,
        worked_hours,
        working_days,
        member_count,
        available_hours,
        occupancy_rate: ratio(worked_hours * 100.0, available_hours),
        fte: ratio(worked_hours, capacity_per_member),
        by_user: by_user(&logs, fields, roster, applicable.as_ref(), capacity_per_member),
        hours_by_project: hours_by_project(&logs, fields, worked_hours),
        daily_hours,
        weekday_heatmap: weekday_heatmap(&logs, fields),
    }
}

/// Users the capacity applies to, when something other than the logs decides it.
fn applicable_users(spec: &FilterSpec, roster: Option<&Roster>) -> Option<BTreeSet<String>> {
    if !spec.selected_users.is_empty() {
        return Some(spec.selected_users.clone());
    }
    match roster {
        Some(roster) if !roster.is_empty() => Some(
            roster
                .members_in(&spec.selected_teams)
                .into_iter()
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

/// Earliest to latest dated log, inclusive.
fn dated_span(logs: &[Record], date_field: &str) -> Option<DateRange> {
    let mut dates = logs
        .iter()
        .filter_map(|r| normalize::timestamp(r, date_field))
        .map(|ts| ts.date_naive());
    let first = dates.next()?;
    let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Some(DateRange::new(start, end))
}

fn by_user(
    logs: &[Record],
    fields: &WorkLogFields,
    roster: Option<&Roster>,
    applicable: Option<&BTreeSet<String>>,
    capacity: f64,
) -> Vec<UserOccupancy> {
    let hours = fields.hours_measure();
    let team_of = |user: &str, record: Option<&Record>| -> String {
        record
            .and_then(|r| normalize::opt_text(r, &fields.team))
            .or_else(|| roster.and_then(|r| r.team_of(user)).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    let row = |user: String, team: String, worked: f64| UserOccupancy {
        user,
        team,
        hours: worked,
        available_hours: capacity,
        occupancy_rate: ratio(worked * 100.0, capacity),
        fte: ratio(worked, capacity),
    };

    let groups = group_by(logs, &KeyFn::field(&fields.user));
    let mut rows: Vec<UserOccupancy> = groups
        .iter()
        .map(|g| {
            let user = g.key.joined();
            let team = team_of(&user, g.records.first().copied());
            let worked = aggregate(&g.records, &Stat::Sum(hours.clone())).as_f64();
            row(user, team, worked)
        })
        .collect();

    // Members without any log still count against capacity.
    if let Some(users) = applicable {
        for user in users {
            if !rows.iter().any(|r| &r.user == user) {
                let team = team_of(user.as_str(), None);
                rows.push(row(user.clone(), team, 0.0));
            }
        }
    }

    rows.sort_by(|a, b| b.hours.partial_cmp(&a.hours).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

fn hours_by_project(logs: &[Record], fields: &WorkLogFields, worked: f64) -> Vec<ProjectHours> {
    let spec = PivotSpec::new(KeyFn::field(&fields.project))
        .column("hours", Stat::Sum(fields.hours_measure()))
        .descending("hours");
    pivot(logs, &spec)
        .into_iter()
        .map(|row| {
            let hours = row.value("hours");
            ProjectHours {
                project: row.key.joined(),
                hours,
                share: ratio(hours * 100.0, worked),
            }
        })
        .collect()
}

fn weekday_heatmap(logs: &[Record], fields: &WorkLogFields) -> Vec<WeekdayHours> {
    let hours = fields.hours_measure();
    group_by(logs, &KeyFn::field(&fields.user))
        .iter()
        .map(|g| {
            let mut by_day = [0.0; 7];
            for record in &g.records {
                if let Some(ts) = normalize::timestamp(record, &fields.date) {
                    let day = ts.weekday().num_days_from_monday() as usize;
                    by_day[day] += hours.value(record).unwrap_or(0.0);
                }
            }
            WeekdayHours {
                user: g.key.joined(),
                hours: by_day,
            }
        })
        .collect()
}
