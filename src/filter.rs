use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date_util::working_days;
use crate::normalize;
use crate::record::Record;

/// An inclusive calendar-day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.start && d <= self.end
    }

    /// Number of calendar days covered (0 for a reversed range).
    pub fn days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }

    /// Monday-Friday days in the range.
    pub fn working_days(&self) -> u32 {
        working_days(self.start, self.end)
    }

    /// Every calendar day in the range, ascending.
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.days()).map(move |i| start + Duration::days(i))
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

/// The user's filter selection for one dashboard invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub selected_teams: BTreeSet<String>,
    #[serde(default)]
    pub selected_projects: BTreeSet<String>,
    #[serde(default)]
    pub selected_users: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn range(mut self, range: Option<DateRange>) -> Self {
        self.date_range = range;
        self
    }

    pub fn team(mut self, name: &str) -> Self {
        self.selected_teams.insert(name.to_string());
        self
    }

    pub fn teams<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_teams.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn project(mut self, name: &str) -> Self {
        self.selected_projects.insert(name.to_string());
        self
    }

    pub fn projects<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_projects.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn user(mut self, id: &str) -> Self {
        self.selected_users.insert(id.to_string());
        self
    }

    pub fn users<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_users.extend(ids.into_iter().map(Into::into));
        self
    }

    /// True when no dimension restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.date_range.is_none()
            && self.selected_teams.is_empty()
            && self.selected_projects.is_empty()
            && self.selected_users.is_empty()
    }
}

/// Which record fields carry each filter dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFields {
    pub date: String,
    pub team: String,
    pub project: String,
    pub user: String,
}

impl FilterFields {
    pub fn new(date: &str, team: &str, project: &str, user: &str) -> Self {
        Self {
            date: date.to_string(),
            team: team.to_string(),
            project: project.to_string(),
            user: user.to_string(),
        }
    }
}

/// One roster entry: a user and the team they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: String,
    pub team: String,
}

/// Team membership, used to resolve a record's team when the record itself
/// does not name one, and to count the members a capacity applies to.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
    team_by_user: HashMap<String, String>,
}

impl Roster {
    pub fn new(members: Vec<Member>) -> Self {
        let team_by_user = members
            .iter()
            .map(|m| (m.user.clone(), m.team.clone()))
            .collect();
        Self {
            members,
            team_by_user,
        }
    }

    /// Build a roster from records, skipping rows without a user.
    pub fn from_records(records: &[Record], user_field: &str, team_field: &str) -> Self {
        let members = records
            .iter()
            .filter_map(|r| {
                let user = normalize::opt_text(r, user_field)?;
                Some(Member {
                    user,
                    team: normalize::category(r, team_field),
                })
            })
            .collect();
        Self::new(members)
    }

    pub fn team_of(&self, user: &str) -> Option<&str> {
        self.team_by_user.get(user).map(String::as_str)
    }

    /// Distinct users belonging to any of `teams`; every member when `teams` is empty.
    pub fn members_in(&self, teams: &BTreeSet<String>) -> BTreeSet<&str> {
        self.members
            .iter()
            .filter(|m| teams.is_empty() || teams.contains(&m.team))
            .map(|m| m.user.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A filter spec bound to a record shape.
#[derive(Debug, Clone, Copy)]
pub struct RecordFilter<'a> {
    spec: &'a FilterSpec,
    fields: &'a FilterFields,
    roster: Option<&'a Roster>,
}

impl<'a> RecordFilter<'a> {
    pub fn new(spec: &'a FilterSpec, fields: &'a FilterFields) -> Self {
        Self {
            spec,
            fields,
            roster: None,
        }
    }

    pub fn with_roster(mut self, roster: Option<&'a Roster>) -> Self {
        self.roster = roster;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(range) = &self.spec.date_range {
            match normalize::timestamp(record, &self.fields.date) {
                Some(ts) if range.contains(ts.date_naive()) => {}
                _ => return false,
            }
        }
        if !self.spec.selected_users.is_empty() {
            match normalize::opt_text(record, &self.fields.user) {
                Some(user) if self.spec.selected_users.contains(&user) => {}
                _ => return false,
            }
        }
        if !self.spec.selected_projects.is_empty() {
            match normalize::opt_text(record, &self.fields.project) {
                Some(project) if self.spec.selected_projects.contains(&project) => {}
                _ => return false,
            }
        }
        if !self.spec.selected_teams.is_empty() {
            match self.team_of(record) {
                Some(team) if self.spec.selected_teams.contains(&team) => {}
                _ => return false,
            }
        }
        true
    }

    fn team_of(&self, record: &Record) -> Option<String> {
        normalize::opt_text(record, &self.fields.team).or_else(|| {
            let user = normalize::opt_text(record, &self.fields.user)?;
            self.roster?.team_of(&user).map(str::to_string)
        })
    }

    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        let kept: Vec<Record> = records.iter().filter(|r| self.matches(r)).cloned().collect();
        log::debug!("Filter kept {} of {} records", kept.len(), records.len());
        kept
    }
}

/// Filter `records` by `spec`, reading dimensions from `fields`.
pub fn filter(records: &[Record], spec: &FilterSpec, fields: &FilterFields) -> Vec<Record> {
    RecordFilter::new(spec, fields).apply(records)
}
