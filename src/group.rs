use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::date_util::{month_start, short_month_label, week_start};
use crate::normalize::{self, UNASSIGNED, UNKNOWN};
use crate::record::Record;

/// Separator used when a composite key is rendered as one string.
pub const KEY_SEPARATOR: &str = "|";

/// Time bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Start date of the bucket containing `d` (weeks start on Monday).
    pub fn bucket_start(self, d: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => d,
            Granularity::Week => week_start(d),
            Granularity::Month => month_start(d),
        }
    }

    pub fn next_start(self, start: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => start + Duration::days(1),
            Granularity::Week => start + Duration::days(7),
            Granularity::Month => {
                let (y, m) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MAX)
            }
        }
    }

    /// Canonical label. Every format sorts lexically in chronological order,
    /// but ordering code still compares bucket start dates, not labels.
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let iw = start.iso_week();
                format!("{:04}-W{:02}", iw.year(), iw.week())
            }
            Granularity::Month => start.format("%Y-%m").to_string(),
        }
    }

    /// Short human label for chart axes (`06 Jan`, `Wk 02`, `Jan-25`).
    pub fn display_label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%d %b").to_string(),
            Granularity::Week => format!("Wk {:02}", start.iso_week().week()),
            Granularity::Month => short_month_label(start),
        }
    }
}

/// A group key: one label, or an ordered tuple of labels.
///
/// Composite keys stay tuples, so a separator character inside a field value
/// can never merge two distinct groups. [`GroupKey::joined`] is for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupKey {
    Single(String),
    Composite(Vec<String>),
}

impl GroupKey {
    pub fn parts(&self) -> Vec<&str> {
        match self {
            GroupKey::Single(s) => vec![s.as_str()],
            GroupKey::Composite(parts) => parts.iter().map(String::as_str).collect(),
        }
    }

    /// Component `i` of the key (component 0 of a single key is the key).
    pub fn part(&self, i: usize) -> Option<&str> {
        match self {
            GroupKey::Single(s) => (i == 0).then_some(s.as_str()),
            GroupKey::Composite(parts) => parts.get(i).map(String::as_str),
        }
    }

    pub fn joined(&self) -> String {
        self.parts().join(KEY_SEPARATOR)
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

/// How a record's group key is derived.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFn {
    /// Normalized field text, `default` when absent.
    Field { field: String, default: String },
    /// Time bucket of a timestamp field; records without a valid timestamp get no key.
    TimeBucket { field: String, granularity: Granularity },
    /// Ordered tuple of the component keys.
    Composite(Vec<KeyFn>),
}

impl KeyFn {
    pub fn field(name: &str) -> Self {
        Self::field_or(name, UNKNOWN)
    }

    pub fn assignee(name: &str) -> Self {
        Self::field_or(name, UNASSIGNED)
    }

    pub fn field_or(name: &str, default: &str) -> Self {
        KeyFn::Field {
            field: name.to_string(),
            default: default.to_string(),
        }
    }

    pub fn time_bucket(name: &str, granularity: Granularity) -> Self {
        KeyFn::TimeBucket {
            field: name.to_string(),
            granularity,
        }
    }

    pub fn month(name: &str) -> Self {
        Self::time_bucket(name, Granularity::Month)
    }

    pub fn day(name: &str) -> Self {
        Self::time_bucket(name, Granularity::Day)
    }

    pub fn composite(parts: Vec<KeyFn>) -> Self {
        KeyFn::Composite(parts)
    }

    /// The key for `record`, or `None` when a time component has no valid date.
    pub fn key(&self, record: &Record) -> Option<GroupKey> {
        self.evaluate(record).map(|(key, _)| key)
    }

    /// Key plus the start date of the first time-bucket component, which is
    /// the chronological sort key for the group.
    pub fn evaluate(&self, record: &Record) -> Option<(GroupKey, Option<NaiveDate>)> {
        match self {
            KeyFn::Composite(parts) => {
                let mut labels = Vec::with_capacity(parts.len());
                let mut period = None;
                for part in parts {
                    let (key, start) = part.evaluate(record)?;
                    period = period.or(start);
                    match key {
                        GroupKey::Single(s) => labels.push(s),
                        GroupKey::Composite(inner) => labels.extend(inner),
                    }
                }
                Some((GroupKey::Composite(labels), period))
            }
            KeyFn::Field { field, default } => Some((
                GroupKey::Single(normalize::text(record, field, default)),
                None,
            )),
            KeyFn::TimeBucket { field, granularity } => {
                let ts = normalize::timestamp(record, field)?;
                let start = granularity.bucket_start(ts.date_naive());
                Some((GroupKey::Single(granularity.label(start)), Some(start)))
            }
        }
    }
}

/// One group: its key, chronological sort key (if any) and member records.
#[derive(Debug, Clone)]
pub struct Group<'a> {
    pub key: GroupKey,
    pub period_start: Option<NaiveDate>,
    pub records: Vec<&'a Record>,
}

impl Group<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The result of [`group_by`]: groups in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Groups<'a> {
    groups: Vec<Group<'a>>,
    index: HashMap<GroupKey, usize>,
    skipped: usize,
}

impl<'a> Groups<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, Group<'a>> {
        self.groups.iter()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&Group<'a>> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Records that produced no key (a time component without a valid date).
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Groups in chronological order of their first time component, ties and
    /// untimed groups broken by key.
    pub fn into_chronological(mut self) -> Vec<Group<'a>> {
        self.groups
            .sort_by(|a, b| a.period_start.cmp(&b.period_start).then_with(|| a.key.cmp(&b.key)));
        self.groups
    }

    pub fn into_vec(self) -> Vec<Group<'a>> {
        self.groups
    }
}

impl<'a> IntoIterator for Groups<'a> {
    type Item = Group<'a>;
    type IntoIter = std::vec::IntoIter<Group<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

pub fn group_by<'a, I>(records: I, key_fn: &KeyFn) -> Groups<'a>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut out = Groups::default();
    for record in records {
        let Some((key, period_start)) = key_fn.evaluate(record) else {
            out.skipped += 1;
            continue;
        };
        match out.index.get(&key) {
            Some(&i) => out.groups[i].records.push(record),
            None => {
                out.index.insert(key.clone(), out.groups.len());
                out.groups.push(Group {
                    key,
                    period_start,
                    records: vec![record],
                });
            }
        }
    }
    out
}
