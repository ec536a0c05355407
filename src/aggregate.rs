use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::normalize;
use crate::record::Record;

/// Unit a duration metric is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn minutes(self) -> f64 {
        match self {
            TimeUnit::Minutes => 1.0,
            TimeUnit::Hours => 60.0,
            TimeUnit::Days => 1440.0,
        }
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(self, value: f64, target: TimeUnit) -> f64 {
        value * self.minutes() / target.minutes()
    }
}

/// A single aggregate value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Duration { value: f64, unit: TimeUnit },
    /// A percentage on the 0-100 scale.
    Percent(f64),
    Number(f64),
    Distribution(Distribution),
}

impl MetricValue {
    /// Scalar view: counts and numbers as-is, distributions as their total.
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Count(n) => *n as f64,
            MetricValue::Duration { value, .. } => *value,
            MetricValue::Percent(p) => *p,
            MetricValue::Number(n) => *n,
            MetricValue::Distribution(d) => d.total() as f64,
        }
    }

    pub fn as_count(&self) -> u64 {
        match self {
            MetricValue::Count(n) => *n,
            MetricValue::Distribution(d) => d.total(),
            other => other.as_f64().max(0.0) as u64,
        }
    }

    /// Text rendering used by CSV export and the CLI.
    pub fn render(&self) -> String {
        match self {
            MetricValue::Count(n) => n.to_string(),
            MetricValue::Duration { value, .. } | MetricValue::Percent(value) | MetricValue::Number(value) => {
                format!("{value:.2}")
            }
            MetricValue::Distribution(d) => d
                .iter()
                .map(|(label, n)| format!("{label}={n}"))
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

/// Counts per named bucket, in bucket order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    buckets: Vec<(String, u64)>,
}

impl Distribution {
    pub fn get(&self, label: &str) -> u64 {
        self.buckets
            .iter()
            .find(|(l, _)| l == label)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|(_, n)| n).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.buckets.iter().map(|(l, n)| (l.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (label, n) in &self.buckets {
            map.serialize_entry(label, n)?;
        }
        map.end()
    }
}

/// Named ranges over a numeric value. Bucket `i` is `[bounds[i-1], bounds[i])`;
/// the first bucket is open below and the last is open above, so every value
/// lands in exactly one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSpec {
    labels: Vec<String>,
    upper_bounds: Vec<f64>,
}

impl BucketSpec {
    /// `labels.len()` must be `upper_bounds.len() + 1`; extra labels or bounds are ignored.
    pub fn new(labels: &[&str], upper_bounds: &[f64]) -> Self {
        let n = labels.len().min(upper_bounds.len() + 1).max(1);
        let mut labels: Vec<String> = labels.iter().take(n).map(|s| s.to_string()).collect();
        if labels.is_empty() {
            labels.push("all".to_string());
        }
        Self {
            upper_bounds: upper_bounds.iter().copied().take(labels.len() - 1).collect(),
            labels,
        }
    }

    /// Resolution-time ranges in minutes used by the incident dashboard.
    pub fn resolution_minutes() -> Self {
        Self::new(
            &[
                "lessThan1Hour",
                "oneToTwoHours",
                "twoToFourHours",
                "fourToEightHours",
                "eightToTwelveHours",
                "twelveToTwentyFourHours",
                "moreThan24Hours",
            ],
            &[60.0, 120.0, 240.0, 480.0, 720.0, 1440.0],
        )
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn index_of(&self, value: f64) -> usize {
        self.upper_bounds
            .iter()
            .position(|&upper| value < upper)
            .unwrap_or(self.labels.len() - 1)
    }

    pub fn distribute<I: IntoIterator<Item = f64>>(&self, values: I) -> Distribution {
        let mut counts = vec![0u64; self.labels.len()];
        for v in values {
            counts[self.index_of(v)] += 1;
        }
        Distribution {
            buckets: self.labels.iter().cloned().zip(counts).collect(),
        }
    }
}

/// Where a numeric value comes from.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Field { name: String, divisor: f64 },
    Elapsed { from: String, to: String },
}

/// A numeric measurement read from a record, with an explicit unit.
///
/// Sources are tried in order; the first that yields a value wins. Elapsed
/// sources are computed in minutes and converted to the measure's unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    sources: Vec<Source>,
    unit: Option<TimeUnit>,
}

impl Measure {
    pub fn field(name: &str) -> Self {
        Self {
            sources: vec![Source::Field {
                name: name.to_string(),
                divisor: 1.0,
            }],
            unit: None,
        }
    }

    pub fn elapsed(from: &str, to: &str) -> Self {
        Self {
            sources: vec![Source::Elapsed {
                from: from.to_string(),
                to: to.to_string(),
            }],
            unit: Some(TimeUnit::Minutes),
        }
    }

    /// Fall back to `name` divided by `divisor` (e.g. minutes into hours with 60).
    pub fn or_field_divided(mut self, name: &str, divisor: f64) -> Self {
        self.sources.push(Source::Field {
            name: name.to_string(),
            divisor,
        });
        self
    }

    pub fn or_elapsed(mut self, from: &str, to: &str) -> Self {
        self.sources.push(Source::Elapsed {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    /// Declare the unit field values are in (elapsed sources convert to it).
    pub fn in_unit(mut self, unit: TimeUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn unit(&self) -> Option<TimeUnit> {
        self.unit
    }

    pub fn value(&self, record: &Record) -> Option<f64> {
        self.sources.iter().find_map(|source| match source {
            Source::Field { name, divisor } => normalize::opt_number(record, name).map(|v| v / divisor),
            Source::Elapsed { from, to } => normalize::minutes_between(record, from, to)
                .map(|m| TimeUnit::Minutes.convert(m, self.unit.unwrap_or(TimeUnit::Minutes))),
        })
    }

    fn wrap(&self, value: f64) -> MetricValue {
        let value = finite(value);
        match self.unit {
            Some(unit) => MetricValue::Duration { value, unit },
            None => MetricValue::Number(value),
        }
    }
}

/// A record predicate for rate statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals { field: String, value: String },
    OneOf { field: String, values: Vec<String> },
    Present(String),
    Missing(String),
    Dated(String),
    HasValue(Measure),
    /// A measure exists and is at most `max`.
    AtMost { measure: Measure, max: f64 },
    Not(Box<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(field: &str, value: &str) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn one_of(field: &str, values: &[&str]) -> Self {
        Predicate::OneOf {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Equals { field, value } => normalize::opt_text(record, field)
                .is_some_and(|v| v.eq_ignore_ascii_case(value)),
            Predicate::OneOf { field, values } => normalize::opt_text(record, field)
                .is_some_and(|v| values.iter().any(|c| c.eq_ignore_ascii_case(&v))),
            Predicate::Present(field) => normalize::opt_text(record, field).is_some(),
            Predicate::Missing(field) => normalize::opt_text(record, field).is_none(),
            Predicate::Dated(field) => normalize::timestamp(record, field).is_some(),
            Predicate::HasValue(measure) => measure.value(record).is_some(),
            Predicate::AtMost { measure, max } => measure.value(record).is_some_and(|v| v <= *max),
            Predicate::Not(inner) => !inner.matches(record),
            Predicate::Any(inner) => inner.iter().any(|p| p.matches(record)),
        }
    }
}

/// A statistic to compute over a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    Count,
    CountWhere(Predicate),
    /// Distinct normalized values of a field.
    DistinctCount(String),
    /// Sum over the group; missing values contribute 0.
    Sum(Measure),
    /// `Sum / Count` over the whole group; 0 for an empty group.
    Mean(Measure),
    /// Mean over the records that have a value; 0 when none do.
    MeanOfPresent(Measure),
    Max(Measure),
    Min(Measure),
    /// Nearest-rank percentile, `p` in `[0, 100]`.
    Percentile(Measure, f64),
    /// Share of the group matching the predicate, 0-100.
    Rate(Predicate),
    Buckets(Measure, BucketSpec),
}

pub fn aggregate(group: &[&Record], stat: &Stat) -> MetricValue {
    match stat {
        Stat::Count => MetricValue::Count(group.len() as u64),
        Stat::CountWhere(pred) => {
            MetricValue::Count(group.iter().filter(|r| pred.matches(r)).count() as u64)
        }
        Stat::DistinctCount(field) => {
            let distinct: BTreeSet<String> = group
                .iter()
                .filter_map(|r| normalize::opt_text(r, field))
                .collect();
            MetricValue::Count(distinct.len() as u64)
        }
        Stat::Sum(m) => m.wrap(values(group, m).iter().sum()),
        Stat::Mean(m) => m.wrap(ratio(values(group, m).iter().sum(), group.len() as f64)),
        Stat::MeanOfPresent(m) => m.wrap(mean(&values(group, m))),
        Stat::Max(m) => m.wrap(max(&values(group, m))),
        Stat::Min(m) => m.wrap(min(&values(group, m))),
        Stat::Percentile(m, p) => {
            let mut v = values(group, m);
            sort_values(&mut v);
            m.wrap(nearest_rank(&v, *p))
        }
        Stat::Rate(pred) => {
            let matching = group.iter().filter(|r| pred.matches(r)).count();
            MetricValue::Percent(rate(matching as u64, group.len() as u64))
        }
        Stat::Buckets(m, spec) => {
            // Records without a value are placed as 0 so none is dropped.
            MetricValue::Distribution(spec.distribute(group.iter().map(|r| m.value(r).unwrap_or(0.0))))
        }
    }
}

fn values(group: &[&Record], m: &Measure) -> Vec<f64> {
    group.iter().filter_map(|r| m.value(r)).collect()
}

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Arithmetic mean. Returns 0.0 if the slice is empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

/// Maximum. Returns 0.0 if the slice is empty.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).map_or(0.0, finite)
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).map_or(0.0, finite)
}

/// `numerator / denominator * 100`, 0 when the denominator is 0.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    finite(numerator as f64 / denominator as f64 * 100.0)
}

/// `numerator / denominator` for floats, 0 when the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite(numerator / denominator)
}

fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Nearest-rank percentile over sorted values. Returns 0.0 if empty.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(0.0, 100.0);
    let idx = ((sorted.len() as f64) * p / 100.0).ceil() as usize;
    sorted[idx.clamp(1, sorted.len()) - 1]
}

/// Summary of a duration sample (lead time, resolution time).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadTime {
    pub count: u64,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
    pub unit: TimeUnit,
}

impl LeadTime {
    pub fn empty(unit: TimeUnit) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            median: 0.0,
            p90: 0.0,
            min: 0.0,
            max: 0.0,
            unit,
        }
    }
}

/// Mean, median, p90 and range of a sample; all zero when empty.
pub fn lead_time(values: &[f64], unit: TimeUnit) -> LeadTime {
    if values.is_empty() {
        return LeadTime::empty(unit);
    }
    let mut sorted = values.to_vec();
    sort_values(&mut sorted);

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    LeadTime {
        count: n as u64,
        mean: mean(&sorted),
        median: finite(median),
        p90: finite(nearest_rank(&sorted, 90.0)),
        min: finite(sorted[0]),
        max: finite(sorted[n - 1]),
        unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{group_by, KeyFn};

    fn refs(records: &[Record]) -> Vec<&Record> {
        records.iter().collect()
    }

    #[test]
    fn test_mean_and_rate_on_empty_are_zero() {
        let empty: Vec<&Record> = Vec::new();
        assert_eq!(aggregate(&empty, &Stat::Mean(Measure::field("x"))), MetricValue::Number(0.0));
        assert_eq!(aggregate(&empty, &Stat::MeanOfPresent(Measure::field("x"))), MetricValue::Number(0.0));
        assert_eq!(
            aggregate(&empty, &Stat::Rate(Predicate::Present("x".into()))),
            MetricValue::Percent(0.0)
        );
        assert_eq!(aggregate(&empty, &Stat::Max(Measure::field("x"))).as_f64(), 0.0);
        assert_eq!(aggregate(&empty, &Stat::Count), MetricValue::Count(0));
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(ratio(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_sum_treats_missing_as_zero() {
        let records = vec![
            Record::new().with("h", 2.5),
            Record::new().with("h", "x"),
            Record::new(),
            Record::new().with("h", "1.5"),
        ];
        let stat = Stat::Sum(Measure::field("h").in_unit(TimeUnit::Hours));
        assert_eq!(
            aggregate(&refs(&records), &stat),
            MetricValue::Duration { value: 4.0, unit: TimeUnit::Hours }
        );
    }

    #[test]
    fn test_mean_is_sum_over_group_size() {
        let records = vec![
            Record::new().with("m", 30),
            Record::new().with("m", 90),
            Record::new(),
        ];
        let g = refs(&records);
        let m = Measure::field("m");
        let sum = aggregate(&g, &Stat::Sum(m.clone())).as_f64();
        let count = aggregate(&g, &Stat::Count).as_f64();
        assert_eq!(aggregate(&g, &Stat::Mean(m.clone())).as_f64(), sum / count);
        assert_eq!(aggregate(&g, &Stat::Mean(m.clone())).as_f64(), 40.0);
        assert_eq!(aggregate(&g, &Stat::MeanOfPresent(m)).as_f64(), 60.0);
    }

    #[test]
    fn test_max_min_percentile() {
        let records: Vec<Record> = (1..=10).map(|i| Record::new().with("v", i)).collect();
        let g = refs(&records);
        assert_eq!(aggregate(&g, &Stat::Max(Measure::field("v"))).as_f64(), 10.0);
        assert_eq!(aggregate(&g, &Stat::Min(Measure::field("v"))).as_f64(), 1.0);
        assert_eq!(aggregate(&g, &Stat::Percentile(Measure::field("v"), 90.0)).as_f64(), 9.0);
        assert_eq!(aggregate(&g, &Stat::Percentile(Measure::field("v"), 0.0)).as_f64(), 1.0);
    }

    #[test]
    fn test_rate_is_percentage() {
        let records = vec![
            Record::new().with("s", "Resolved"),
            Record::new().with("s", "open"),
            Record::new().with("s", "RESOLVED"),
            Record::new(),
        ];
        let stat = Stat::Rate(Predicate::equals("s", "resolved"));
        assert_eq!(aggregate(&refs(&records), &stat), MetricValue::Percent(50.0));
    }

    #[test]
    fn test_count_where_and_predicates() {
        let records = vec![
            Record::new().with("transfers", 0).with("prio", "P1"),
            Record::new().with("transfers", 2).with("prio", "p2"),
            Record::new().with("prio", "P3"),
        ];
        let g = refs(&records);
        let has = Stat::CountWhere(Predicate::HasValue(Measure::field("transfers")));
        assert_eq!(aggregate(&g, &has), MetricValue::Count(2));
        let at_most = Stat::CountWhere(Predicate::AtMost { measure: Measure::field("transfers"), max: 0.0 });
        assert_eq!(aggregate(&g, &at_most), MetricValue::Count(1));
        let one_of = Stat::CountWhere(Predicate::one_of("prio", &["p1", "P2"]));
        assert_eq!(aggregate(&g, &one_of), MetricValue::Count(2));
        let not = Stat::CountWhere(Predicate::Not(Box::new(Predicate::Missing("transfers".into()))));
        assert_eq!(aggregate(&g, &not), MetricValue::Count(2));
        let any = Stat::CountWhere(Predicate::Any(vec![
            Predicate::equals("prio", "p3"),
            Predicate::Dated("transfers".into()),
        ]));
        assert_eq!(aggregate(&g, &any), MetricValue::Count(1));
    }

    #[test]
    fn test_distinct_count() {
        let records = vec![
            Record::new().with("u", "a"),
            Record::new().with("u", "b"),
            Record::new().with("u", "a"),
            Record::new(),
        ];
        assert_eq!(
            aggregate(&refs(&records), &Stat::DistinctCount("u".into())),
            MetricValue::Count(2)
        );
    }

    #[test]
    fn test_buckets_half_open_and_total() {
        let spec = BucketSpec::resolution_minutes();
        assert_eq!(spec.index_of(59.9), 0);
        assert_eq!(spec.index_of(60.0), 1);
        assert_eq!(spec.index_of(1439.0), 5);
        assert_eq!(spec.index_of(1440.0), 6);
        assert_eq!(spec.index_of(-30.0), 0);
        assert_eq!(spec.index_of(0.0), 0);

        let values = [-5.0, 0.0, 30.0, 90.0, 200.0, 479.0, 500.0, 1000.0, 1440.0, 99999.0];
        let dist = spec.distribute(values);
        assert_eq!(dist.total(), values.len() as u64);
        assert_eq!(dist.get("lessThan1Hour"), 3);
        assert_eq!(dist.get("moreThan24Hours"), 2);
    }

    #[test]
    fn test_buckets_keep_records_without_value() {
        let records = vec![Record::new().with("m", 30), Record::new()];
        let stat = Stat::Buckets(Measure::field("m"), BucketSpec::resolution_minutes());
        let MetricValue::Distribution(d) = aggregate(&refs(&records), &stat) else {
            panic!("expected distribution");
        };
        assert_eq!(d.total(), 2);
        assert_eq!(d.len(), 7);
    }

    #[test]
    fn test_bucket_spec_tolerates_mismatched_lengths() {
        let spec = BucketSpec::new(&["low", "high"], &[10.0, 20.0, 30.0]);
        assert_eq!(spec.labels().count(), 2);
        assert_eq!(spec.index_of(25.0), 1);
        let single = BucketSpec::new(&[], &[]);
        assert_eq!(single.distribute([1.0, 2.0]).total(), 2);
    }

    #[test]
    fn test_elapsed_measure_units() {
        let r = Record::new()
            .with("a", "2025-01-06T09:00:00Z")
            .with("b", "2025-01-06T12:00:00Z");
        assert_eq!(Measure::elapsed("a", "b").value(&r), Some(180.0));
        assert_eq!(Measure::elapsed("a", "b").in_unit(TimeUnit::Hours).value(&r), Some(3.0));
        let fallback = Measure::field("precomputed").or_elapsed("a", "b");
        assert_eq!(fallback.value(&r), Some(180.0));
        let scaled = Measure::field("hours").or_field_divided("minutes", 60.0);
        assert_eq!(scaled.value(&Record::new().with("minutes", 90)), Some(1.5));
    }

    #[test]
    fn test_sum_is_additive_under_partition() {
        let records: Vec<Record> = (0..30)
            .map(|i| {
                Record::new()
                    .with("team", ["a", "b", "c"][i % 3])
                    .with("user", format!("u{}", i % 7))
                    .with("h", (i as f64) * 0.5)
            })
            .collect();
        let stat = Stat::Sum(Measure::field("h"));
        let total = aggregate(&refs(&records), &stat).as_f64();
        for key in [KeyFn::field("team"), KeyFn::field("user")] {
            let groups = group_by(&records, &key);
            let parts: f64 = groups.iter().map(|g| aggregate(&g.records, &stat).as_f64()).sum();
            assert!((parts - total).abs() < 1e-9);
            let counts: u64 = groups.iter().map(|g| aggregate(&g.records, &Stat::Count).as_count()).sum();
            assert_eq!(counts, records.len() as u64);
        }
    }

    #[test]
    fn test_lead_time_summary() {
        let lt = lead_time(&[5.0], TimeUnit::Days);
        assert_eq!((lt.mean, lt.median, lt.p90, lt.min, lt.max), (5.0, 5.0, 5.0, 5.0, 5.0));

        let days: Vec<f64> = (1..=100).map(|d| d as f64).collect();
        let lt = lead_time(&days, TimeUnit::Days);
        assert_eq!(lt.mean, 50.5);
        assert_eq!(lt.median, 50.5);
        assert_eq!(lt.p90, 90.0);
        assert_eq!(lt.count, 100);

        let empty = lead_time(&[], TimeUnit::Hours);
        assert_eq!(empty, LeadTime::empty(TimeUnit::Hours));
    }

    #[test]
    fn test_render_values() {
        assert_eq!(MetricValue::Count(3).render(), "3");
        assert_eq!(MetricValue::Percent(12.345).render(), "12.35");
        let d = BucketSpec::new(&["lo", "hi"], &[10.0]).distribute([1.0, 20.0, 30.0]);
        assert_eq!(MetricValue::Distribution(d).render(), "lo=1;hi=2");
    }
}
