use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::filter::DateRange;
use crate::group::{group_by, Granularity, KeyFn};
use crate::pivot::{evaluate, Column, Values};
use crate::record::Record;

/// Options for [`build_series`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesOptions {
    /// Synthesize zero-valued points for empty buckets across this range.
    pub fill: Option<DateRange>,
}

impl SeriesOptions {
    pub fn sparse() -> Self {
        Self::default()
    }

    pub fn fill_gaps(range: DateRange) -> Self {
        Self { fill: Some(range) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Canonical period label (`2025-01-06`, `2025-W02`, `2025-01`).
    pub period: String,
    /// Short axis label (`06 Jan`, `Wk 02`, `Jan-25`).
    pub label: String,
    pub start: NaiveDate,
    pub values: Values,
}

impl SeriesPoint {
    pub fn value(&self, column: &str) -> f64 {
        self.values.get(column).map_or(0.0, |v| v.as_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
    /// Records left out because their date field was missing or unparsable.
    pub skipped_undated: u64,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Build a chronologically ordered series of `columns` per period of `date_field`.
///
/// Points are ordered by bucket start date; display labels such as `Jan-24`
/// are derived from that date and never parsed back.
pub fn build_series(
    records: &[Record],
    date_field: &str,
    granularity: Granularity,
    columns: &[Column],
    options: &SeriesOptions,
) -> Series {
    let groups = group_by(records, &KeyFn::time_bucket(date_field, granularity));
    let skipped_undated = groups.skipped() as u64;

    let mut points: Vec<SeriesPoint> = groups
        .into_iter()
        .filter_map(|g| {
            let start = g.period_start?;
            Some(point(granularity, start, evaluate(&g.records, columns)))
        })
        .collect();

    if let Some(range) = &options.fill {
        let present: BTreeSet<NaiveDate> = points.iter().map(|p| p.start).collect();
        let mut start = granularity.bucket_start(range.start);
        while start <= range.end {
            if !present.contains(&start) {
                points.push(point(granularity, start, evaluate(&[], columns)));
            }
            start = granularity.next_start(start);
        }
    }

    points.sort_by_key(|p| p.start);
    Series {
        granularity,
        points,
        skipped_undated,
    }
}

fn point(granularity: Granularity, start: NaiveDate, values: Values) -> SeriesPoint {
    SeriesPoint {
        period: granularity.label(start),
        label: granularity.display_label(start),
        start,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Measure, Stat};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn logs() -> Vec<Record> {
        vec![
            Record::new().with("start", "2025-01-08T10:00:00Z").with("hours", 2),
            Record::new().with("start", "2025-01-06T08:00:00Z").with("hours", 4),
            Record::new().with("start", "2025-01-08T14:00:00Z").with("hours", 3),
            Record::new().with("start", "not-a-date").with("hours", 8),
        ]
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("hours", Stat::Sum(Measure::field("hours"))),
            Column::new("entries", Stat::Count),
        ]
    }

    #[test]
    fn test_daily_series_sorted_and_sparse() {
        let s = build_series(&logs(), "start", Granularity::Day, &columns(), &SeriesOptions::sparse());
        let got: Vec<(&str, f64)> = s.points.iter().map(|p| (p.period.as_str(), p.value("hours"))).collect();
        assert_eq!(got, vec![("2025-01-06", 4.0), ("2025-01-08", 5.0)]);
        assert_eq!(s.skipped_undated, 1);
    }

    #[test]
    fn test_daily_series_zero_filled() {
        let range = DateRange::new(date(2025, 1, 5), date(2025, 1, 9));
        let s = build_series(&logs(), "start", Granularity::Day, &columns(), &SeriesOptions::fill_gaps(range));
        let got: Vec<(&str, f64)> = s.points.iter().map(|p| (p.period.as_str(), p.value("entries"))).collect();
        assert_eq!(
            got,
            vec![
                ("2025-01-05", 0.0),
                ("2025-01-06", 1.0),
                ("2025-01-07", 0.0),
                ("2025-01-08", 2.0),
                ("2025-01-09", 0.0)
            ]
        );
    }

    #[test]
    fn test_monthly_series_chronological_not_lexical_on_labels() {
        // "Dec-24" sorts after "Jan-25" lexically; the start date decides.
        let records = vec![
            Record::new().with("at", "2025-01-10"),
            Record::new().with("at", "2024-12-10"),
            Record::new().with("at", "2024-02-10"),
        ];
        let cols = vec![Column::new("n", Stat::Count)];
        let s = build_series(&records, "at", Granularity::Month, &cols, &SeriesOptions::sparse());
        let labels: Vec<&str> = s.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Feb-24", "Dec-24", "Jan-25"]);
    }

    #[test]
    fn test_series_order_is_independent_of_input_order() {
        let mut records = logs();
        let forward = build_series(&records, "start", Granularity::Week, &columns(), &SeriesOptions::sparse());
        records.reverse();
        let backward = build_series(&records, "start", Granularity::Week, &columns(), &SeriesOptions::sparse());
        assert_eq!(forward.points.len(), 1);
        assert_eq!(forward.points[0].period, backward.points[0].period);
        assert_eq!(forward.points[0].value("hours"), backward.points[0].value("hours"));
        assert!(forward.points.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_empty_input_fill_produces_zero_points() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 3, 31));
        let s = build_series(&[], "at", Granularity::Month, &columns(), &SeriesOptions::fill_gaps(range));
        assert_eq!(s.len(), 3);
        assert!(s.points.iter().all(|p| p.value("hours") == 0.0));
    }

    #[test]
    fn test_long_range_fill_keeps_one_point_per_day() {
        let range = DateRange::new(date(1925, 1, 1), date(2025, 1, 31));
        let s = build_series(&logs(), "start", Granularity::Day, &columns(), &SeriesOptions::fill_gaps(range));
        assert_eq!(s.len() as i64, range.days());
        let busy: Vec<&str> = s
            .points
            .iter()
            .filter(|p| p.value("entries") > 0.0)
            .map(|p| p.period.as_str())
            .collect();
        assert_eq!(busy, vec!["2025-01-06", "2025-01-08"]);
    }
}
