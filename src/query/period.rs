use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use regex::Regex;

use crate::date_util::{last_day_of_month, quarter_of};
use crate::error::{Error, Result};
use crate::filter::DateRange;

static RE_HALF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-[Hh]([12])$").unwrap());
static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-[Qq]([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-[Ww](\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,5})[dD]$").unwrap());

/// Calendar unit a to-date period starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Year,
    Half,
    Quarter,
    Month,
    Week,
}

/// A named reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    Half(i32, u8),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
    /// The last `n` days ending on the given day.
    Rolling(u32, NaiveDate),
    /// From the start of the unit containing the given day, up to that day.
    ToDate(Unit, NaiveDate),
}

impl Period {
    /// Parse a period string relative to the current UTC day.
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_as_of(s, Utc::now().date_naive())
    }

    /// Parse a period string; relative periods end on `today`.
    ///
    /// Supported formats:
    /// - `2025`: year
    /// - `2025-H1`: half
    /// - `2025-Q1`: quarter
    /// - `2025-01`: month
    /// - `2025-W05`: ISO week
    /// - `30d`: rolling last N days
    /// - `ytd`, `htd`, `qtd`, `mtd`, `wtd`: unit to date
    pub fn parse_as_of(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        let unit = match s.to_lowercase().as_str() {
            "ytd" => Some(Unit::Year),
            "htd" => Some(Unit::Half),
            "qtd" => Some(Unit::Quarter),
            "mtd" => Some(Unit::Month),
            "wtd" => Some(Unit::Week),
            _ => None,
        };
        if let Some(unit) = unit {
            return Ok(Period::ToDate(unit, today));
        }

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = number(&caps[1], s)?;
            if n == 0 {
                return Err(Error::PeriodParse(format!("rolling period must be at least 1 day: {s}")));
            }
            return Ok(Period::Rolling(n, today));
        }

        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        if let Some(caps) = RE_HALF.captures(s) {
            return Ok(Period::Half(number(&caps[1], s)?, number(&caps[2], s)?));
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            return Ok(Period::Quarter(number(&caps[1], s)?, number(&caps[2], s)?));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = number(&caps[1], s)?;
            let week: u8 = number(&caps[2], s)?;
            if NaiveDate::from_isoywd_opt(year, u32::from(week), Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = number(&caps[1], s)?;
            let month: u8 = number(&caps[2], s)?;
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::Year(y) => format!("{y}"),
            Period::Half(y, h) => format!("{y}-H{h}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Rolling(n, _) => format!("{n}d"),
            Period::ToDate(unit, _) => {
                let key = match unit {
                    Unit::Year => "ytd",
                    Unit::Half => "htd",
                    Unit::Quarter => "qtd",
                    Unit::Month => "mtd",
                    Unit::Week => "wtd",
                };
                key.to_string()
            }
        }
    }

    /// Inclusive calendar range covered by this period.
    pub fn date_range(&self) -> Result<DateRange> {
        let (start, end) = match self {
            Period::Year(y) => (ymd(*y, 1, 1)?, ymd(*y, 12, 31)?),
            Period::Half(y, h) => {
                let start_month = if *h == 1 { 1 } else { 7 };
                (ymd(*y, start_month, 1)?, last_day_of_month(*y, start_month + 5))
            }
            Period::Quarter(y, q) => {
                let start_month = (u32::from(*q) - 1) * 3 + 1;
                (ymd(*y, start_month, 1)?, last_day_of_month(*y, start_month + 2))
            }
            Period::Month(y, m) => (ymd(*y, u32::from(*m), 1)?, last_day_of_month(*y, u32::from(*m))),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, u32::from(*w), Weekday::Mon)
                    .ok_or_else(|| Error::PeriodParse(format!("no week {w} in {y}")))?;
                (start, start + Duration::days(6))
            }
            Period::Rolling(n, as_of) => (*as_of - Duration::days(i64::from(*n) - 1), *as_of),
            Period::ToDate(unit, as_of) => (unit_start(*unit, *as_of)?, *as_of),
        };
        Ok(DateRange::new(start, end))
    }

    /// The period of the same shape immediately before this one.
    ///
    /// To-date periods have no fixed predecessor and return `None`.
    pub fn previous(&self) -> Option<Self> {
        let prev = match self {
            Period::Year(y) => Period::Year(y - 1),
            Period::Half(y, 1) => Period::Half(y - 1, 2),
            Period::Half(y, h) => Period::Half(*y, h - 1),
            Period::Quarter(y, 1) => Period::Quarter(y - 1, 4),
            Period::Quarter(y, q) => Period::Quarter(*y, q - 1),
            Period::Month(y, 1) => Period::Month(y - 1, 12),
            Period::Month(y, m) => Period::Month(*y, m - 1),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, u32::from(*w), Weekday::Mon)?;
                let iw = (start - Duration::days(7)).iso_week();
                Period::Week(iw.year(), iw.week() as u8)
            }
            Period::Rolling(n, as_of) => Period::Rolling(*n, *as_of - Duration::days(i64::from(*n))),
            Period::ToDate(..) => return None,
        };
        Some(prev)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

fn number<T: std::str::FromStr>(digits: &str, input: &str) -> Result<T> {
    digits
        .parse()
        .map_err(|_| Error::PeriodParse(format!("invalid number in period: {input}")))
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::PeriodParse(format!("invalid date {year}-{month:02}-{day:02}")))
}

fn unit_start(unit: Unit, d: NaiveDate) -> Result<NaiveDate> {
    match unit {
        Unit::Year => ymd(d.year(), 1, 1),
        Unit::Half => ymd(d.year(), if d.month() <= 6 { 1 } else { 7 }, 1),
        Unit::Quarter => ymd(d.year(), (u32::from(quarter_of(d)) - 1) * 3 + 1, 1),
        Unit::Month => ymd(d.year(), d.month(), 1),
        Unit::Week => Ok(d - Duration::days(i64::from(d.weekday().num_days_from_monday()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        // A Thursday in the first quarter.
        date(2025, 2, 13)
    }

    fn range_of(s: &str) -> DateRange {
        Period::parse_as_of(s, today()).unwrap().date_range().unwrap()
    }

    #[test]
    fn test_parse_calendar_periods() {
        assert_eq!(Period::parse_as_of("2025", today()).unwrap(), Period::Year(2025));
        assert_eq!(Period::parse_as_of("2025-H2", today()).unwrap(), Period::Half(2025, 2));
        assert_eq!(Period::parse_as_of("2025-q1", today()).unwrap(), Period::Quarter(2025, 1));
        assert_eq!(Period::parse_as_of("2025-01", today()).unwrap(), Period::Month(2025, 1));
        assert_eq!(Period::parse_as_of("2025-W5", today()).unwrap(), Period::Week(2025, 5));
    }

    #[test]
    fn test_parse_relative_periods() {
        assert_eq!(Period::parse_as_of("30d", today()).unwrap(), Period::Rolling(30, today()));
        assert_eq!(Period::parse_as_of("MTD", today()).unwrap(), Period::ToDate(Unit::Month, today()));
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["garbage", "2025-Q5", "2025-13", "2025-W54", "0d", ""] {
            assert!(Period::parse_as_of(bad, today()).is_err(), "{bad} should not parse");
        }
        assert!(matches!(Period::parse_as_of("x", today()), Err(Error::PeriodParse(_))));
    }

    #[test]
    fn test_calendar_ranges() {
        assert_eq!(range_of("2025"), DateRange::new(date(2025, 1, 1), date(2025, 12, 31)));
        assert_eq!(range_of("2025-H1"), DateRange::new(date(2025, 1, 1), date(2025, 6, 30)));
        assert_eq!(range_of("2025-Q2"), DateRange::new(date(2025, 4, 1), date(2025, 6, 30)));
        assert_eq!(range_of("2024-02"), DateRange::new(date(2024, 2, 1), date(2024, 2, 29)));
        let week = range_of("2025-W01");
        assert_eq!(week.start, date(2024, 12, 30));
        assert_eq!(week.days(), 7);
    }

    #[test]
    fn test_relative_ranges() {
        assert_eq!(range_of("7d"), DateRange::new(date(2025, 2, 7), today()));
        assert_eq!(range_of("ytd"), DateRange::new(date(2025, 1, 1), today()));
        assert_eq!(range_of("qtd"), DateRange::new(date(2025, 1, 1), today()));
        assert_eq!(range_of("htd").start, date(2025, 1, 1));
        assert_eq!(range_of("mtd"), DateRange::new(date(2025, 2, 1), today()));
        assert_eq!(range_of("wtd"), DateRange::new(date(2025, 2, 10), today()));
    }

    #[test]
    fn test_to_key_round_trips_through_parse() {
        for key in ["2025", "2025-H1", "2025-Q3", "2025-07", "2025-W09", "30d", "ytd"] {
            assert_eq!(Period::parse_as_of(key, today()).unwrap().to_key(), key);
        }
    }

    #[test]
    fn test_previous() {
        assert_eq!(Period::Half(2025, 1).previous(), Some(Period::Half(2024, 2)));
        assert_eq!(Period::Quarter(2025, 1).previous(), Some(Period::Quarter(2024, 4)));
        assert_eq!(Period::Month(2025, 6).previous(), Some(Period::Month(2025, 5)));
        assert_eq!(Period::Week(2021, 1).previous(), Some(Period::Week(2020, 53)));
        assert_eq!(
            Period::Rolling(7, today()).previous(),
            Some(Period::Rolling(7, date(2025, 2, 6)))
        );
        assert_eq!(Period::ToDate(Unit::Year, today()).previous(), None);
    }
}
