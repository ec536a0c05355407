use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::date_util::parse_timestamp;
use crate::record::Record;

/// Default label for categorical fields (priority, status, type, team).
pub const UNKNOWN: &str = "Unknown";

/// Default label for assignee-like fields.
pub const UNASSIGNED: &str = "Unassigned";

/// Keys probed, in order, when a categorical value is an object.
const DISPLAY_KEYS: &[&str] = &["name", "displayName", "value", "key"];

/// Return the field's display text, or `default` when absent, null or blank.
pub fn text(record: &Record, field: &str, default: &str) -> String {
    opt_text(record, field).unwrap_or_else(|| default.to_string())
}

/// Categorical field with the `"Unknown"` fallback.
pub fn category(record: &Record, field: &str) -> String {
    text(record, field, UNKNOWN)
}

/// Assignee-like field with the `"Unassigned"` fallback.
pub fn assignee(record: &Record, field: &str) -> String {
    text(record, field, UNASSIGNED)
}

/// Display text of a field, `None` when absent, null or blank.
pub fn opt_text(record: &Record, field: &str) -> Option<String> {
    record.get(field).and_then(value_text)
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => DISPLAY_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(value_text)),
        Value::Null | Value::Array(_) => None,
    }
}

/// Numeric field value, `None` when absent or not interpretable as a finite number.
///
/// Numeric strings are accepted (`" 42.5 "`); booleans are not numbers.
pub fn opt_number(record: &Record, field: &str) -> Option<f64> {
    let n = match record.get(field)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Numeric field with the `0` fallback.
pub fn number(record: &Record, field: &str) -> f64 {
    opt_number(record, field).unwrap_or(0.0)
}

/// Timestamp field normalized to UTC, `None` when absent or unparsable.
pub fn timestamp(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    match record.get(field)? {
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Minutes elapsed between two timestamp fields, when both parse.
pub fn minutes_between(record: &Record, from: &str, to: &str) -> Option<f64> {
    let start = timestamp(record, from)?;
    let end = timestamp(record, to)?;
    Some((end - start).num_seconds() as f64 / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_defaults() {
        let r = Record::new()
            .with("priority", "High")
            .with("status", Value::Null)
            .with("team", "   ");
        assert_eq!(category(&r, "priority"), "High");
        assert_eq!(category(&r, "status"), UNKNOWN);
        assert_eq!(category(&r, "team"), UNKNOWN);
        assert_eq!(category(&r, "missing"), UNKNOWN);
        assert_eq!(assignee(&r, "assignee"), UNASSIGNED);
    }

    #[test]
    fn test_text_from_tracker_objects() {
        let r = Record::new()
            .with("priority", json!({"id": "2", "name": "High"}))
            .with("assignee", json!({"displayName": "Ana Lima"}))
            .with("empty", json!({"self": "https://x"}));
        assert_eq!(category(&r, "priority"), "High");
        assert_eq!(assignee(&r, "assignee"), "Ana Lima");
        assert_eq!(category(&r, "empty"), UNKNOWN);
    }

    #[test]
    fn test_text_scalars() {
        let r = Record::new().with("team_id", 7).with("vip", true);
        assert_eq!(category(&r, "team_id"), "7");
        assert_eq!(category(&r, "vip"), "true");
    }

    #[test]
    fn test_number_variants() {
        let r = Record::new()
            .with("hours", 7.5)
            .with("minutes", " 90 ")
            .with("bogus", "abc")
            .with("flag", true);
        assert_eq!(number(&r, "hours"), 7.5);
        assert_eq!(number(&r, "minutes"), 90.0);
        assert_eq!(number(&r, "bogus"), 0.0);
        assert_eq!(number(&r, "flag"), 0.0);
        assert_eq!(number(&r, "missing"), 0.0);
        assert_eq!(opt_number(&r, "missing"), None);
    }

    #[test]
    fn test_minutes_between() {
        let r = Record::new()
            .with("reported", "2025-01-06T09:00:00Z")
            .with("resolved", "2025-01-06T10:30:00Z")
            .with("broken", "yesterday");
        assert_eq!(minutes_between(&r, "reported", "resolved"), Some(90.0));
        assert_eq!(minutes_between(&r, "reported", "broken"), None);
        assert!(timestamp(&r, "broken").is_none());
    }
}
