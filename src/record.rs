use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A single domain record: a mapping from field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style setter used heavily by tests and fixtures.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Look up a field by name or dotted path.
    ///
    /// An exact top-level key wins over path traversal, so a flat column that
    /// happens to contain a dot (`"sla.target"`) is still reachable.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.fields.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

/// Decode a fetched payload into records.
///
/// Accepts a bare array of objects, an issue-tracker search response
/// (`{"issues": [...]}`) or a REST envelope (`{"data": [...]}`). Elements that
/// are not objects are skipped.
pub fn records_from_value(value: Value) -> Result<Vec<Record>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let envelope = ["issues", "data", "records"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                });
            match envelope {
                Some(items) => items,
                None => {
                    return Err(Error::Payload(
                        "expected an array or an object with an `issues`, `data` or `records` array"
                            .into(),
                    ))
                }
            }
        }
        other => {
            return Err(Error::Payload(format!(
                "expected an array of records, got {}",
                json_type_name(&other)
            )))
        }
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Value::Object(map) => Some(Record::from_map(map)),
            other => {
                log::warn!("Skipping payload element {i}: not an object ({})", json_type_name(&other));
                None
            }
        })
        .collect();
    log::debug!("Decoded {} of {total} payload elements as records", records.len());
    Ok(records)
}

/// Decode a JSON document (as text) into records.
pub fn records_from_str(s: &str) -> Result<Vec<Record>> {
    records_from_value(serde_json::from_str(s)?)
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
