use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::aggregate::{aggregate, MetricValue, Stat};
use crate::group::{group_by, Group, GroupKey, KeyFn};
use crate::record::Record;

/// Row ordering of a pivot result.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOrder {
    /// First-seen group order.
    Insertion,
    /// By the start date of the key's time component.
    Chronological,
    /// Lexical by key.
    KeyAscending,
    /// Descending by the named column; ties keep insertion order.
    Descending(String),
}

/// A named statistic column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub stat: Stat,
}

impl Column {
    pub fn new(name: &str, stat: Stat) -> Self {
        Self {
            name: name.to_string(),
            stat,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotSpec {
    pub key: KeyFn,
    pub columns: Vec<Column>,
    pub order: RowOrder,
    pub limit: Option<usize>,
}

impl PivotSpec {
    pub fn new(key: KeyFn) -> Self {
        Self {
            key,
            columns: Vec::new(),
            order: RowOrder::Insertion,
            limit: None,
        }
    }

    pub fn column(mut self, name: &str, stat: Stat) -> Self {
        self.columns.push(Column::new(name, stat));
        self
    }

    pub fn order(mut self, order: RowOrder) -> Self {
        self.order = order;
        self
    }

    pub fn descending(self, column: &str) -> Self {
        self.order(RowOrder::Descending(column.to_string()))
    }

    pub fn chronological(self) -> Self {
        self.order(RowOrder::Chronological)
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Ordered named values, serialized as a JSON object in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Vec<(String, MetricValue)>);

impl Values {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Values {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Evaluate every column over one group of records.
pub fn evaluate(records: &[&Record], columns: &[Column]) -> Values {
    Values(
        columns
            .iter()
            .map(|c| (c.name.clone(), aggregate(records, &c.stat)))
            .collect(),
    )
}

/// One `{ key, value... }` row of an aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRow {
    pub key: GroupKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    pub values: Values,
}

impl AggregateRow {
    pub fn get(&self, column: &str) -> Option<&MetricValue> {
        self.values.get(column)
    }

    /// Scalar value of a column, 0 when the column does not exist.
    pub fn value(&self, column: &str) -> f64 {
        self.get(column).map_or(0.0, MetricValue::as_f64)
    }

    pub fn count(&self, column: &str) -> u64 {
        self.get(column).map_or(0, MetricValue::as_count)
    }
}

/// Group `records` by the spec's key and evaluate its columns per group.
pub fn pivot<'a, I>(records: I, spec: &PivotSpec) -> Vec<AggregateRow>
where
    I: IntoIterator<Item = &'a Record>,
{
    let groups = group_by(records, &spec.key);
    let ordered: Vec<Group<'_>> = match spec.order {
        RowOrder::Chronological => groups.into_chronological(),
        _ => groups.into_vec(),
    };

    let mut rows: Vec<AggregateRow> = ordered
        .into_iter()
        .map(|g| AggregateRow {
            values: evaluate(&g.records, &spec.columns),
            key: g.key,
            period_start: g.period_start,
        })
        .collect();

    match &spec.order {
        RowOrder::KeyAscending => rows.sort_by(|a, b| a.key.cmp(&b.key)),
        // sort_by is stable, so equal values keep first-seen order.
        RowOrder::Descending(column) => rows.sort_by(|a, b| {
            b.value(column)
                .partial_cmp(&a.value(column))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        RowOrder::Insertion | RowOrder::Chronological => {}
    }

    if let Some(n) = spec.limit {
        rows.truncate(n);
    }
    rows
}
