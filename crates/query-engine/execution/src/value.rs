//! Values as they come back from the driver.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// A single decoded column value.
///
/// This is the shape the driver hands back: it says what kind of value it is,
/// never which database type it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<RawValue>),
    Object(Map<String, Value>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Build a value from decoded JSON. JSON arrays become sequences and JSON
    /// objects stay objects, the same shapes any other column would produce.
    pub fn from_json(value: Value) -> RawValue {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => n.as_f64().map_or(RawValue::Null, RawValue::Float),
            },
            Value::String(s) => RawValue::Text(s),
            Value::Array(items) => RawValue::Array(items.into_iter().map(RawValue::from_json).collect()),
            Value::Object(object) => RawValue::Object(object),
        }
    }

    /// The plain JSON rendering of the value, with no wire-specific encoding.
    ///
    /// Non-finite floats have no JSON form and become `null`. Timestamps are
    /// rendered as ISO-8601 in UTC with millisecond precision.
    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Null => Value::Null,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Int(i) => Value::Number((*i).into()),
            RawValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            RawValue::Text(s) => Value::String(s.clone()),
            RawValue::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            RawValue::Array(items) => Value::Array(items.iter().map(RawValue::to_json).collect()),
            RawValue::Object(object) => Value::Object(object.clone()),
        }
    }
}

/// One result row: column names paired with their values, in column order.
///
/// Duplicate column names are kept, so the row always has exactly one entry
/// per output column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, RawValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, RawValue)>) -> Row {
        Row { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The first value under the given column name.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &RawValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn into_values(self) -> impl Iterator<Item = RawValue> {
        self.columns.into_iter().map(|(_, value)| value)
    }
}

impl FromIterator<(String, RawValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, RawValue)>>(iter: I) -> Self {
        Row::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn json_arrays_become_sequences() {
        let value = RawValue::from_json(json!([1, 2.5, null, "x", {"a": true}]));
        let mut object = Map::new();
        object.insert("a".to_string(), Value::Bool(true));
        assert_eq!(
            value,
            RawValue::Array(vec![
                RawValue::Int(1),
                RawValue::Float(2.5),
                RawValue::Null,
                RawValue::Text("x".to_string()),
                RawValue::Object(object),
            ])
        );
    }

    #[test]
    fn timestamps_render_as_iso_8601() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            RawValue::Timestamp(ts).to_json(),
            json!("2024-03-01T12:30:05.000Z")
        );
    }

    #[test]
    fn non_finite_floats_render_as_null() {
        assert_eq!(RawValue::Float(f64::NAN).to_json(), Value::Null);
        assert_eq!(RawValue::Float(f64::INFINITY).to_json(), Value::Null);
    }

    #[test]
    fn rows_keep_duplicate_columns() {
        let row: Row = vec![
            ("?column?".to_string(), RawValue::Int(1)),
            ("?column?".to_string(), RawValue::Int(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("?column?"), Some(&RawValue::Int(1)));
        assert_eq!(
            row.values().cloned().collect::<Vec<_>>(),
            vec![RawValue::Int(1), RawValue::Int(2)]
        );
    }
}
