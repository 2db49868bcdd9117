//! Serialize raw values for a column of a given tag.

use chrono::{DateTime, SecondsFormat, Utc};
use query_engine_execution::RawValue;
use query_engine_metadata::metadata::TypeTag;
use serde_json::Value;

/// Encode a value for the wire. The checks are ordered and the first match
/// wins; anything not covered passes through as plain JSON.
pub fn encode_value(value: &RawValue, tag: TypeTag) -> Value {
    match (value, tag) {
        (RawValue::Null, _) => Value::Null,
        (RawValue::Timestamp(ts), TypeTag::TimestampWithTimeZone) => {
            Value::String(timestamp_with_time_zone(ts))
        }
        (RawValue::Timestamp(ts), TypeTag::TimestampWithoutTimeZone) => {
            Value::String(timestamp_without_time_zone(ts))
        }
        (RawValue::Timestamp(ts), _) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        (RawValue::Bool(b), TypeTag::Boolean) => Value::String(boolean(*b).to_string()),
        (RawValue::Array(items), tag) if tag.is_array() => Value::String(array_literal(items)),
        (RawValue::Object(_), TypeTag::Jsonb) => Value::String(value.to_json().to_string()),
        (value, _) => value.to_json(),
    }
}

fn boolean(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "f"
    }
}

/// `YYYY-MM-DD HH:MM:SS.mmm+00`
pub fn timestamp_with_time_zone(ts: &DateTime<Utc>) -> String {
    format!("{}+00", timestamp_without_time_zone(ts))
}

/// `YYYY-MM-DD HH:MM:SS.mmm`
pub fn timestamp_without_time_zone(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Render a sequence as a brace-delimited array literal.
pub fn array_literal(items: &[RawValue]) -> String {
    let elements: Vec<String> = items.iter().map(array_element).collect();
    format!("{{{}}}", elements.join(","))
}

fn array_element(item: &RawValue) -> String {
    match item {
        RawValue::Null => "NULL".to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) if f.is_nan() => "NaN".to_string(),
        RawValue::Float(f) if f.is_infinite() && f.is_sign_positive() => "Infinity".to_string(),
        RawValue::Float(f) if f.is_infinite() => "-Infinity".to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Text(text) => quote_element(text),
        RawValue::Timestamp(ts) => quote_element(&timestamp_with_time_zone(ts)),
        RawValue::Array(items) => array_literal(items),
        RawValue::Object(_) => quote_element(&item.to_json().to_string()),
    }
}

/// Quote an element when it would otherwise be misread: it contains a quote,
/// backslash, comma, brace or space, is empty, or spells `NULL`.
fn quote_element(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '"' | '\\' | ',' | '{' | '}' | ' '));
    if !needs_quotes {
        return text.to_string();
    }
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
