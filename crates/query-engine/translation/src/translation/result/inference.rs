//! Infer a column's type tag from a sampled value.

use query_engine_execution::RawValue;
use query_engine_metadata::metadata::TypeTag;

/// The tag for a column whose first value is `value`.
///
/// The checks run in a fixed order and the first match wins. A null sample
/// carries no information, so the column is reported as text.
pub fn infer_type_tag(value: &RawValue) -> TypeTag {
    match value {
        RawValue::Bool(_) => TypeTag::Boolean,
        RawValue::Int(_) => TypeTag::Integer,
        RawValue::Float(f) if is_whole(*f) => TypeTag::Integer,
        RawValue::Float(_) => TypeTag::DoublePrecision,
        RawValue::Timestamp(_) => TypeTag::TimestampWithTimeZone,
        RawValue::Array(items) => infer_array_tag(items),
        RawValue::Object(_) => TypeTag::Jsonb,
        RawValue::Text(text) if looks_like_json(text) => TypeTag::Jsonb,
        RawValue::Text(_) | RawValue::Null => TypeTag::Text,
    }
}

/// Arrays are tagged by their first non-null element.
fn infer_array_tag(items: &[RawValue]) -> TypeTag {
    match items.iter().find(|item| !item.is_null()) {
        Some(RawValue::Bool(_)) => TypeTag::BooleanArray,
        Some(RawValue::Int(_)) => TypeTag::IntegerArray,
        Some(RawValue::Float(f)) if is_whole(*f) => TypeTag::IntegerArray,
        Some(RawValue::Float(_)) => TypeTag::FloatArray,
        _ => TypeTag::TextArray,
    }
}

fn is_whole(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0
}

/// Strings that are delimited like a JSON object or array and parse as one.
fn looks_like_json(text: &str) -> bool {
    let text = text.trim();
    let delimited = (text.starts_with('{') && text.ends_with('}'))
        || (text.starts_with('[') && text.ends_with(']'));
    delimited && serde_json::from_str::<serde_json::Value>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn whole_numbers_are_integers() {
        assert_eq!(infer_type_tag(&RawValue::Int(7)), TypeTag::Integer);
        assert_eq!(infer_type_tag(&RawValue::Float(7.0)), TypeTag::Integer);
        assert_eq!(infer_type_tag(&RawValue::Int(-3)), TypeTag::Integer);
    }

    #[test]
    fn fractional_numbers_are_double_precision() {
        assert_eq!(infer_type_tag(&RawValue::Float(1.5)), TypeTag::DoublePrecision);
        assert_eq!(
            infer_type_tag(&RawValue::Float(f64::NAN)),
            TypeTag::DoublePrecision
        );
    }

    #[test]
    fn scalars_have_their_own_tags() {
        assert_eq!(infer_type_tag(&RawValue::Bool(false)), TypeTag::Boolean);
        assert_eq!(
            infer_type_tag(&RawValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            TypeTag::TimestampWithTimeZone
        );
        assert_eq!(infer_type_tag(&RawValue::Text("hi".into())), TypeTag::Text);
        assert_eq!(infer_type_tag(&RawValue::Null), TypeTag::Text);
    }

    #[test]
    fn arrays_are_tagged_by_first_non_null_element() {
        let array = |items: Vec<RawValue>| infer_type_tag(&RawValue::Array(items));
        assert_eq!(array(vec![RawValue::Null, RawValue::Bool(true)]), TypeTag::BooleanArray);
        assert_eq!(array(vec![RawValue::Int(1), RawValue::Float(1.5)]), TypeTag::IntegerArray);
        assert_eq!(array(vec![RawValue::Float(1.5)]), TypeTag::FloatArray);
        assert_eq!(array(vec![RawValue::Text("a".into())]), TypeTag::TextArray);
        assert_eq!(array(vec![]), TypeTag::TextArray);
        assert_eq!(array(vec![RawValue::Null, RawValue::Null]), TypeTag::TextArray);
    }

    #[test]
    fn objects_and_json_strings_are_jsonb() {
        let object = RawValue::from_json(json!({"a": 1}));
        assert_eq!(infer_type_tag(&object), TypeTag::Jsonb);
        assert_eq!(infer_type_tag(&RawValue::Text(" {\"a\": 1} ".into())), TypeTag::Jsonb);
        assert_eq!(infer_type_tag(&RawValue::Text("[1, 2]".into())), TypeTag::Jsonb);
    }

    #[test]
    fn unparsable_delimited_strings_are_text() {
        assert_eq!(infer_type_tag(&RawValue::Text("{a,b}".into())), TypeTag::Text);
        assert_eq!(infer_type_tag(&RawValue::Text("[oops".into())), TypeTag::Text);
    }
}
