//! Build result envelopes from executor output.

pub mod inference;
pub mod values;

use query_engine_execution::{QueryOutput, Row};
use query_engine_metadata::metadata::TypeTag;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use inference::infer_type_tag;
use values::encode_value;

/// A result column: its name and the tag its values are encoded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "dataTypeID")]
    pub data_type: TypeTag,
}

/// The response body for one executed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub fields: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: u64,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("row {row} has {found} columns but the result has {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Encode executor output for the request/response transport.
///
/// Column tags are inferred from the first row and every value is encoded
/// under its column's tag. No rows means no fields.
pub fn encode(output: &QueryOutput) -> Result<ResultEnvelope, Error> {
    let fields: Vec<ColumnDescriptor> = match output.rows.first() {
        None => Vec::new(),
        Some(first) => first
            .iter()
            .map(|(name, value)| ColumnDescriptor {
                name: name.to_string(),
                data_type: infer_type_tag(value),
            })
            .collect(),
    };
    tracing::debug!(columns = fields.len(), rows = output.rows.len(), "encoding result");

    let rows = encode_rows(&output.rows, fields.len(), |index, value| {
        encode_value(value, fields[index].data_type)
    })?;

    Ok(ResultEnvelope {
        fields,
        rows,
        row_count: output.rows_affected,
        command: output.command.clone(),
    })
}

/// Encode executor output for the session transport: every column is reported
/// as text and values are relayed without re-encoding.
pub fn relay(output: &QueryOutput) -> Result<ResultEnvelope, Error> {
    let fields: Vec<ColumnDescriptor> = output
        .rows
        .first()
        .map(|first| {
            first
                .names()
                .map(|name| ColumnDescriptor {
                    name: name.to_string(),
                    data_type: TypeTag::Text,
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = encode_rows(&output.rows, fields.len(), |_, value| value.to_json())?;

    Ok(ResultEnvelope {
        fields,
        rows,
        row_count: output.rows_affected,
        command: output.command.clone(),
    })
}

fn encode_rows(
    rows: &[Row],
    width: usize,
    encode: impl Fn(usize, &query_engine_execution::RawValue) -> serde_json::Value,
) -> Result<Vec<Vec<serde_json::Value>>, Error> {
    rows.iter()
        .enumerate()
        .map(|(row_index, row)| {
            if row.len() != width {
                return Err(Error::RowWidthMismatch {
                    row: row_index,
                    expected: width,
                    found: row.len(),
                });
            }
            Ok(row
                .values()
                .enumerate()
                .map(|(index, value)| encode(index, value))
                .collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine_execution::RawValue;
    use serde_json::json;

    fn output(rows: Vec<Vec<(&str, RawValue)>>, rows_affected: u64) -> QueryOutput {
        QueryOutput {
            rows: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|(name, value)| (name.to_string(), value))
                        .collect()
                })
                .collect(),
            rows_affected,
            command: "SELECT".to_string(),
        }
    }

    #[test]
    fn select_true_is_tagged_boolean() {
        let envelope = encode(&output(vec![vec![("val", RawValue::Bool(true))]], 1)).unwrap();
        insta::assert_json_snapshot!(envelope, @r###"
        {
          "fields": [
            {
              "name": "val",
              "dataTypeID": 16
            }
          ],
          "rows": [
            [
              "t"
            ]
          ],
          "rowCount": 1,
          "command": "SELECT"
        }
        "###);
    }

    #[test]
    fn zero_rows_have_no_fields() {
        let envelope = encode(&output(vec![], 0)).unwrap();
        assert!(envelope.fields.is_empty());
        assert!(envelope.rows.is_empty());
        assert_eq!(envelope.row_count, 0);
    }

    #[test]
    fn later_rows_use_the_first_rows_tags() {
        let envelope = encode(&output(
            vec![
                vec![("n", RawValue::Int(1)), ("b", RawValue::Null)],
                vec![("n", RawValue::Float(2.5)), ("b", RawValue::Bool(true))],
            ],
            2,
        ))
        .unwrap();
        assert_eq!(
            envelope.fields,
            vec![
                ColumnDescriptor {
                    name: "n".to_string(),
                    data_type: TypeTag::Integer
                },
                ColumnDescriptor {
                    name: "b".to_string(),
                    data_type: TypeTag::Text
                },
            ]
        );
        // the boolean in a text column passes through unchanged
        assert_eq!(envelope.rows, vec![vec![json!(1), json!(null)], vec![json!(2.5), json!(true)]]);
    }

    #[test]
    fn row_width_matches_field_count() {
        let envelope = encode(&output(
            vec![vec![
                ("a", RawValue::Int(1)),
                ("a", RawValue::Text("dup".into())),
                ("c", RawValue::Null),
            ]],
            1,
        ))
        .unwrap();
        assert_eq!(envelope.fields.len(), 3);
        assert!(envelope.rows.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn rows_of_different_shapes_are_rejected() {
        let error = encode(&output(
            vec![
                vec![("a", RawValue::Int(1))],
                vec![("a", RawValue::Int(1)), ("b", RawValue::Int(2))],
            ],
            2,
        ))
        .unwrap_err();
        assert_eq!(
            error,
            Error::RowWidthMismatch {
                row: 1,
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn relay_reports_text_and_keeps_values() {
        let envelope = relay(&output(vec![vec![("?column?", RawValue::Int(1))]], 1)).unwrap();
        insta::assert_json_snapshot!(envelope, @r###"
        {
          "fields": [
            {
              "name": "?column?",
              "dataTypeID": 25
            }
          ],
          "rows": [
            [
              1
            ]
          ],
          "rowCount": 1,
          "command": "SELECT"
        }
        "###);
    }

    #[test]
    fn relay_does_not_reencode_booleans() {
        let envelope = relay(&output(vec![vec![("b", RawValue::Bool(true))]], 1)).unwrap();
        assert_eq!(envelope.rows, vec![vec![json!(true)]]);
    }
}
