//! Decode PostgreSQL rows into [`RawValue`]s.
//!
//! This is the only place that looks at column types: it picks the Rust type
//! to decode each value with, and from then on only the value's shape is known.
//! Rows from the simple query protocol arrive as text and rows from prepared
//! statements in the binary format; both decode to the same values.

use chrono::{FixedOffset, NaiveTime};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgRange, PgTimeTz};
use sqlx::postgres::{PgColumn, PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Decode, Postgres, Row as _, Type, TypeInfo, ValueRef};

use crate::array_literal;
use crate::error::Error;
use crate::numeric::NumericText;
use crate::render;
use crate::temporal::{DateValue, TimestampTzValue, TimestampValue};
use crate::value::{RawValue, Row};

/// Decode every column of a row, in column order.
pub fn decode_row(row: &PgRow) -> Result<Row, Error> {
    row.columns()
        .iter()
        .map(|column| Ok((column.name().to_string(), decode_column(row, column)?)))
        .collect::<Result<Vec<_>, Error>>()
        .map(Row::new)
}

/// The type whose representation a value uses: domains use their base type.
pub(crate) fn representation(type_info: &PgTypeInfo) -> &PgTypeInfo {
    match type_info.kind() {
        PgTypeKind::Domain(base) => representation(base),
        _ => type_info,
    }
}

/// Types whose binary form is their text.
pub(crate) fn is_textual(type_info: &PgTypeInfo) -> bool {
    let type_info = representation(type_info);
    matches!(
        type_info.name(),
        "TEXT" | "VARCHAR" | "CHAR" | "\"CHAR\"" | "NAME" | "UNKNOWN" | "XML" | "citext"
    ) || matches!(type_info.kind(), PgTypeKind::Enum(_))
}

fn decode_column(row: &PgRow, column: &PgColumn) -> Result<RawValue, Error> {
    let index = column.ordinal();
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(RawValue::Null);
    }
    let type_info = representation(column.type_info());
    if is_textual(type_info) {
        return text(raw);
    }

    let value = match type_info.name() {
        "BOOL" => RawValue::Bool(get(row, index)?),
        "INT2" => RawValue::Int(i64::from(get::<i16>(row, index)?)),
        "INT4" => RawValue::Int(i64::from(get::<i32>(row, index)?)),
        "INT8" => RawValue::Int(get(row, index)?),
        "OID" => RawValue::Int(i64::from(get::<Oid>(row, index)?.0)),
        "FLOAT4" => RawValue::Float(f64::from(get::<f32>(row, index)?)),
        "FLOAT8" => RawValue::Float(get(row, index)?),
        "NUMERIC" => RawValue::Text(get::<NumericText>(row, index)?.0),
        "UUID" => RawValue::Text(get::<uuid::Uuid>(row, index)?.to_string()),
        "JSON" | "JSONB" => RawValue::from_json(get(row, index)?),
        "TIMESTAMPTZ" => get::<TimestampTzValue>(row, index)?.0.into_raw(),
        "TIMESTAMP" => get::<TimestampValue>(row, index)?.0.into_raw(),
        "DATE" => get::<DateValue>(row, index)?.0.into_raw(),
        "TIME" => RawValue::Text(render::time(&get(row, index)?)),
        "BYTEA" => RawValue::Text(bytea_hex(&get::<Vec<u8>>(row, index)?)),
        "TIMETZ" => rendered(row, index, |v: PgTimeTz<NaiveTime, FixedOffset>| {
            render::time_with_time_zone(&v)
        })?,
        "INTERVAL" => rendered(row, index, |v: PgInterval| render::interval(&v))?,
        "MONEY" => rendered(row, index, |v: PgMoney| render::money(v.0))?,
        "INET" => rendered(row, index, |v: IpNetwork| render::network(&v, false))?,
        "CIDR" => rendered(row, index, |v: IpNetwork| render::network(&v, true))?,
        "INT4RANGE" => range(row, index, |v: &i32| v.to_string())?,
        "INT8RANGE" => range(row, index, |v: &i64| v.to_string())?,
        "NUMRANGE" => range(row, index, |v: &NumericText| v.0.clone())?,
        "DATERANGE" => range(row, index, |v: &DateValue| v.to_text())?,
        "TSRANGE" => range(row, index, |v: &TimestampValue| v.to_text())?,
        "TSTZRANGE" => range(row, index, |v: &TimestampTzValue| v.to_text())?,
        "BOOL[]" => array(get::<Vec<Option<bool>>>(row, index)?, RawValue::Bool),
        "INT2[]" => array(get::<Vec<Option<i16>>>(row, index)?, |v| RawValue::Int(i64::from(v))),
        "INT4[]" => array(get::<Vec<Option<i32>>>(row, index)?, |v| RawValue::Int(i64::from(v))),
        "INT8[]" => array(get::<Vec<Option<i64>>>(row, index)?, RawValue::Int),
        "OID[]" => array(get::<Vec<Option<Oid>>>(row, index)?, |v| RawValue::Int(i64::from(v.0))),
        "FLOAT4[]" => array(get::<Vec<Option<f32>>>(row, index)?, |v| {
            RawValue::Float(f64::from(v))
        }),
        "FLOAT8[]" => array(get::<Vec<Option<f64>>>(row, index)?, RawValue::Float),
        "NUMERIC[]" => array(get::<Vec<Option<NumericText>>>(row, index)?, |v| {
            RawValue::Text(v.0)
        }),
        "UUID[]" => array(get::<Vec<Option<uuid::Uuid>>>(row, index)?, |v| {
            RawValue::Text(v.to_string())
        }),
        "JSONB[]" | "JSON[]" => array(
            get::<Vec<Option<serde_json::Value>>>(row, index)?,
            RawValue::from_json,
        ),
        "TIMESTAMPTZ[]" => array(get::<Vec<Option<TimestampTzValue>>>(row, index)?, |v| {
            v.0.into_raw()
        }),
        "TIMESTAMP[]" => array(get::<Vec<Option<TimestampValue>>>(row, index)?, |v| {
            v.0.into_raw()
        }),
        "DATE[]" => array(get::<Vec<Option<DateValue>>>(row, index)?, |v| v.0.into_raw()),
        "TIME[]" => array(get::<Vec<Option<NaiveTime>>>(row, index)?, |v| {
            RawValue::Text(render::time(&v))
        }),
        "BYTEA[]" => array(get::<Vec<Option<Vec<u8>>>>(row, index)?, |v| {
            RawValue::Text(bytea_hex(&v))
        }),
        "TIMETZ[]" => rendered_array(row, index, |v: PgTimeTz<NaiveTime, FixedOffset>| {
            render::time_with_time_zone(&v)
        })?,
        "INTERVAL[]" => rendered_array(row, index, |v: PgInterval| render::interval(&v))?,
        "MONEY[]" => rendered_array(row, index, |v: PgMoney| render::money(v.0))?,
        "INET[]" => rendered_array(row, index, |v: IpNetwork| render::network(&v, false))?,
        "CIDR[]" => rendered_array(row, index, |v: IpNetwork| render::network(&v, true))?,
        _ => match type_info.kind() {
            PgTypeKind::Array(element) if is_textual(element) => {
                array(get::<Vec<Option<String>>>(row, index)?, RawValue::Text)
            }
            _ => untyped(raw, column)?,
        },
    };
    Ok(value)
}

/// Decode a non-null value. The column type was already matched by name, so
/// sqlx's own compatibility check is skipped; it rejects domains.
fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<T, Error>
where
    T: Decode<'r, Postgres>,
{
    Ok(row.try_get_unchecked::<T, _>(index)?)
}

fn text(raw: PgValueRef<'_>) -> Result<RawValue, Error> {
    raw.as_str()
        .map(|text| RawValue::Text(text.to_string()))
        .map_err(Error::decode)
}

/// Types we render ourselves. A text-format value is already PostgreSQL's own
/// rendering and is kept as is.
fn rendered<'r, T>(
    row: &'r PgRow,
    index: usize,
    render: impl FnOnce(T) -> String,
) -> Result<RawValue, Error>
where
    T: Decode<'r, Postgres>,
{
    let raw = row.try_get_raw(index)?;
    if matches!(raw.format(), PgValueFormat::Text) {
        return text(raw);
    }
    Ok(RawValue::Text(render(get(row, index)?)))
}

/// Arrays of rendered types. Text-format arrays are split by the array
/// literal grammar.
fn rendered_array<T>(
    row: &PgRow,
    index: usize,
    render: impl Fn(T) -> String,
) -> Result<RawValue, Error>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres>,
{
    let raw = row.try_get_raw(index)?;
    if matches!(raw.format(), PgValueFormat::Text) {
        let literal = raw.as_str().map_err(Error::decode)?;
        let elements = array_literal::parse(literal).map_err(Error::decode)?;
        return Ok(RawValue::Array(
            elements
                .into_iter()
                .map(|element| element.map_or(RawValue::Null, RawValue::Text))
                .collect(),
        ));
    }
    Ok(array(get::<Vec<Option<T>>>(row, index)?, |v| {
        RawValue::Text(render(v))
    }))
}

/// Range types, rendered as range literals.
fn range<T>(
    row: &PgRow,
    index: usize,
    render: impl Fn(&T) -> String,
) -> Result<RawValue, Error>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres>,
{
    const EMPTY: u8 = 0x01;

    let raw = row.try_get_raw(index)?;
    if matches!(raw.format(), PgValueFormat::Text) {
        return text(raw);
    }
    // sqlx decodes an empty range as an unbounded one
    let flags = raw.as_bytes().map_err(Error::decode)?.first().copied();
    if flags.is_some_and(|flags| flags & EMPTY != 0) {
        return Ok(RawValue::Text("empty".to_string()));
    }
    let value = get::<PgRange<T>>(row, index)?;
    Ok(RawValue::Text(render::range(&value, render)))
}

fn array<T>(values: Vec<Option<T>>, f: impl Fn(T) -> RawValue) -> RawValue {
    RawValue::Array(
        values
            .into_iter()
            .map(|value| value.map_or(RawValue::Null, &f))
            .collect(),
    )
}

/// Values of types we do not decode explicitly are kept as text when the
/// backend sent them as text.
fn untyped(raw: PgValueRef<'_>, column: &PgColumn) -> Result<RawValue, Error> {
    match raw.format() {
        PgValueFormat::Text => text(raw),
        PgValueFormat::Binary => Err(Error::UnsupportedType {
            column: column.name().to_string(),
            type_name: column.type_info().name().to_string(),
        }),
    }
}

/// The `bytea` hex output format, `\x` followed by two digits per byte.
fn bytea_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
