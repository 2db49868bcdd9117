//! Bind JSON parameters to a statement.
//!
//! The statement is described first so that PostgreSQL infers a type for every
//! placeholder; each JSON value is then converted to exactly that type and sent
//! in the binary format under the inferred type, so the server never has to
//! coerce. Only text types and enums, whose binary form is their text, accept
//! any value as text.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo, PgTypeKind};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Arguments, Postgres, Type, TypeInfo};

use crate::array_literal;
use crate::decode::{is_textual, representation};
use crate::error::Error;
use crate::numeric;

/// A parameter converted to the Rust value PostgreSQL expects for it.
#[derive(Debug, Clone)]
enum ParameterValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Oid(Oid),
    Float4(f32),
    Float8(f64),
    /// Already in the binary format: `numeric` values and the infinities.
    Binary(Vec<u8>),
    Text(String),
    Uuid(uuid::Uuid),
    /// `jsonb` carries a version byte before the document.
    Json { document: Value, jsonb: bool },
    TimestampTz(DateTime<Utc>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(PgTimeTz<NaiveTime, FixedOffset>),
    Interval(PgInterval),
    Money(PgMoney),
    Inet(IpNetwork),
    Bytea(Vec<u8>),
    /// A one-dimensional array of elements of the given type.
    Array { element: Oid, items: Vec<ParameterValue> },
}

/// A converted value together with the type the server inferred for its
/// placeholder.
#[derive(Debug, Clone)]
struct Parameter {
    value: ParameterValue,
    type_info: PgTypeInfo,
}

impl Type<Postgres> for Parameter {
    // never consulted, `produces` always reports the placeholder's type
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, Postgres> for Parameter {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        encode_value(&self.value, buf)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info.clone())
    }
}

fn encode_value(value: &ParameterValue, buf: &mut PgArgumentBuffer) -> IsNull {
    match value {
        ParameterValue::Null => IsNull::Yes,
        ParameterValue::Bool(v) => <bool as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Int2(v) => <i16 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Int4(v) => <i32 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Int8(v) => <i64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Oid(v) => <Oid as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Float4(v) => <f32 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Float8(v) => <f64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Binary(bytes) => {
            buf.extend_from_slice(bytes);
            IsNull::No
        }
        ParameterValue::Text(v) => <String as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Uuid(v) => <uuid::Uuid as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Json { document, jsonb } => {
            if *jsonb {
                buf.push(1);
            }
            buf.extend_from_slice(document.to_string().as_bytes());
            IsNull::No
        }
        ParameterValue::TimestampTz(v) => {
            <DateTime<Utc> as Encode<'_, Postgres>>::encode_by_ref(v, buf)
        }
        ParameterValue::Timestamp(v) => <NaiveDateTime as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Date(v) => <NaiveDate as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Time(v) => <NaiveTime as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::TimeTz(v) => {
            <PgTimeTz<NaiveTime, FixedOffset> as Encode<'_, Postgres>>::encode_by_ref(v, buf)
        }
        ParameterValue::Interval(v) => <PgInterval as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Money(v) => <PgMoney as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Inet(v) => <IpNetwork as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Bytea(v) => <Vec<u8> as Encode<'_, Postgres>>::encode_by_ref(v, buf),
        ParameterValue::Array { element, items } => {
            encode_array(*element, items, buf);
            IsNull::No
        }
    }
}

/// The binary array format: dimensions, a has-nulls flag and the element type,
/// then the length and lower bound of the one dimension, then each element
/// prefixed by its length (-1 for NULL). The element type must be the one the
/// server expects, which is why sqlx's own array encoding is not used.
fn encode_array(element: Oid, items: &[ParameterValue], buf: &mut PgArgumentBuffer) {
    let has_nulls = items.iter().any(|item| matches!(item, ParameterValue::Null));
    buf.extend_from_slice(&i32::from(!items.is_empty()).to_be_bytes());
    buf.extend_from_slice(&i32::from(has_nulls).to_be_bytes());
    buf.extend_from_slice(&element.0.to_be_bytes());
    if items.is_empty() {
        return;
    }
    let len = i32::try_from(items.len()).unwrap_or(i32::MAX);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&1_i32.to_be_bytes());

    for item in items {
        let start = buf.len();
        buf.extend_from_slice(&[0; 4]);
        let written = match encode_value(item, buf) {
            IsNull::Yes => {
                buf.truncate(start + 4);
                -1
            }
            IsNull::No => i32::try_from(buf.len() - start - 4).unwrap_or(i32::MAX),
        };
        buf[start..start + 4].copy_from_slice(&written.to_be_bytes());
    }
}

/// Convert the request parameters for a statement whose placeholders have the
/// given types. Parameters beyond the placeholders the server reported are sent
/// as text, leaving the count mismatch for the server to report.
pub fn bind_parameters(types: &[PgTypeInfo], params: &[Value]) -> Result<PgArguments, Error> {
    let text = <String as Type<Postgres>>::type_info();
    let mut arguments = PgArguments::default();
    for (position, value) in params.iter().enumerate() {
        let type_info = types.get(position).unwrap_or(&text);
        let value = convert_json_value(value, type_info).map_err(|message| {
            Error::InvalidParameter {
                index: position + 1,
                message,
            }
        })?;
        arguments.add(Parameter {
            value,
            type_info: type_info.clone(),
        });
    }
    Ok(arguments)
}

/// Convert a JSON value into the value for a placeholder of the given type.
fn convert_json_value(value: &Value, type_info: &PgTypeInfo) -> Result<ParameterValue, String> {
    if value.is_null() {
        return Ok(ParameterValue::Null);
    }
    let type_info = representation(type_info);
    if is_textual(type_info) {
        return text_value(value).map(ParameterValue::Text);
    }
    let type_name = type_info.name();
    match type_name {
        "BOOL" => parse_bool(value).map(ParameterValue::Bool),
        "INT2" => parse_integer(value)
            .and_then(|i| i16::try_from(i).map_err(|_| out_of_range(value, type_name)))
            .map(ParameterValue::Int2),
        "INT4" => parse_integer(value)
            .and_then(|i| i32::try_from(i).map_err(|_| out_of_range(value, type_name)))
            .map(ParameterValue::Int4),
        "INT8" => parse_integer(value).map(ParameterValue::Int8),
        "OID" => parse_integer(value)
            .and_then(|i| u32::try_from(i).map_err(|_| out_of_range(value, type_name)))
            .map(|oid| ParameterValue::Oid(Oid(oid))),
        #[allow(clippy::cast_possible_truncation)]
        "FLOAT4" => parse_float(value).map(|f| ParameterValue::Float4(f as f32)),
        "FLOAT8" => parse_float(value).map(ParameterValue::Float8),
        "NUMERIC" => numeric::encode_text(&scalar_text(value)?)
            .map(ParameterValue::Binary)
            .map_err(|err| err.to_string()),
        "UUID" => parse_uuid(value).map(ParameterValue::Uuid),
        "JSON" => Ok(ParameterValue::Json {
            document: json_document(value),
            jsonb: false,
        }),
        "JSONB" => Ok(ParameterValue::Json {
            document: json_document(value),
            jsonb: true,
        }),
        "TIMESTAMPTZ" => infinite(value, true)
            .map_or_else(|| parse_timestamptz(value).map(ParameterValue::TimestampTz), Ok),
        "TIMESTAMP" => infinite(value, true)
            .map_or_else(|| parse_timestamp(value).map(ParameterValue::Timestamp), Ok),
        "DATE" => {
            infinite(value, false).map_or_else(|| parse_date(value).map(ParameterValue::Date), Ok)
        }
        "TIME" => parse_time(value).map(ParameterValue::Time),
        "TIMETZ" => parse_timetz(value).map(ParameterValue::TimeTz),
        "INTERVAL" => parse_interval(value).map(ParameterValue::Interval),
        "MONEY" => parse_money(value).map(ParameterValue::Money),
        "INET" | "CIDR" => parse_network(value).map(ParameterValue::Inet),
        "BYTEA" => parse_bytea(value).map(ParameterValue::Bytea),
        _ => match type_info.kind() {
            PgTypeKind::Array(element) => convert_array(value, element),
            _ => Err(format!("parameters of type {type_name} are not supported")),
        },
    }
}

fn convert_array(value: &Value, element: &PgTypeInfo) -> Result<ParameterValue, String> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::String(literal) => array_literal::parse(literal)
            .map_err(|err| err.to_string())?
            .into_iter()
            .map(|item| item.map_or(Value::Null, Value::String))
            .collect(),
        other => return Err(format!("expected an array, got {other}")),
    };
    let oid = element
        .oid()
        .ok_or_else(|| format!("arrays of {} are not supported as parameters", element.name()))?;
    let items = items
        .iter()
        .map(|item| match item {
            Value::Array(_) => Err("multi-dimensional arrays are not supported".to_string()),
            item => convert_json_value(item, element),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParameterValue::Array {
        element: oid,
        items,
    })
}

/// `infinity` and `-infinity`, as the largest and smallest binary timestamp
/// (`wide`, 64 bits) or date (32 bits).
fn infinite(value: &Value, wide: bool) -> Option<ParameterValue> {
    let positive = match value.as_str()?.trim().to_ascii_lowercase().as_str() {
        "infinity" | "+infinity" => true,
        "-infinity" => false,
        _ => return None,
    };
    let bytes = match (wide, positive) {
        (true, true) => i64::MAX.to_be_bytes().to_vec(),
        (true, false) => i64::MIN.to_be_bytes().to_vec(),
        (false, true) => i32::MAX.to_be_bytes().to_vec(),
        (false, false) => i32::MIN.to_be_bytes().to_vec(),
    };
    Some(ParameterValue::Binary(bytes))
}

fn out_of_range(value: &Value, type_name: &str) -> String {
    format!("value {value} is out of range for type {type_name}")
}

/// The text of a scalar JSON value; strings are taken verbatim.
fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar value, got {other}")),
    }
}

/// Any value as text. Arrays and objects become their JSON text.
fn text_value(value: &Value) -> Result<String, String> {
    match value {
        Value::Array(_) | Value::Object(_) => Ok(value.to_string()),
        Value::Null => Err("unexpected null".to_string()),
        scalar => scalar_text(scalar),
    }
}

fn parse_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("invalid input syntax for type boolean: {value}")),
        },
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        other => Err(format!("invalid input syntax for type boolean: {other}")),
    }
}

fn parse_integer(value: &Value) -> Result<i64, String> {
    let invalid = || format!("invalid input syntax for type integer: {value}");
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => match n.as_f64() {
                #[allow(clippy::cast_possible_truncation)]
                Some(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(f as i64),
                _ => Err(invalid()),
            },
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_float(value: &Value) -> Result<f64, String> {
    let invalid = || format!("invalid input syntax for type double precision: {value}");
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid),
        Value::String(s) => match s.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            s => s.parse::<f64>().map_err(|_| invalid()),
        },
        _ => Err(invalid()),
    }
}

fn parse_uuid(value: &Value) -> Result<uuid::Uuid, String> {
    match value {
        Value::String(s) => uuid::Uuid::parse_str(s.trim()).map_err(|err| err.to_string()),
        other => Err(format!("invalid input syntax for type uuid: {other}")),
    }
}

/// Strings holding a JSON document are sent as that document; any other string
/// is sent as a JSON string.
fn json_document(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIMESTAMPTZ_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
];

fn parse_timestamptz(value: &Value) -> Result<DateTime<Utc>, String> {
    let invalid = || format!("invalid input syntax for type timestamp with time zone: {value}");
    match value {
        // milliseconds since the epoch
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Ok(ts.with_timezone(&Utc));
            }
            for format in TIMESTAMPTZ_FORMATS {
                if let Ok(ts) = DateTime::parse_from_str(s, format) {
                    return Ok(ts.with_timezone(&Utc));
                }
            }
            // without an offset the value is taken to be UTC
            parse_naive_timestamp(s)
                .map(|ts| DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn parse_timestamp(value: &Value) -> Result<NaiveDateTime, String> {
    let invalid = || format!("invalid input syntax for type timestamp: {value}");
    match value {
        Value::String(s) => {
            let s = s.trim();
            parse_naive_timestamp(s)
                .or_else(|| {
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|ts| ts.naive_utc())
                })
                .ok_or_else(invalid)
        }
        Value::Number(_) => parse_timestamptz(value).map(|ts| ts.naive_utc()),
        _ => Err(invalid()),
    }
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    let invalid = || format!("invalid input syntax for type date: {value}");
    match value {
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamptz(value).ok().map(|ts| ts.date_naive()))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn parse_time(value: &Value) -> Result<NaiveTime, String> {
    let invalid = || format!("invalid input syntax for type time: {value}");
    match value {
        Value::String(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

/// A time followed by an optional UTC offset (`+02`, `-05:30`, `Z`). Without
/// an offset the time is taken to be UTC.
fn parse_timetz(value: &Value) -> Result<PgTimeTz<NaiveTime, FixedOffset>, String> {
    let invalid = || format!("invalid input syntax for type time with time zone: {value}");
    let Value::String(s) = value else {
        return Err(invalid());
    };
    let s = s.trim();
    let (time, offset) = match s.rfind(['+', '-']) {
        Some(at) if at > 0 => (&s[..at], parse_offset(&s[at..]).ok_or_else(invalid)?),
        _ => (
            s.strip_suffix(['Z', 'z']).unwrap_or(s),
            FixedOffset::east_opt(0).ok_or_else(invalid)?,
        ),
    };
    let time = parse_time(&Value::String(time.trim().to_string())).map_err(|_| invalid())?;
    Ok(PgTimeTz { time, offset })
}

/// `+HH`, `+HH:MM`, `+HHMM` or `+HH:MM:SS`.
fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, digits) = match offset.as_bytes().first()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };
    let mut parts = if digits.contains(':') {
        digits.split(':').map(str::to_string).collect::<Vec<_>>()
    } else if digits.len() == 4 {
        vec![digits[..2].to_string(), digits[2..].to_string()]
    } else {
        vec![digits.to_string()]
    };
    parts.resize(3, "0".to_string());
    let mut seconds = 0;
    for (part, scale) in parts.iter().zip([3600, 60, 1]) {
        seconds += part.parse::<i32>().ok()? * scale;
    }
    FixedOffset::east_opt(sign * seconds)
}

const MICROS_PER_DAY: f64 = 86_400_000_000.0;
const DAYS_PER_MONTH: f64 = 30.0;

/// Intervals in PostgreSQL's verbose input syntax: `1 year 2 mons 3 days`,
/// `04:05:06`, `2 weeks ago`. A bare number is a count of seconds. Fractions
/// of months and days spill into the smaller units the way the server does.
fn parse_interval(value: &Value) -> Result<PgInterval, String> {
    let invalid = || format!("invalid input syntax for type interval: {value}");
    let text = match value {
        Value::Number(n) => format!("{n} seconds"),
        Value::String(s) => s.trim().to_ascii_lowercase(),
        _ => return Err(invalid()),
    };

    let (mut months, mut days, mut micros) = (0.0, 0.0, 0.0);
    let mut tokens = text
        .trim_start_matches('@')
        .split_whitespace()
        .peekable();
    let mut negate = false;
    let mut seen = false;
    while let Some(token) = tokens.next() {
        if token == "ago" {
            negate = true;
            continue;
        }
        if token.contains(':') {
            micros += parse_clock(token).ok_or_else(invalid)?;
            seen = true;
            continue;
        }
        let (number, unit) = split_number(token);
        let amount: f64 = number.parse().map_err(|_| invalid())?;
        let unit = match unit {
            "" => match tokens.peek() {
                Some(&next) if next != "ago" && !next.contains(':') => {
                    tokens.next();
                    next
                }
                _ => "seconds",
            },
            unit => unit,
        };
        match unit {
            "microsecond" | "microseconds" | "us" | "usec" | "usecs" => micros += amount,
            "millisecond" | "milliseconds" | "ms" | "msec" | "msecs" => micros += amount * 1e3,
            "second" | "seconds" | "s" | "sec" | "secs" => micros += amount * 1e6,
            "minute" | "minutes" | "m" | "min" | "mins" => micros += amount * 60e6,
            "hour" | "hours" | "h" | "hr" | "hrs" => micros += amount * 3_600e6,
            "day" | "days" | "d" => days += amount,
            "week" | "weeks" | "w" => days += amount * 7.0,
            "month" | "months" | "mon" | "mons" => months += amount,
            "year" | "years" | "y" | "yr" | "yrs" => months += amount * 12.0,
            "decade" | "decades" => months += amount * 120.0,
            "century" | "centuries" => months += amount * 1_200.0,
            "millennium" | "millennia" | "millenniums" => months += amount * 12_000.0,
            _ => return Err(invalid()),
        }
        seen = true;
    }
    if !seen {
        return Err(invalid());
    }

    let whole_months = months.trunc();
    days += (months - whole_months) * DAYS_PER_MONTH;
    let whole_days = days.trunc();
    micros += (days - whole_days) * MICROS_PER_DAY;
    let sign = if negate { -1.0 } else { 1.0 };

    let out_of_range = || format!("interval out of range: {value}");
    let micros = (sign * micros).round();
    if micros.abs() >= 9.2e18 {
        return Err(out_of_range());
    }
    #[allow(clippy::cast_possible_truncation)]
    let microseconds = micros as i64;
    Ok(PgInterval {
        months: to_i32(sign * whole_months).ok_or_else(out_of_range)?,
        days: to_i32(sign * whole_days).ok_or_else(out_of_range)?,
        microseconds,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn to_i32(value: f64) -> Option<i32> {
    (value.abs() <= f64::from(i32::MAX)).then_some(value as i32)
}

/// `[-]H:MM[:SS[.f]]` as microseconds.
fn parse_clock(token: &str) -> Option<f64> {
    let (sign, token) = match token.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, token.strip_prefix('+').unwrap_or(token)),
    };
    let mut parts = token.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = match parts.next() {
        Some(seconds) => seconds.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }
    Some(sign * (hours * 3_600e6 + minutes * 60e6 + seconds * 1e6))
}

/// `3days` into `("3", "days")`; a token without a unit has an empty one.
fn split_number(token: &str) -> (&str, &str) {
    let at = token
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(token.len());
    (&token[..at], &token[at..])
}

/// Amounts such as `12.5`, `$1,234.56` or `-$1.50`, rounded to whole cents.
fn parse_money(value: &Value) -> Result<PgMoney, String> {
    let invalid = || format!("invalid input syntax for type money: {value}");
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(invalid()),
    };
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => match text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            Some(rest) => (true, rest.to_string()),
            None => (false, text.clone()),
        },
    };
    let digits: String = text
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    if (whole.is_empty() && fraction.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let mut cents: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().map_err(|_| invalid())?
    };
    let mut fraction = fraction
        .chars()
        .map(|c| c.to_digit(10).map_or(0, i64::from));
    let tenths = fraction.next().unwrap_or(0);
    let hundredths = fraction.next().unwrap_or(0);
    let round_up = fraction.next().is_some_and(|digit| digit >= 5);
    cents = cents
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(|| format!("value {value} is out of range for type money"))?;
    Ok(PgMoney(if negative { -cents } else { cents }))
}

fn parse_network(value: &Value) -> Result<IpNetwork, String> {
    match value {
        Value::String(s) => IpNetwork::from_str(s.trim())
            .map_err(|_| format!("invalid input syntax for type inet: {value}")),
        other => Err(format!("invalid input syntax for type inet: {other}")),
    }
}

/// `\x` hex strings are decoded; any other string is sent as its bytes.
fn parse_bytea(value: &Value) -> Result<Vec<u8>, String> {
    match value {
        Value::String(s) => match s.strip_prefix("\\x") {
            Some(hex) => decode_hex(hex).ok_or_else(|| format!("invalid hexadecimal data: {s}")),
            None => Ok(s.as_bytes().to_vec()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| format!("invalid byte {item}"))
            })
            .collect(),
        other => Err(format!("invalid input syntax for type bytea: {other}")),
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use sqlx::postgres::types::PgRange;
    use sqlx::postgres::PgHasArrayType;

    fn type_of<T: Type<Postgres>>() -> PgTypeInfo {
        T::type_info()
    }

    fn array_of<T: PgHasArrayType>() -> PgTypeInfo {
        T::array_type_info()
    }

    #[test]
    fn integers_accept_numbers_and_strings() {
        assert!(matches!(
            convert_json_value(&json!(42), &type_of::<i32>()),
            Ok(ParameterValue::Int4(42))
        ));
        assert!(matches!(
            convert_json_value(&json!("42"), &type_of::<i64>()),
            Ok(ParameterValue::Int8(42))
        ));
        assert!(matches!(
            convert_json_value(&json!(3.0), &type_of::<i16>()),
            Ok(ParameterValue::Int2(3))
        ));
    }

    #[test]
    fn integers_reject_fractions_and_overflow() {
        assert!(convert_json_value(&json!(1.5), &type_of::<i32>()).is_err());
        assert!(convert_json_value(&json!(70000), &type_of::<i16>()).is_err());
        assert!(convert_json_value(&json!("abc"), &type_of::<i64>()).is_err());
    }

    #[test]
    fn booleans_accept_postgres_spellings() {
        assert!(matches!(
            convert_json_value(&json!("t"), &type_of::<bool>()),
            Ok(ParameterValue::Bool(true))
        ));
        assert!(matches!(
            convert_json_value(&json!("off"), &type_of::<bool>()),
            Ok(ParameterValue::Bool(false))
        ));
        assert!(convert_json_value(&json!("maybe"), &type_of::<bool>()).is_err());
    }

    #[test]
    fn null_is_null_for_every_type() {
        for type_info in [type_of::<bool>(), type_of::<i32>(), array_of::<String>()] {
            assert!(matches!(
                convert_json_value(&Value::Null, &type_info),
                Ok(ParameterValue::Null)
            ));
        }
    }

    #[test]
    fn timestamps_accept_common_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        for text in [
            "2024-01-02T03:04:05Z",
            "2024-01-02 03:04:05+00",
            "2024-01-02 04:04:05+01:00",
            "2024-01-02 03:04:05",
        ] {
            match convert_json_value(&json!(text), &type_of::<DateTime<Utc>>()) {
                Ok(ParameterValue::TimestampTz(ts)) => assert_eq!(ts, expected, "{text}"),
                other => panic!("{text}: {other:?}"),
            }
        }
    }

    #[test]
    fn json_strings_holding_documents_are_parsed() {
        match convert_json_value(&json!("{\"a\":1}"), &type_of::<Value>()) {
            Ok(ParameterValue::Json { document, jsonb }) => {
                assert_eq!(document, json!({"a": 1}));
                assert!(jsonb);
            }
            other => panic!("{other:?}"),
        }
        match convert_json_value(&json!("plain"), &type_of::<Value>()) {
            Ok(ParameterValue::Json { document, .. }) => assert_eq!(document, json!("plain")),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn arrays_accept_json_arrays_and_literals() {
        match convert_json_value(&json!(["a", null, "b,c"]), &array_of::<String>()) {
            Ok(ParameterValue::Array { element, items }) => {
                assert_eq!(element, Oid(25));
                assert!(matches!(
                    items.as_slice(),
                    [ParameterValue::Text(a), ParameterValue::Null, ParameterValue::Text(bc)]
                        if a == "a" && bc == "b,c"
                ));
            }
            other => panic!("{other:?}"),
        }
        match convert_json_value(&json!("{1,NULL,3}"), &array_of::<i32>()) {
            Ok(ParameterValue::Array { element, items }) => {
                assert_eq!(element, Oid(23));
                assert!(matches!(
                    items.as_slice(),
                    [ParameterValue::Int4(1), ParameterValue::Null, ParameterValue::Int4(3)]
                ));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn date_array_elements_are_converted_one_by_one() {
        let date_array = array_of::<NaiveDate>();
        match convert_json_value(&json!(["2024-01-02", "infinity"]), &date_array) {
            Ok(ParameterValue::Array { element, items }) => {
                assert_eq!(element, Oid(1082));
                assert!(matches!(items[0], ParameterValue::Date(_)));
                assert!(matches!(&items[1], ParameterValue::Binary(bytes)
                    if *bytes == i32::MAX.to_be_bytes().to_vec()));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn arrays_are_encoded_with_their_element_type() {
        let mut buf = PgArgumentBuffer::default();
        encode_value(
            &ParameterValue::Array {
                element: Oid(1043),
                items: vec![ParameterValue::Text("ab".to_string()), ParameterValue::Null],
            },
            &mut buf,
        );
        let expected: Vec<u8> = [
            &1_i32.to_be_bytes()[..],
            &1_i32.to_be_bytes(),
            &1043_u32.to_be_bytes(),
            &2_i32.to_be_bytes(),
            &1_i32.to_be_bytes(),
            &2_i32.to_be_bytes(),
            b"ab",
            &(-1_i32).to_be_bytes(),
        ]
        .concat();
        assert_eq!(buf.as_slice(), expected.as_slice());

        let mut buf = PgArgumentBuffer::default();
        encode_value(
            &ParameterValue::Array {
                element: Oid(23),
                items: vec![],
            },
            &mut buf,
        );
        assert_eq!(buf.as_slice(), [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 23]);
    }

    fn interval(value: Value) -> (i32, i32, i64) {
        match convert_json_value(&value, &type_of::<PgInterval>()) {
            Ok(ParameterValue::Interval(v)) => (v.months, v.days, v.microseconds),
            other => panic!("{value}: {other:?}"),
        }
    }

    #[test]
    fn intervals_accept_the_verbose_syntax() {
        assert_eq!(interval(json!("1 day")), (0, 1, 0));
        assert_eq!(
            interval(json!("1 year 2 mons 3 days 04:05:06.5")),
            (14, 3, 14_706_500_000)
        );
        assert_eq!(interval(json!("2 weeks ago")), (0, -14, 0));
        assert_eq!(interval(json!("1.5 months")), (1, 15, 0));
        assert_eq!(interval(json!("1 day -01:00:00")), (0, 1, -3_600_000_000));
        assert_eq!(interval(json!("3days 10mins")), (0, 3, 600_000_000));
        assert_eq!(interval(json!(90)), (0, 0, 90_000_000));
        assert!(convert_json_value(&json!("soon"), &type_of::<PgInterval>()).is_err());
        assert!(convert_json_value(&json!(""), &type_of::<PgInterval>()).is_err());
    }

    fn money(value: Value) -> Result<i64, String> {
        convert_json_value(&value, &type_of::<PgMoney>()).map(|v| match v {
            ParameterValue::Money(PgMoney(cents)) => cents,
            other => panic!("{other:?}"),
        })
    }

    #[test]
    fn money_accepts_currency_text_and_numbers() {
        assert_eq!(money(json!("$12,345.67")), Ok(1_234_567));
        assert_eq!(money(json!("-$1.50")), Ok(-150));
        assert_eq!(money(json!(12.5)), Ok(1250));
        assert_eq!(money(json!(3)), Ok(300));
        assert_eq!(money(json!("1.005")), Ok(101));
        assert!(money(json!("twelve")).is_err());
        assert!(money(json!("$")).is_err());
    }

    #[test]
    fn time_zones_are_parsed_with_the_time() {
        let timetz = type_of::<PgTimeTz<NaiveTime, FixedOffset>>();
        for (text, offset) in [
            ("04:05:06+02", 7200),
            ("04:05:06.5-05:30", -(5 * 3600 + 30 * 60)),
            ("04:05:06", 0),
            ("04:05:06Z", 0),
        ] {
            match convert_json_value(&json!(text), &timetz) {
                Ok(ParameterValue::TimeTz(v)) => {
                    assert_eq!(v.offset.local_minus_utc(), offset, "{text}");
                    assert_eq!(v.time.format("%H:%M:%S").to_string(), "04:05:06");
                }
                other => panic!("{text}: {other:?}"),
            }
        }
        assert!(convert_json_value(&json!("04:05:06+xx"), &timetz).is_err());
    }

    #[test]
    fn networks_and_oids_are_parsed() {
        match convert_json_value(&json!("10.0.0.0/8"), &type_of::<IpNetwork>()) {
            Ok(ParameterValue::Inet(network)) => assert_eq!(network.prefix(), 8),
            other => panic!("{other:?}"),
        }
        assert!(convert_json_value(&json!("10.0.0.256"), &type_of::<IpNetwork>()).is_err());
        assert!(matches!(
            convert_json_value(&json!(42), &type_of::<Oid>()),
            Ok(ParameterValue::Oid(Oid(42)))
        ));
        assert!(convert_json_value(&json!(-1), &type_of::<Oid>()).is_err());
    }

    #[test]
    fn infinities_are_sent_as_binary_extremes() {
        assert!(matches!(
            convert_json_value(&json!("infinity"), &type_of::<DateTime<Utc>>()),
            Ok(ParameterValue::Binary(bytes)) if bytes == i64::MAX.to_be_bytes().to_vec()
        ));
        assert!(matches!(
            convert_json_value(&json!("-infinity"), &type_of::<NaiveDate>()),
            Ok(ParameterValue::Binary(bytes)) if bytes == i32::MIN.to_be_bytes().to_vec()
        ));
    }

    #[test]
    fn only_text_types_take_arbitrary_text() {
        assert!(matches!(
            convert_json_value(&json!({"a": 1}), &type_of::<String>()),
            Ok(ParameterValue::Text(text)) if text == "{\"a\":1}"
        ));
        match convert_json_value(&json!("[1,5)"), &type_of::<PgRange<i32>>()) {
            Err(message) => assert_eq!(message, "parameters of type INT4RANGE are not supported"),
            Ok(other) => panic!("{other:?}"),
        }
    }

    #[test]
    fn bytea_accepts_hex() {
        match convert_json_value(&json!("\\xdead"), &type_of::<Vec<u8>>()) {
            Ok(ParameterValue::Bytea(bytes)) => assert_eq!(bytes, vec![0xde, 0xad]),
            other => panic!("{other:?}"),
        }
        assert!(convert_json_value(&json!("\\xabc"), &type_of::<Vec<u8>>()).is_err());
    }

    #[test]
    fn bad_parameters_name_their_position() {
        let types = vec![type_of::<i32>(), type_of::<i32>()];
        match bind_parameters(&types, &[json!(1), json!("nope")]) {
            Err(Error::InvalidParameter { index, .. }) => assert_eq!(index, 2),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
