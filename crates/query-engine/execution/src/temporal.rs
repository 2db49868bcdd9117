//! Dates and timestamps, including `infinity` and `-infinity`.
//!
//! chrono has no infinite instants, so these are checked for before the value
//! is handed to sqlx's own decoders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Decode, Postgres, Type};

use crate::render;
use crate::value::RawValue;

/// A point in time, or one of the infinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    Finite(DateTime<Utc>),
    Infinity,
    NegativeInfinity,
}

impl Moment {
    pub fn into_raw(self) -> RawValue {
        match self {
            Moment::Finite(ts) => RawValue::Timestamp(ts),
            Moment::Infinity | Moment::NegativeInfinity => RawValue::Text(self.infinite_label().to_string()),
        }
    }

    fn infinite_label(self) -> &'static str {
        match self {
            Moment::NegativeInfinity => "-infinity",
            _ => "infinity",
        }
    }

    /// Text of the moment, with `finite` rendering finite values.
    pub fn render(self, finite: impl FnOnce(&DateTime<Utc>) -> String) -> String {
        match self {
            Moment::Finite(ts) => finite(&ts),
            _ => self.infinite_label().to_string(),
        }
    }
}

/// The infinities in either format. In the binary format they are the
/// largest and smallest value of the 64-bit timestamp or 32-bit date.
fn infinity(value: &PgValueRef<'_>) -> Result<Option<Moment>, BoxDynError> {
    Ok(match value.format() {
        PgValueFormat::Text => match value.as_str()?.trim() {
            "infinity" => Some(Moment::Infinity),
            "-infinity" => Some(Moment::NegativeInfinity),
            _ => None,
        },
        PgValueFormat::Binary => {
            let bytes = value.as_bytes()?;
            if let Ok(wide) = <[u8; 8]>::try_from(bytes) {
                match i64::from_be_bytes(wide) {
                    i64::MAX => Some(Moment::Infinity),
                    i64::MIN => Some(Moment::NegativeInfinity),
                    _ => None,
                }
            } else if let Ok(narrow) = <[u8; 4]>::try_from(bytes) {
                match i32::from_be_bytes(narrow) {
                    i32::MAX => Some(Moment::Infinity),
                    i32::MIN => Some(Moment::NegativeInfinity),
                    _ => None,
                }
            } else {
                None
            }
        }
    })
}

fn decode_moment<'r, T>(
    value: PgValueRef<'r>,
    finite: impl FnOnce(T) -> Option<DateTime<Utc>>,
) -> Result<Moment, BoxDynError>
where
    T: Decode<'r, Postgres>,
{
    if let Some(moment) = infinity(&value)? {
        return Ok(moment);
    }
    finite(T::decode(value)?)
        .map(Moment::Finite)
        .ok_or_else(|| "date is out of range".into())
}

/// A `timestamptz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampTzValue(pub Moment);

/// A `timestamp`, taken to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampValue(pub Moment);

/// A `date`, as midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue(pub Moment);

impl Type<Postgres> for TimestampTzValue {
    fn type_info() -> PgTypeInfo {
        <DateTime<Utc> as Type<Postgres>>::type_info()
    }
}

impl Type<Postgres> for TimestampValue {
    fn type_info() -> PgTypeInfo {
        <NaiveDateTime as Type<Postgres>>::type_info()
    }
}

impl Type<Postgres> for DateValue {
    fn type_info() -> PgTypeInfo {
        <NaiveDate as Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for TimestampTzValue {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        decode_moment::<DateTime<Utc>>(value, Some).map(TimestampTzValue)
    }
}

impl<'r> Decode<'r, Postgres> for TimestampValue {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        decode_moment::<NaiveDateTime>(value, |ts| Some(Utc.from_utc_datetime(&ts)))
            .map(TimestampValue)
    }
}

impl<'r> Decode<'r, Postgres> for DateValue {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        decode_moment::<NaiveDate>(value, |date| {
            date.and_hms_opt(0, 0, 0)
                .map(|midnight| Utc.from_utc_datetime(&midnight))
        })
        .map(DateValue)
    }
}

impl TimestampTzValue {
    pub fn to_text(self) -> String {
        self.0
            .render(|ts| format!("{}+00", render::timestamp(&ts.naive_utc())))
    }
}

impl TimestampValue {
    pub fn to_text(self) -> String {
        self.0.render(|ts| render::timestamp(&ts.naive_utc()))
    }
}

impl DateValue {
    pub fn to_text(self) -> String {
        self.0.render(|ts| render::date(&ts.date_naive()))
    }
}
