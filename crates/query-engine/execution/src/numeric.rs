//! Conversion between PostgreSQL's binary `numeric` format and decimal text.
//!
//! The binary form is a header of four 16-bit fields (digit count, weight,
//! sign, display scale) followed by base-10000 digits, most significant first.
//! The weight is the power of 10000 of the first digit.

use std::fmt::Write;

use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Decode, Postgres, Type};

const SIGN_POSITIVE: u16 = 0x0000;
const SIGN_NEGATIVE: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_POSITIVE_INFINITY: u16 = 0xD000;
const SIGN_NEGATIVE_INFINITY: u16 = 0xF000;

const DIGITS_PER_GROUP: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericError(pub String);

impl std::fmt::Display for NumericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NumericError {}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, NumericError> {
    bytes
        .get(offset..offset + 2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .ok_or_else(|| NumericError("numeric value is truncated".to_string()))
}

/// Render a binary `numeric` as the exact decimal text PostgreSQL would print.
pub fn decode_binary(bytes: &[u8]) -> Result<String, NumericError> {
    let ndigits = usize::from(read_u16(bytes, 0)?);
    let weight = i64::from(read_u16(bytes, 2)? as i16);
    let sign = read_u16(bytes, 4)?;
    let dscale = usize::from(read_u16(bytes, 6)?);

    match sign {
        SIGN_NAN => return Ok("NaN".to_string()),
        SIGN_POSITIVE_INFINITY => return Ok("Infinity".to_string()),
        SIGN_NEGATIVE_INFINITY => return Ok("-Infinity".to_string()),
        SIGN_POSITIVE | SIGN_NEGATIVE => {}
        other => return Err(NumericError(format!("invalid numeric sign {other:#x}"))),
    }

    let digits = (0..ndigits)
        .map(|i| read_u16(bytes, 8 + i * 2))
        .collect::<Result<Vec<u16>, NumericError>>()?;
    let digit_at = |index: i64| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|index| digits.get(index).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == SIGN_NEGATIVE && !digits.iter().all(|d| *d == 0) {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for index in 0..=weight {
            if index == 0 {
                let _ = write!(out, "{}", digit_at(index));
            } else {
                let _ = write!(out, "{:04}", digit_at(index));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + DIGITS_PER_GROUP);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit_at(index));
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Encode decimal text (`-12.5`, `NaN`, `Infinity`) as a binary `numeric`.
///
/// Exponent notation is accepted; the display scale is the number of digits
/// after the decimal point once the exponent is applied.
pub fn encode_text(text: &str) -> Result<Vec<u8>, NumericError> {
    let text = text.trim();
    let invalid = || NumericError(format!("invalid input syntax for type numeric: \"{text}\""));

    match text.to_ascii_lowercase().as_str() {
        "nan" => return Ok(header(0, 0, SIGN_NAN, 0)),
        "infinity" | "+infinity" | "inf" => return Ok(header(0, 0, SIGN_POSITIVE_INFINITY, 0)),
        "-infinity" | "-inf" => return Ok(header(0, 0, SIGN_NEGATIVE_INFINITY, 0)),
        _ => {}
    }

    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (
            &unsigned[..at],
            unsigned[at + 1..].parse::<i64>().map_err(|_| invalid())?,
        ),
        None => (unsigned, 0),
    };
    let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if (integer.is_empty() && fraction.is_empty())
        || !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    // shift the decimal point by the exponent
    let all_digits: String = format!("{integer}{fraction}");
    let point = i64::try_from(integer.len()).map_err(|_| invalid())? + exponent;
    let (integer, fraction) = if point <= 0 {
        let zeros = "0".repeat(usize::try_from(-point).map_err(|_| invalid())?);
        (String::new(), format!("{zeros}{all_digits}"))
    } else {
        let point = usize::try_from(point).map_err(|_| invalid())?;
        if point >= all_digits.len() {
            let zeros = "0".repeat(point - all_digits.len());
            (format!("{all_digits}{zeros}"), String::new())
        } else {
            (all_digits[..point].to_string(), all_digits[point..].to_string())
        }
    };
    let integer = integer.trim_start_matches('0');
    let dscale = u16::try_from(fraction.len()).map_err(|_| invalid())?;

    // left-pad the integer part and right-pad the fraction to whole groups
    let integer_pad = (DIGITS_PER_GROUP - integer.len() % DIGITS_PER_GROUP) % DIGITS_PER_GROUP;
    let fraction_pad = (DIGITS_PER_GROUP - fraction.len() % DIGITS_PER_GROUP) % DIGITS_PER_GROUP;
    let padded = format!(
        "{}{integer}{fraction}{}",
        "0".repeat(integer_pad),
        "0".repeat(fraction_pad)
    );
    let mut groups: Vec<u16> = padded
        .as_bytes()
        .chunks(DIGITS_PER_GROUP)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'))
        })
        .collect();
    let mut weight = i64::try_from((integer.len() + integer_pad) / DIGITS_PER_GROUP)
        .map_err(|_| invalid())?
        - 1;

    while groups.first() == Some(&0) {
        groups.remove(0);
        weight -= 1;
    }
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        return Ok(header(0, 0, SIGN_POSITIVE, dscale));
    }

    let ndigits = u16::try_from(groups.len()).map_err(|_| invalid())?;
    let weight = i16::try_from(weight).map_err(|_| invalid())?;
    let sign = if negative { SIGN_NEGATIVE } else { SIGN_POSITIVE };
    let mut bytes = header(ndigits, weight, sign, dscale);
    for group in groups {
        bytes.extend_from_slice(&group.to_be_bytes());
    }
    Ok(bytes)
}

fn header(ndigits: u16, weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + usize::from(ndigits) * 2);
    bytes.extend_from_slice(&ndigits.to_be_bytes());
    bytes.extend_from_slice(&weight.to_be_bytes());
    bytes.extend_from_slice(&sign.to_be_bytes());
    bytes.extend_from_slice(&dscale.to_be_bytes());
    bytes
}

/// A `numeric` decoded to its exact decimal text, in either format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericText(pub String);

impl Type<Postgres> for NumericText {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }
}

impl<'r> Decode<'r, Postgres> for NumericText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(NumericText(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(NumericText(decode_binary(value.as_bytes()?)?)),
        }
    }
}
