//! PostgreSQL's text output for values that arrive in the binary format.
//!
//! The simple query protocol hands these types back as text already; the
//! renderings here produce the same text from the decoded binary values, with
//! the server's default output settings (`IntervalStyle = postgres`, a `$`
//! currency with two fractional digits).

use std::fmt::Write;
use std::ops::Bound;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use sqlx::postgres::types::{PgInterval, PgRange, PgTimeTz};
use sqlx::types::ipnetwork::IpNetwork;

const MICROS_PER_SECOND: u64 = 1_000_000;
const MICROS_PER_MINUTE: u64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: u64 = 60 * MICROS_PER_MINUTE;

/// Append `.ffffff` without trailing zeros, or nothing for whole seconds.
fn push_fraction(out: &mut String, micros: u64) {
    if micros != 0 {
        let digits = format!("{micros:06}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
}

/// `HH:MM:SS[.ffffff]`
pub fn time(time: &NaiveTime) -> String {
    let mut out = format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    );
    push_fraction(&mut out, u64::from(time.nanosecond() / 1000) % MICROS_PER_SECOND);
    out
}

pub fn date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`
pub fn timestamp(timestamp: &NaiveDateTime) -> String {
    format!("{} {}", date(&timestamp.date()), time(&timestamp.time()))
}

/// A UTC offset the way PostgreSQL prints it: `+HH`, plus `:MM` and `:SS`
/// only when they are not zero.
fn push_offset(out: &mut String, offset: &FixedOffset) {
    let seconds = offset.local_minus_utc();
    out.push(if seconds < 0 { '-' } else { '+' });
    let seconds = seconds.unsigned_abs();
    let _ = write!(out, "{:02}", seconds / 3600);
    let (minutes, seconds) = (seconds / 60 % 60, seconds % 60);
    if minutes != 0 || seconds != 0 {
        let _ = write!(out, ":{minutes:02}");
    }
    if seconds != 0 {
        let _ = write!(out, ":{seconds:02}");
    }
}

pub fn time_with_time_zone(value: &PgTimeTz<NaiveTime, FixedOffset>) -> String {
    let mut out = time(&value.time);
    push_offset(&mut out, &value.offset);
    out
}

/// An interval in the `postgres` style, e.g. `1 year 2 mons -3 days 04:05:06.5`.
pub fn interval(interval: &PgInterval) -> String {
    let mut out = String::new();
    let mut is_zero = true;
    let mut is_before = false;

    let fields = [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ];
    for (value, unit) in fields {
        if value == 0 {
            continue;
        }
        if !is_zero {
            out.push(' ');
        }
        if is_before && value > 0 {
            out.push('+');
        }
        let plural = if value == 1 { "" } else { "s" };
        let _ = write!(out, "{value} {unit}{plural}");
        is_before = value < 0;
        is_zero = false;
    }

    let micros = interval.microseconds;
    if is_zero || micros != 0 {
        if !is_zero {
            out.push(' ');
        }
        if micros < 0 {
            out.push('-');
        } else if is_before {
            out.push('+');
        }
        let micros = micros.unsigned_abs();
        let _ = write!(
            out,
            "{:02}:{:02}:{:02}",
            micros / MICROS_PER_HOUR,
            micros / MICROS_PER_MINUTE % 60,
            micros / MICROS_PER_SECOND % 60
        );
        push_fraction(&mut out, micros % MICROS_PER_SECOND);
    }
    out
}

/// `money` from its count of cents, e.g. `-$1,234.50`.
pub fn money(cents: i64) -> String {
    let amount = cents.unsigned_abs();
    let whole = (amount / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (position, digit) in whole.chars().enumerate() {
        if position > 0 && (whole.len() - position) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", amount % 100)
}

/// `inet` omits the prefix length of a single host; `cidr` always shows it.
pub fn network(network: &IpNetwork, is_cidr: bool) -> String {
    let host_prefix = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if !is_cidr && network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        format!("{}/{}", network.ip(), network.prefix())
    }
}

/// A range literal such as `[1,10)` or `(,"2024-01-01 00:00:00"]`.
pub fn range<T>(range: &PgRange<T>, render: impl Fn(&T) -> String) -> String {
    let mut out = String::new();
    match &range.start {
        Bound::Included(value) => {
            out.push('[');
            push_range_bound(&mut out, &render(value));
        }
        Bound::Excluded(value) => {
            out.push('(');
            push_range_bound(&mut out, &render(value));
        }
        Bound::Unbounded => out.push('('),
    }
    out.push(',');
    match &range.end {
        Bound::Included(value) => {
            push_range_bound(&mut out, &render(value));
            out.push(']');
        }
        Bound::Excluded(value) => {
            push_range_bound(&mut out, &render(value));
            out.push(')');
        }
        Bound::Unbounded => out.push(')'),
    }
    out
}

/// Range bounds are quoted when they contain range syntax or whitespace;
/// quotes and backslashes inside are doubled.
fn push_range_bound(out: &mut String, text: &str) {
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|c| matches!(c, '"' | '\\' | '(' | ')' | '[' | ']' | ',') || c.is_whitespace());
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push(c);
        }
        out.push(c);
    }
    out.push('"');
}
