// Date and time built-ins
//
// Dates travel through expressions as strings. Inputs are parsed leniently
// and results are rendered back as UTC ISO 8601 instants.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc,
};
use thiserror::Error;

use crate::functions::{FunctionError, FunctionRegistry};
use crate::signature::Arity;
use crate::utils::to_integer;
use crate::value::Value;

/// DateTime errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateTimeError {
    #[error("Unrecognised date: {0}")]
    Parse(String),

    #[error("Date out of range")]
    OutOfRange,
}

impl From<DateTimeError> for FunctionError {
    fn from(e: DateTimeError) -> Self {
        FunctionError::Runtime(e.to_string())
    }
}

const DEFAULT_PATTERN: &str = "yyyy-MM-dd";

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f"];
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a date string.
///
/// RFC 3339 instants are tried first, then `yyyy-MM-ddTHH:mm:ss`,
/// `yyyy-MM-dd` and `MM/dd/yyyy`, the latter three interpreted as UTC.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, DateTimeError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(naive.and_utc());
            }
        }
    }
    Err(DateTimeError::Parse(s.to_string()))
}

/// Date argument of a built-in; anything unparseable means "now".
fn date_arg(value: &Value) -> DateTime<Utc> {
    match value.as_str().map(parse_date) {
        Some(Ok(dt)) => dt,
        _ => {
            tracing::debug!(value = %value, "unparseable date argument, using current time");
            Utc::now()
        }
    }
}

/// Format a datetime as ISO 8601 with a `Z` suffix
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Translate a `yyyy-MM-dd`-style pattern into a chrono format string.
///
/// Text inside single quotes is literal, `''` is a literal quote, and
/// letters without a mapping are copied through.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1; // closing quote
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let directive = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('a', _) => Some("%p"),
            _ => None,
        };

        match directive {
            Some(directive) => out.push_str(directive),
            None => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
            }
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("formatDateTime", format_date_time);
    registry.register("addDays", add_days);
    registry.register("addHours", add_hours);
    registry.register("getYear", get_year);
    registry.register("getMonth", get_month);
    registry.register("getDay", get_day);
    registry.register("dateDiff", date_diff);
    registry.register("utcNow", utc_now);
}

/// formatDateTime(date[, pattern])
pub fn format_date_time(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Range(1, 2).validate(args.len())?;
    let dt = date_arg(&args[0]);
    let pattern = args
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PATTERN);
    let rendered = dt.format(&translate_pattern(pattern)).to_string();
    Ok(Value::from(rendered))
}

fn shift(date: &Value, delta: Option<TimeDelta>) -> Result<Value, FunctionError> {
    let shifted = delta
        .and_then(|delta| date_arg(date).checked_add_signed(delta))
        .ok_or(DateTimeError::OutOfRange)?;
    Ok(Value::from(format_iso8601(&shifted)))
}

/// addDays(date, n)
pub fn add_days(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(2).validate(args.len())?;
    shift(&args[0], TimeDelta::try_days(to_integer(&args[1])))
}

/// addHours(date, n)
pub fn add_hours(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(2).validate(args.len())?;
    shift(&args[0], TimeDelta::try_hours(to_integer(&args[1])))
}

pub fn get_year(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(1).validate(args.len())?;
    Ok(Value::from(date_arg(&args[0]).year()))
}

/// getMonth(date) - 1 for January
pub fn get_month(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(1).validate(args.len())?;
    Ok(Value::Number(date_arg(&args[0]).month() as f64))
}

/// getDay(date) - day of the month
pub fn get_day(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(1).validate(args.len())?;
    Ok(Value::Number(date_arg(&args[0]).day() as f64))
}

/// dateDiff(from, to) - whole days, truncated toward zero
pub fn date_diff(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(2).validate(args.len())?;
    let from = date_arg(&args[0]);
    let to = date_arg(&args[1]);
    Ok(Value::Number((to - from).num_days() as f64))
}

pub fn utc_now(args: &[Value]) -> Result<Value, FunctionError> {
    Arity::Exact(0).validate(args.len())?;
    Ok(Value::from(format_iso8601(&Utc::now())))
}
