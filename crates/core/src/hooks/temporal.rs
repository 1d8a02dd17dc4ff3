//! Date and date/time hooks.
//!
//! Numeric POSIX seconds (a number, or a string holding one) take precedence
//! over text. Text is tried against RFC 3339, ISO 8601, a set of offset and
//! naive layouts, and finally date-only layouts. Text without an offset is
//! taken as UTC.

use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use super::scalar::finite;
use super::{shape, wrong_typed};
use crate::error::HookError;
use crate::typed::Typed;
use crate::types::TypeDesc;

/// Seconds beyond this are rejected before any calendar arithmetic.
const MAX_POSIX_SECONDS: f64 = 1.0e13;

// ──────────────────────────────────────────────
// DateTime
// ──────────────────────────────────────────────

pub(super) fn structure_datetime(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    if let Some(secs) = numeric_seconds(v) {
        return from_posix(secs).map(Typed::DateTime);
    }
    let text = v.as_str().ok_or_else(|| {
        HookError::invalid(format!("expected a date/time, got {}", shape(v)))
    })?;
    parse_datetime(text)
        .map(Typed::DateTime)
        .ok_or_else(|| HookError::invalid(format!("'{}' is not a recognized date/time", text)))
}

pub(super) fn unstructure_datetime(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    match t {
        Typed::DateTime(dt) => finite(posix_seconds(*dt)),
        other => Err(wrong_typed("DateTime", other)),
    }
}

// ──────────────────────────────────────────────
// Date
// ──────────────────────────────────────────────

pub(super) fn structure_date(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    if let Some(secs) = numeric_seconds(v) {
        return from_posix(secs).map(|dt| Typed::Date(dt.date()));
    }
    let text = v
        .as_str()
        .ok_or_else(|| HookError::invalid(format!("expected a date, got {}", shape(v))))?;
    parse_date(text)
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
        .map(Typed::Date)
        .ok_or_else(|| HookError::invalid(format!("'{}' is not a recognized date", text)))
}

pub(super) fn unstructure_date(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    match t {
        Typed::Date(d) => finite(posix_seconds(d.midnight().assume_utc())),
        other => Err(wrong_typed("Date", other)),
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// POSIX seconds with sub-second precision.
pub(super) fn posix_seconds(dt: OffsetDateTime) -> f64 {
    dt.unix_timestamp() as f64 + f64::from(dt.nanosecond()) / 1e9
}

/// A number, or a string that parses as a finite number.
pub(super) fn numeric_seconds(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn from_posix(secs: f64) -> Result<OffsetDateTime, HookError> {
    if !secs.is_finite() || secs.abs() > MAX_POSIX_SECONDS {
        return Err(HookError::invalid(format!(
            "{} is out of range for a timestamp",
            secs
        )));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as i64;
    OffsetDateTime::from_unix_timestamp(whole as i64)
        .ok()
        .and_then(|dt| dt.checked_add(Duration::nanoseconds(nanos)))
        .ok_or_else(|| HookError::invalid(format!("{} is out of range for a timestamp", secs)))
}

fn parse_datetime(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    let offset = [
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
        ),
        format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ),
        format_description!(
            "[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"
        ),
        format_description!(
            "[year]-[month]-[day] [hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ];
    let naive = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]Z"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]Z"),
    ];

    OffsetDateTime::parse(text, &Rfc3339)
        .ok()
        .or_else(|| OffsetDateTime::parse(text, &Iso8601::DEFAULT).ok())
        .or_else(|| {
            offset
                .iter()
                .find_map(|fmt| OffsetDateTime::parse(text, *fmt).ok())
        })
        .or_else(|| {
            naive
                .iter()
                .find_map(|fmt| PrimitiveDateTime::parse(text, *fmt).ok())
                .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| parse_date(text).map(|d| d.midnight().assume_utc()))
}

fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    let layouts = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[year]/[month]/[day]"),
        format_description!(
            "[month repr:long case_sensitive:false] [day padding:none], [year]"
        ),
        format_description!(
            "[month repr:short case_sensitive:false] [day padding:none], [year]"
        ),
        format_description!(
            "[day padding:none] [month repr:long case_sensitive:false] [year]"
        ),
        format_description!(
            "[day padding:none] [month repr:short case_sensitive:false] [year]"
        ),
    ];
    layouts
        .iter()
        .find_map(|fmt| Date::parse(text, *fmt).ok())
}
