//! Duration hook.
//!
//! Numeric seconds take precedence. Text is read either as a clock
//! (`1:30` is minutes and seconds, `1:30:00` hours, minutes and seconds) or
//! as a sequence of amount/unit pairs such as `1h30m` or
//! `2 days, 3 hours and 10 minutes`. Both forms take an optional sign.

use serde_json::Value;
use time::Duration;

use super::scalar::finite;
use super::temporal::numeric_seconds;
use super::{shape, wrong_typed};
use crate::error::HookError;
use crate::typed::Typed;
use crate::types::TypeDesc;

/// Larger magnitudes overflow `time::Duration` arithmetic.
const MAX_SECONDS: f64 = 1.0e15;

pub(super) fn structure_duration(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    let secs = match numeric_seconds(v) {
        Some(secs) => secs,
        None => {
            let text = v.as_str().ok_or_else(|| {
                HookError::invalid(format!("expected a duration, got {}", shape(v)))
            })?;
            parse_duration(text).ok_or_else(|| {
                HookError::invalid(format!("'{}' is not a recognized duration", text))
            })?
        }
    };
    if secs.abs() >= MAX_SECONDS {
        return Err(HookError::invalid(format!(
            "{} seconds is out of range for a duration",
            secs
        )));
    }
    Ok(Typed::Duration(Duration::seconds_f64(secs)))
}

pub(super) fn unstructure_duration(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    match t {
        Typed::Duration(d) => finite(d.as_seconds_f64()),
        other => Err(wrong_typed("Duration", other)),
    }
}

/// Parse human duration text into seconds.
fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim().to_ascii_lowercase();
    let (sign, body) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, text[1..].trim_start()),
        Some(b'+') => (1.0, text[1..].trim_start()),
        _ => (1.0, text.as_str()),
    };
    if body.is_empty() {
        return None;
    }
    let secs = if body.contains(':') {
        parse_clock(body)?
    } else {
        parse_units(body)?
    };
    Some(sign * secs)
}

/// `m:s` or `h:m:s`. Only the last component may be fractional.
fn parse_clock(body: &str) -> Option<f64> {
    let parts: Vec<&str> = body.split(':').map(str::trim).collect();
    let (whole, last) = parts.split_at(parts.len() - 1);
    if whole.is_empty() || whole.len() > 2 {
        return None;
    }
    let mut secs = 0.0;
    for part in whole {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        secs = secs * 60.0 + part.parse::<f64>().ok()?;
    }
    let tail = last.first()?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    Some(secs * 60.0 + tail.parse::<f64>().ok()?)
}

/// One or more `<amount><unit>` pairs, separated by whitespace, commas or
/// the word `and`.
fn parse_units(body: &str) -> Option<f64> {
    let bytes = body.as_bytes();
    let mut pos = 0;
    let mut total = 0.0;
    let mut pairs = 0;

    loop {
        pos = skip_separators(body, pos);
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
            pos += 1;
        }
        let amount: f64 = body[start..pos].parse().ok()?;

        while pos < bytes.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        total += amount * unit_seconds(&body[start..pos])?;
        pairs += 1;
    }

    (pairs > 0).then_some(total)
}

fn skip_separators(body: &str, mut pos: usize) -> usize {
    let bytes = body.as_bytes();
    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        let rest = &body[pos..];
        let is_and = rest.starts_with("and")
            && rest[3..]
                .bytes()
                .next()
                .map_or(true, |b| !b.is_ascii_alphanumeric());
        if is_and {
            pos += 3;
        } else {
            return pos;
        }
    }
}

fn unit_seconds(unit: &str) -> Option<f64> {
    let secs = match unit {
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800.0,
        "d" | "day" | "days" => 86_400.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        _ => return None,
    };
    Some(secs)
}
