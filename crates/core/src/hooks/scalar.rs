//! Built-in hooks for booleans, numbers, text, decimals, enumerations and
//! raw passthrough.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use super::{shape, temporal, wrong_typed};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::HookError;
use crate::typed::Typed;
use crate::types::{EnumSchema, TypeDesc};

// ──────────────────────────────────────────────
// Bool
// ──────────────────────────────────────────────

pub(super) fn structure_bool(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    match v {
        Value::Bool(b) => Ok(Typed::Bool(*b)),
        Value::String(s) => match s.as_str() {
            "true" | "True" => Ok(Typed::Bool(true)),
            "false" | "False" => Ok(Typed::Bool(false)),
            _ => Err(HookError::invalid(format!("'{}' is not a boolean literal", s))),
        },
        other => Err(HookError::invalid(format!(
            "expected a boolean, got {}",
            shape(other)
        ))),
    }
}

pub(super) fn unstructure_bool(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    t.as_bool()
        .map(Value::Bool)
        .ok_or_else(|| wrong_typed("Bool", t))
}

// ──────────────────────────────────────────────
// Numbers and text
// ──────────────────────────────────────────────

pub(super) fn structure_int(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    let parsed = match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        other => {
            return Err(HookError::invalid(format!(
                "expected an integer, got {}",
                shape(other)
            )))
        }
    };
    parsed
        .map(Typed::Int)
        .ok_or_else(|| HookError::invalid(format!("{} is not an integer", v)))
}

/// `f` as an i64 when it has no fractional part and fits.
fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

pub(super) fn unstructure_int(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    t.as_int().map(Value::from).ok_or_else(|| wrong_typed("Int", t))
}

pub(super) fn structure_float(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        other => {
            return Err(HookError::invalid(format!(
                "expected a number, got {}",
                shape(other)
            )))
        }
    };
    parsed
        .map(Typed::Float)
        .ok_or_else(|| HookError::invalid(format!("{} is not a number", v)))
}

pub(super) fn unstructure_float(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    let f = match t {
        Typed::Float(f) => *f,
        Typed::Int(i) => *i as f64,
        other => return Err(wrong_typed("Float", other)),
    };
    finite(f)
}

pub(super) fn structure_text(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    match v {
        Value::String(s) => Ok(Typed::Text(s.clone())),
        Value::Number(n) => Ok(Typed::Text(n.to_string())),
        other => Err(HookError::invalid(format!(
            "expected text, got {}",
            shape(other)
        ))),
    }
}

pub(super) fn unstructure_text(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    t.as_text()
        .map(|s| Value::String(s.to_string()))
        .ok_or_else(|| wrong_typed("Text", t))
}

// ──────────────────────────────────────────────
// Decimal
// ──────────────────────────────────────────────

pub(super) fn structure_decimal(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(HookError::invalid(format!(
                "expected a decimal, got {}",
                shape(other)
            )))
        }
    };
    parse_decimal(&text)
        .map(Typed::Decimal)
        .ok_or_else(|| HookError::invalid(format!("'{}' is not a decimal", text)))
}

/// Plain notation first, then scientific (`1.5e3`).
fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

pub(super) fn unstructure_decimal(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    t.as_decimal()
        .map(|d| Value::String(d.to_string()))
        .ok_or_else(|| wrong_typed("Decimal", t))
}

// ──────────────────────────────────────────────
// Enumerations
// ──────────────────────────────────────────────

fn enum_schema(desc: &TypeDesc) -> Result<&EnumSchema, HookError> {
    match desc {
        TypeDesc::NamedEnum(schema) | TypeDesc::ValueEnum(schema) => Ok(schema),
        other => Err(HookError::invalid(format!("{} is not an enumeration", other))),
    }
}

pub(super) fn structure_named_enum(v: &Value, desc: &TypeDesc) -> Result<Typed, HookError> {
    let schema = enum_schema(desc)?;
    let name = v
        .as_str()
        .ok_or_else(|| HookError::invalid(format!("expected a member name, got {}", shape(v))))?;
    schema
        .by_name(name)
        .map(|m| Typed::Enum(m.name.clone()))
        .ok_or_else(|| {
            HookError::invalid(format!("'{}' is not a member of {}", name, schema.name))
        })
}

pub(super) fn unstructure_named_enum(t: &Typed, desc: &TypeDesc) -> Result<Value, HookError> {
    let schema = enum_schema(desc)?;
    let name = t.as_enum().ok_or_else(|| wrong_typed(&schema.name, t))?;
    schema
        .by_name(name)
        .map(|m| Value::String(m.name.clone()))
        .ok_or_else(|| {
            HookError::invalid(format!("'{}' is not a member of {}", name, schema.name))
        })
}

pub(super) fn structure_value_enum(v: &Value, desc: &TypeDesc) -> Result<Typed, HookError> {
    let schema = enum_schema(desc)?;
    schema
        .by_value(v)
        .map(|m| Typed::Enum(m.name.clone()))
        .ok_or_else(|| {
            HookError::invalid(format!("{} is not a value of {}", v, schema.name))
        })
}

pub(super) fn unstructure_value_enum(t: &Typed, desc: &TypeDesc) -> Result<Value, HookError> {
    let schema = enum_schema(desc)?;
    let name = t.as_enum().ok_or_else(|| wrong_typed(&schema.name, t))?;
    schema
        .by_name(name)
        .map(|m| m.value.clone())
        .ok_or_else(|| {
            HookError::invalid(format!("'{}' is not a member of {}", name, schema.name))
        })
}

// ──────────────────────────────────────────────
// Passthrough
// ──────────────────────────────────────────────

pub(super) fn structure_any(v: &Value, _desc: &TypeDesc) -> Result<Typed, HookError> {
    Ok(Typed::Raw(v.clone()))
}

pub(super) fn unstructure_any(t: &Typed, _desc: &TypeDesc) -> Result<Value, HookError> {
    plain(t)
}

/// Self-describing conversion of a typed value, used where no descriptor
/// says otherwise (raw passthrough and untyped external fields). Nesting is
/// bounded by [`DEFAULT_MAX_DEPTH`].
pub(crate) fn plain(t: &Typed) -> Result<Value, HookError> {
    plain_within(t, DEFAULT_MAX_DEPTH)
}

/// [`plain`] with at most `levels` nested lists, maps or records.
pub(crate) fn plain_within(t: &Typed, levels: usize) -> Result<Value, HookError> {
    let nested = |levels: usize| {
        levels.checked_sub(1).ok_or_else(|| {
            HookError::invalid(format!("{} nests too deeply", t.type_name()))
        })
    };
    Ok(match t {
        Typed::Null => Value::Null,
        Typed::Bool(b) => Value::Bool(*b),
        Typed::Int(i) => Value::from(*i),
        Typed::Float(f) => finite(*f)?,
        Typed::Text(s) | Typed::Enum(s) => Value::String(s.clone()),
        Typed::Decimal(d) => Value::String(d.to_string()),
        Typed::DateTime(dt) => finite(temporal::posix_seconds(*dt))?,
        Typed::Date(d) => finite(temporal::posix_seconds(d.midnight().assume_utc()))?,
        Typed::Duration(d) => finite(d.as_seconds_f64())?,
        Typed::List(items) => {
            let levels = nested(levels)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(plain_within(item, levels)?);
            }
            Value::Array(out)
        }
        Typed::Map(entries) => plain_fields(entries, nested(levels)?)?,
        Typed::Record(r) => plain_fields(&r.fields, nested(levels)?)?,
        Typed::External(e) => plain_fields(&e.fields, nested(levels)?)?,
        Typed::Raw(raw) => raw.clone(),
    })
}

fn plain_fields(fields: &BTreeMap<String, Typed>, levels: usize) -> Result<Value, HookError> {
    let mut out = serde_json::Map::new();
    for (name, value) in fields {
        out.insert(name.clone(), plain_within(value, levels)?);
    }
    Ok(Value::Object(out))
}

pub(super) fn finite(f: f64) -> Result<Value, HookError> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| HookError::invalid(format!("{} is not a finite number", f)))
}
