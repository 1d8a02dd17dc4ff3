//! Typed values produced by structuring and consumed by unstructuring.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use time::{Date, Duration, OffsetDateTime};

// ──────────────────────────────────────────────
// Typed values
// ──────────────────────────────────────────────

/// A validated, strongly-typed value.
///
/// Decimals are exact (`rust_decimal`), temporal values use the `time`
/// crate. Records carry their schema name so a union site can tell which
/// member produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    /// Empty optional.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(Decimal),
    DateTime(OffsetDateTime),
    Date(Date),
    Duration(Duration),
    /// Enumeration member, identified by member name.
    Enum(String),
    List(Vec<Typed>),
    Map(BTreeMap<String, Typed>),
    Record(RecordValue),
    External(ExternalInstance),
    /// Passthrough dynamic value.
    Raw(serde_json::Value),
}

impl Typed {
    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Typed::Null => "Null",
            Typed::Bool(_) => "Bool",
            Typed::Int(_) => "Int",
            Typed::Float(_) => "Float",
            Typed::Text(_) => "Text",
            Typed::Decimal(_) => "Decimal",
            Typed::DateTime(_) => "DateTime",
            Typed::Date(_) => "Date",
            Typed::Duration(_) => "Duration",
            Typed::Enum(_) => "Enum",
            Typed::List(_) => "List",
            Typed::Map(_) => "Map",
            Typed::Record(_) => "Record",
            Typed::External(_) => "External",
            Typed::Raw(_) => "Raw",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Typed::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Typed::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Typed::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Typed::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Typed::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Typed::Enum(member) => Some(member),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Typed]> {
        match self {
            Typed::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Typed::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&ExternalInstance> {
        match self {
            Typed::External(e) => Some(e),
            _ => None,
        }
    }

    /// Name of the record or external model this value was built from.
    pub fn schema_name(&self) -> Option<&str> {
        match self {
            Typed::Record(r) => Some(&r.name),
            Typed::External(e) => Some(&e.model),
            _ => None,
        }
    }
}

impl From<bool> for Typed {
    fn from(b: bool) -> Self {
        Typed::Bool(b)
    }
}

impl From<i64> for Typed {
    fn from(i: i64) -> Self {
        Typed::Int(i)
    }
}

impl From<&str> for Typed {
    fn from(s: &str) -> Self {
        Typed::Text(s.to_string())
    }
}

impl From<String> for Typed {
    fn from(s: String) -> Self {
        Typed::Text(s)
    }
}

impl From<Decimal> for Typed {
    fn from(d: Decimal) -> Self {
        Typed::Decimal(d)
    }
}

impl From<RecordValue> for Typed {
    fn from(r: RecordValue) -> Self {
        Typed::Record(r)
    }
}

impl<T: Into<Typed>> From<Option<T>> for Typed {
    fn from(v: Option<T>) -> Self {
        v.map_or(Typed::Null, Into::into)
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// An instance of a declared record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub name: String,
    pub fields: BTreeMap<String, Typed>,
}

impl RecordValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Typed>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Typed> {
        self.fields.get(field)
    }
}

/// An instance of an external (persistence-layer) model.
///
/// Built by a [`ModelCatalog`](crate::external::ModelCatalog); `persisted`
/// records whether the instance is known to exist in the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalInstance {
    pub model: String,
    pub fields: BTreeMap<String, Typed>,
    pub persisted: bool,
}

impl ExternalInstance {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: BTreeMap::new(),
            persisted: false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Typed> {
        self.fields.get(field)
    }
}

// ──────────────────────────────────────────────
// Diagnostics
// ──────────────────────────────────────────────

/// Render a dynamic value for an error message: strings bare, everything
/// else as compact JSON.
pub fn display_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a typed value for an error message.
pub(crate) fn display_typed(v: &Typed) -> String {
    match v {
        Typed::Null => "null".to_string(),
        Typed::Bool(b) => b.to_string(),
        Typed::Int(i) => i.to_string(),
        Typed::Float(f) => f.to_string(),
        Typed::Text(s) | Typed::Enum(s) => s.clone(),
        Typed::Decimal(d) => d.to_string(),
        Typed::DateTime(dt) => dt.to_string(),
        Typed::Date(d) => d.to_string(),
        Typed::Duration(d) => d.to_string(),
        Typed::Raw(raw) => display_value(raw),
        Typed::Record(r) => format!("{} record", r.name),
        Typed::External(e) => format!("{} instance", e.model),
        other => other.type_name().to_string(),
    }
}
