//! Type descriptors: the resolved, immutable shape the engines convert against.
//!
//! Descriptors are produced by the [`TypeResolver`](crate::resolve::TypeResolver)
//! from record declarations and never change afterward. Record and enum
//! schemas are shared behind `Arc` so a descriptor is cheap to clone.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::typed::Typed;
use crate::union::DisambiguationTable;

// ──────────────────────────────────────────────
// Descriptors
// ──────────────────────────────────────────────

/// A concrete type descriptor.
#[derive(Debug, Clone)]
pub enum TypeDesc {
    Bool,
    Int,
    Float,
    Text,
    Decimal,
    DateTime,
    Date,
    Duration,
    /// Enumeration that travels on the wire by member name.
    NamedEnum(Arc<EnumSchema>),
    /// Enumeration that travels on the wire by member value.
    ValueEnum(Arc<EnumSchema>),
    /// Raw passthrough.
    Any,
    /// A caller-registered scalar kind.
    Custom(String),
    Optional(Box<TypeDesc>),
    Sequence(Box<TypeDesc>),
    Mapping(Box<TypeDesc>, Box<TypeDesc>),
    Record(Arc<RecordSchema>),
    /// Reference to a record that was still being resolved when this
    /// descriptor was built (self or mutual recursion).
    Deferred(DeferredRecord),
    Union(Arc<UnionSchema>),
    /// External (persistence-layer) model, by model name.
    External(String),
}

impl TypeDesc {
    pub fn optional(inner: TypeDesc) -> Self {
        TypeDesc::Optional(Box::new(inner))
    }

    pub fn sequence(item: TypeDesc) -> Self {
        TypeDesc::Sequence(Box::new(item))
    }

    pub fn mapping(key: TypeDesc, value: TypeDesc) -> Self {
        TypeDesc::Mapping(Box::new(key), Box::new(value))
    }

    /// The hook kind that converts this descriptor, for scalar descriptors.
    pub fn hook_kind(&self) -> Option<HookKind> {
        let kind = match self {
            TypeDesc::Bool => HookKind::Bool,
            TypeDesc::Int => HookKind::Int,
            TypeDesc::Float => HookKind::Float,
            TypeDesc::Text => HookKind::Text,
            TypeDesc::Decimal => HookKind::Decimal,
            TypeDesc::DateTime => HookKind::DateTime,
            TypeDesc::Date => HookKind::Date,
            TypeDesc::Duration => HookKind::Duration,
            TypeDesc::NamedEnum(_) => HookKind::NamedEnum,
            TypeDesc::ValueEnum(_) => HookKind::ValueEnum,
            TypeDesc::Any => HookKind::Any,
            TypeDesc::Custom(name) => HookKind::Custom(name.clone()),
            _ => return None,
        };
        Some(kind)
    }

    /// The record schema behind a `Record` or a bound `Deferred` descriptor.
    pub fn record_schema(&self) -> Option<&Arc<RecordSchema>> {
        match self {
            TypeDesc::Record(schema) => Some(schema),
            TypeDesc::Deferred(deferred) => deferred.get(),
            _ => None,
        }
    }

    /// The record or model name a member of a union is known by.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            TypeDesc::Record(schema) => Some(&schema.name),
            TypeDesc::Deferred(deferred) => Some(&deferred.name),
            TypeDesc::External(model) => Some(model),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "Bool"),
            TypeDesc::Int => write!(f, "Int"),
            TypeDesc::Float => write!(f, "Float"),
            TypeDesc::Text => write!(f, "Text"),
            TypeDesc::Decimal => write!(f, "Decimal"),
            TypeDesc::DateTime => write!(f, "DateTime"),
            TypeDesc::Date => write!(f, "Date"),
            TypeDesc::Duration => write!(f, "Duration"),
            TypeDesc::NamedEnum(e) | TypeDesc::ValueEnum(e) => write!(f, "{}", e.name),
            TypeDesc::Any => write!(f, "Any"),
            TypeDesc::Custom(name) => write!(f, "{}", name),
            TypeDesc::Optional(inner) => write!(f, "Optional[{}]", inner),
            TypeDesc::Sequence(item) => write!(f, "List[{}]", item),
            TypeDesc::Mapping(k, v) => write!(f, "Map[{}, {}]", k, v),
            TypeDesc::Record(schema) => write!(f, "{}", schema.name),
            TypeDesc::Deferred(deferred) => write!(f, "{}", deferred.name),
            TypeDesc::Union(union) => write!(f, "{}", union.name()),
            TypeDesc::External(model) => write!(f, "{}", model),
        }
    }
}

/// Key of the hook registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookKind {
    Bool,
    Int,
    Float,
    Text,
    Decimal,
    DateTime,
    Date,
    Duration,
    NamedEnum,
    ValueEnum,
    Any,
    Custom(String),
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Custom(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

// ──────────────────────────────────────────────
// Enumerations
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: serde_json::Value,
}

/// Members of an enumeration, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub members: Vec<EnumMember>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.members.push(EnumMember {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn by_name(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn by_value(&self, value: &serde_json::Value) -> Option<&EnumMember> {
        self.members.iter().find(|m| &m.value == value)
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// Whether a record field may be absent from the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Required,
    /// Absent means empty (`Typed::Null`).
    Optional,
    /// Absent means this value.
    Default(Typed),
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub ty: TypeDesc,
    pub presence: Presence,
}

/// The resolved, immutable field layout of one record type.
#[derive(Debug)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> BTreeSet<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// A record reference bound after its target finishes resolving.
///
/// A self-referential schema owns itself through this slot and is never
/// freed; schemas are meant to live as long as the process.
#[derive(Clone)]
pub struct DeferredRecord {
    pub name: String,
    pub(crate) slot: Arc<OnceLock<Arc<RecordSchema>>>,
}

impl DeferredRecord {
    pub fn get(&self) -> Option<&Arc<RecordSchema>> {
        self.slot.get()
    }
}

// Schemas may be cyclic through this reference, so only the name is printed.
impl fmt::Debug for DeferredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRecord")
            .field("name", &self.name)
            .field("bound", &self.slot.get().is_some())
            .finish()
    }
}

// ──────────────────────────────────────────────
// Unions
// ──────────────────────────────────────────────

/// A union resolved by the shape of its input.
///
/// The disambiguation table is built on first successful use and cached
/// here, next to the union site it belongs to.
pub struct UnionSchema {
    pub members: Vec<TypeDesc>,
    pub(crate) table: OnceLock<Arc<DisambiguationTable>>,
}

impl UnionSchema {
    pub fn new(members: Vec<TypeDesc>) -> Self {
        Self {
            members,
            table: OnceLock::new(),
        }
    }

    /// `Union[A, B, ...]` in declaration order.
    pub fn name(&self) -> String {
        let members: Vec<String> = self.members.iter().map(|m| m.to_string()).collect();
        format!("Union[{}]", members.join(", "))
    }

    /// The member a typed value was built from, matched by record/model name.
    pub fn member_for(&self, typed: &Typed) -> Option<&TypeDesc> {
        let name = typed.schema_name()?;
        self.members
            .iter()
            .find(|m| m.member_name() == Some(name))
    }
}

impl fmt::Debug for UnionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionSchema")
            .field("members", &self.members)
            .field("table_built", &self.table.get().is_some())
            .finish()
    }
}
