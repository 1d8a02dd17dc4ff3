//! External-record collaborator interface.
//!
//! External records are model types whose construction and inspection are
//! delegated to a persistence layer. The engine only ever talks to that layer
//! through [`ModelCatalog`]; an in-memory implementation lives in the
//! `recast-storage` crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ExternalError;
use crate::typed::{ExternalInstance, Typed};
use crate::types::{EnumSchema, TypeDesc};

// ──────────────────────────────────────────────
// Field metadata
// ──────────────────────────────────────────────

/// The data kind of an external model field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Bool,
    Decimal,
    /// `auto_now_add` fields are filled by the store and may be omitted.
    DateTime { auto_now_add: bool },
    Date,
    Duration,
    NamedEnum(Arc<EnumSchema>),
    ValueEnum(Arc<EnumSchema>),
    /// Anything else: passed through raw in both directions.
    Other,
}

impl FieldKind {
    /// The descriptor the hook table converts this kind with, if any.
    pub fn descriptor(&self) -> Option<TypeDesc> {
        match self {
            FieldKind::Bool => Some(TypeDesc::Bool),
            FieldKind::Decimal => Some(TypeDesc::Decimal),
            FieldKind::DateTime { .. } => Some(TypeDesc::DateTime),
            FieldKind::Date => Some(TypeDesc::Date),
            FieldKind::Duration => Some(TypeDesc::Duration),
            FieldKind::NamedEnum(e) => Some(TypeDesc::NamedEnum(Arc::clone(e))),
            FieldKind::ValueEnum(e) => Some(TypeDesc::ValueEnum(Arc::clone(e))),
            FieldKind::Other => None,
        }
    }
}

/// How a field relates to another model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    None,
    ToOne { model: String },
    ToManyForward { model: String },
    /// The reverse side of another model's relation. Never assigned on
    /// construction.
    ToManyBackward { model: String },
}

impl RelationKind {
    pub fn is_relation(&self) -> bool {
        !matches!(self, RelationKind::None)
    }

    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            RelationKind::ToManyForward { .. } | RelationKind::ToManyBackward { .. }
        )
    }

    pub fn related_model(&self) -> Option<&str> {
        match self {
            RelationKind::None => None,
            RelationKind::ToOne { model }
            | RelationKind::ToManyForward { model }
            | RelationKind::ToManyBackward { model } => Some(model),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub relation: RelationKind,
    pub primary_key: bool,
    pub generated: bool,
}

impl FieldMeta {
    /// A non-nullable data field.
    pub fn data(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            relation: RelationKind::None,
            primary_key: false,
            generated: false,
        }
    }

    /// A store-generated integer primary key.
    pub fn generated_pk(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            generated: true,
            ..Self::data(name, FieldKind::Other)
        }
    }

    pub fn relation(name: impl Into<String>, relation: RelationKind) -> Self {
        Self {
            nullable: !relation.is_to_many(),
            relation,
            ..Self::data(name, FieldKind::Other)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_auto_now_add(&self) -> bool {
        matches!(self.kind, FieldKind::DateTime { auto_now_add: true })
    }
}

/// Field layout of one external model, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMeta {
    pub name: String,
    pub fields: Vec<FieldMeta>,
}

impl ModelMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ──────────────────────────────────────────────
// Collaborator trait
// ──────────────────────────────────────────────

/// Result of reading one field of an external instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Loaded(Typed),
    /// The value was never fetched from the store. Not an error.
    NotLoaded,
}

/// Construction and inspection of external model instances.
///
/// Implementations must be shareable across threads: a converter holding a
/// catalog is used concurrently once setup is complete.
pub trait ModelCatalog: Send + Sync {
    /// Field metadata for `model`.
    fn meta(&self, model: &str) -> Result<Arc<ModelMeta>, ExternalError>;

    /// Build an instance from already-structured field values.
    fn construct(
        &self,
        model: &str,
        values: BTreeMap<String, Typed>,
        persisted: bool,
    ) -> Result<ExternalInstance, ExternalError>;

    /// Read one field of an instance.
    fn fetch(&self, instance: &ExternalInstance, field: &FieldMeta)
        -> Result<Fetched, ExternalError>;
}
