//! Schema resolution: record declarations → immutable descriptors.
//!
//! Declarations name their field types with [`TypeExpr`], which may refer to
//! other types by name. The resolver binds every name before any conversion
//! runs, in this order:
//!
//! 1. record schemas already resolved (cached per record name)
//! 2. records declared with [`TypeResolver::declare`], finalized on demand
//! 3. injected [`TypeLookup`]s, in registration order
//!
//! A reference to a record that is still being finalized (a record that
//! contains itself, directly or through another record) resolves to
//! [`TypeDesc::Deferred`], bound as soon as the target finishes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::ResolveError;
use crate::typed::Typed;
use crate::types::{
    DeferredRecord, EnumSchema, FieldSchema, Presence, RecordSchema, TypeDesc, UnionSchema,
};

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

/// An unresolved type expression.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Bool,
    Int,
    Float,
    Text,
    Decimal,
    DateTime,
    Date,
    Duration,
    Any,
    Custom(String),
    /// Reference to a record or looked-up type by name.
    Named(String),
    Optional(Box<TypeExpr>),
    List(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    External(String),
    /// An already-built descriptor, used as-is.
    Resolved(TypeDesc),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    pub fn list(item: TypeExpr) -> Self {
        TypeExpr::List(Box::new(item))
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map(Box::new(key), Box::new(value))
    }

    pub fn external(model: impl Into<String>) -> Self {
        TypeExpr::External(model.into())
    }

    pub fn named_enum(schema: EnumSchema) -> Self {
        TypeExpr::Resolved(TypeDesc::NamedEnum(Arc::new(schema)))
    }

    pub fn value_enum(schema: EnumSchema) -> Self {
        TypeExpr::Resolved(TypeDesc::ValueEnum(Arc::new(schema)))
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub presence: Presence,
}

/// A mutable record declaration, finalized into a [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn required(self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.field(name, ty, Presence::Required)
    }

    /// A field that may be absent; absent means `Typed::Null`.
    pub fn optional(self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.field(name, ty, Presence::Optional)
    }

    /// A field that may be absent; absent means `default`.
    pub fn with_default(
        self,
        name: impl Into<String>,
        ty: TypeExpr,
        default: impl Into<Typed>,
    ) -> Self {
        self.field(name, ty, Presence::Default(default.into()))
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeExpr, presence: Presence) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            presence,
        });
        self
    }

    fn duplicate_field(&self) -> Option<&str> {
        let mut seen = BTreeSet::new();
        self.fields
            .iter()
            .find(|f| !seen.insert(f.name.as_str()))
            .map(|f| f.name.as_str())
    }
}

// ──────────────────────────────────────────────
// Lookups
// ──────────────────────────────────────────────

/// Name → descriptor lookup consulted after declared records.
pub trait TypeLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<TypeDesc>;
}

impl<F> TypeLookup for F
where
    F: Fn(&str) -> Option<TypeDesc> + Send + Sync,
{
    fn lookup(&self, name: &str) -> Option<TypeDesc> {
        self(name)
    }
}

/// A fixed table of named descriptors.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    entries: HashMap<String, TypeDesc>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, desc: TypeDesc) -> Self {
        self.entries.insert(name.into(), desc);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, desc: TypeDesc) {
        self.entries.insert(name.into(), desc);
    }
}

impl TypeLookup for TypeTable {
    fn lookup(&self, name: &str) -> Option<TypeDesc> {
        self.entries.get(name).cloned()
    }
}

// ──────────────────────────────────────────────
// Resolver
// ──────────────────────────────────────────────

const TOP_LEVEL: &str = "top-level type";

#[derive(Default)]
pub struct TypeResolver {
    decls: BTreeMap<String, RecordDecl>,
    schemas: HashMap<String, Arc<RecordSchema>>,
    slots: HashMap<String, Arc<OnceLock<Arc<RecordSchema>>>>,
    in_progress: Vec<String>,
    lookups: Vec<Box<dyn TypeLookup>>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record declaration. Names must be unique, and so must the
    /// field names within a declaration.
    pub fn declare(&mut self, decl: RecordDecl) -> Result<(), ResolveError> {
        if self.decls.contains_key(&decl.name) || self.schemas.contains_key(&decl.name) {
            return Err(ResolveError::DuplicateRecord(decl.name));
        }
        if let Some(field) = decl.duplicate_field() {
            return Err(ResolveError::DuplicateField {
                record: decl.name.clone(),
                field: field.to_string(),
            });
        }
        self.decls.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn add_lookup(&mut self, lookup: impl TypeLookup + 'static) {
        self.lookups.push(Box::new(lookup));
    }

    /// Resolve a type expression into a descriptor.
    pub fn resolve(&mut self, expr: &TypeExpr) -> Result<TypeDesc, ResolveError> {
        self.resolve_in(expr, TOP_LEVEL)
    }

    /// The schema of a declared record, finalizing it if needed.
    pub fn record(&mut self, name: &str) -> Result<Arc<RecordSchema>, ResolveError> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.decls.contains_key(name) {
            return self.finalize(name);
        }
        Err(ResolveError::UnknownType {
            name: name.to_string(),
            owner: TOP_LEVEL.to_string(),
        })
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    fn resolve_in(&mut self, expr: &TypeExpr, owner: &str) -> Result<TypeDesc, ResolveError> {
        let desc = match expr {
            TypeExpr::Bool => TypeDesc::Bool,
            TypeExpr::Int => TypeDesc::Int,
            TypeExpr::Float => TypeDesc::Float,
            TypeExpr::Text => TypeDesc::Text,
            TypeExpr::Decimal => TypeDesc::Decimal,
            TypeExpr::DateTime => TypeDesc::DateTime,
            TypeExpr::Date => TypeDesc::Date,
            TypeExpr::Duration => TypeDesc::Duration,
            TypeExpr::Any => TypeDesc::Any,
            TypeExpr::Custom(name) => TypeDesc::Custom(name.clone()),
            TypeExpr::Named(name) => self.resolve_name(name, owner)?,
            TypeExpr::Optional(inner) => TypeDesc::optional(self.resolve_in(inner, owner)?),
            TypeExpr::List(item) => TypeDesc::sequence(self.resolve_in(item, owner)?),
            TypeExpr::Map(key, value) => TypeDesc::mapping(
                self.resolve_in(key, owner)?,
                self.resolve_in(value, owner)?,
            ),
            TypeExpr::Union(members) => {
                let members = members
                    .iter()
                    .map(|m| self.resolve_in(m, owner))
                    .collect::<Result<Vec<_>, _>>()?;
                TypeDesc::Union(Arc::new(UnionSchema::new(members)))
            }
            TypeExpr::External(model) => TypeDesc::External(model.clone()),
            TypeExpr::Resolved(desc) => desc.clone(),
        };
        Ok(desc)
    }

    fn resolve_name(&mut self, name: &str, owner: &str) -> Result<TypeDesc, ResolveError> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(TypeDesc::Record(Arc::clone(schema)));
        }
        if self.in_progress.iter().any(|n| n == name) {
            let slot = self.slots.entry(name.to_string()).or_default();
            return Ok(TypeDesc::Deferred(DeferredRecord {
                name: name.to_string(),
                slot: Arc::clone(slot),
            }));
        }
        if self.decls.contains_key(name) {
            return self.finalize(name).map(TypeDesc::Record);
        }
        self.lookups
            .iter()
            .find_map(|l| l.lookup(name))
            .ok_or_else(|| ResolveError::UnknownType {
                name: name.to_string(),
                owner: owner.to_string(),
            })
    }

    fn finalize(&mut self, name: &str) -> Result<Arc<RecordSchema>, ResolveError> {
        let decl = self
            .decls
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownType {
                name: name.to_string(),
                owner: TOP_LEVEL.to_string(),
            })?;

        self.in_progress.push(decl.name.clone());
        let fields = self.resolve_fields(&decl);
        self.in_progress.pop();
        let fields = fields?;

        let schema = Arc::new(RecordSchema {
            name: decl.name.clone(),
            fields,
        });
        if let Some(slot) = self.slots.remove(&decl.name) {
            // A slot is only ever filled here, once per record name.
            let _ = slot.set(Arc::clone(&schema));
        }
        self.schemas.insert(decl.name.clone(), Arc::clone(&schema));
        tracing::debug!(
            record = %decl.name,
            fields = schema.fields.len(),
            "record schema finalized"
        );
        Ok(schema)
    }

    fn resolve_fields(&mut self, decl: &RecordDecl) -> Result<Vec<FieldSchema>, ResolveError> {
        let mut fields = Vec::with_capacity(decl.fields.len());
        for f in &decl.fields {
            let mut ty = self.resolve_in(&f.ty, &decl.name)?;
            // An optional field may also be null.
            if f.presence == Presence::Optional && !matches!(ty, TypeDesc::Optional(_)) {
                ty = TypeDesc::optional(ty);
            }
            fields.push(FieldSchema {
                name: f.name.clone(),
                ty,
                presence: f.presence.clone(),
            });
        }
        Ok(fields)
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("declared", &self.decls.keys().collect::<Vec<_>>())
            .field("resolved", &self.schemas.len())
            .field("lookups", &self.lookups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_nested_declarations_on_demand() {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(RecordDecl::new("Outer").required("inner", TypeExpr::named("Inner")))
            .unwrap();
        resolver
            .declare(RecordDecl::new("Inner").required("x", TypeExpr::Int))
            .unwrap();

        let outer = resolver.record("Outer").unwrap();
        let inner = outer.field("inner").unwrap().ty.record_schema().unwrap();
        assert_eq!(inner.name, "Inner");
        assert!(
            Arc::ptr_eq(inner, &resolver.record("Inner").unwrap()),
            "schemas are cached per record name"
        );
    }

    #[test]
    fn self_reference_is_deferred_and_bound() {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(
                RecordDecl::new("Node")
                    .required("value", TypeExpr::Int)
                    .optional("next", TypeExpr::optional(TypeExpr::named("Node"))),
            )
            .unwrap();
        let node = resolver.record("Node").unwrap();
        let next = match &node.field("next").unwrap().ty {
            TypeDesc::Optional(inner) => inner.as_ref().clone(),
            other => panic!("expected Optional, got {:?}", other),
        };
        assert!(matches!(next, TypeDesc::Deferred(_)));
        let bound = next.record_schema().expect("deferred reference is bound");
        assert!(Arc::ptr_eq(bound, &node));
        assert_eq!(next.to_string(), "Node");
    }

    #[test]
    fn mutual_recursion() {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(RecordDecl::new("A").optional("b", TypeExpr::named("B")))
            .unwrap();
        resolver
            .declare(RecordDecl::new("B").optional("a", TypeExpr::named("A")))
            .unwrap();
        let a = resolver.record("A").unwrap();
        let b = optional_record(&a.field("b").unwrap().ty);
        let back = optional_record(&b.field("a").unwrap().ty);
        assert!(Arc::ptr_eq(&back, &a));
    }

    fn optional_record(ty: &TypeDesc) -> Arc<RecordSchema> {
        match ty {
            TypeDesc::Optional(inner) => inner.record_schema().unwrap().clone(),
            other => panic!("expected Optional, got {:?}", other),
        }
    }

    #[test]
    fn optional_fields_accept_null() {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(
                RecordDecl::new("Holder")
                    .optional("count", TypeExpr::Int)
                    .optional("label", TypeExpr::optional(TypeExpr::Text))
                    .required("id", TypeExpr::Int),
            )
            .unwrap();
        let holder = resolver.record("Holder").unwrap();
        assert_eq!(holder.field("count").unwrap().ty.to_string(), "Optional[Int]");
        assert_eq!(
            holder.field("label").unwrap().ty.to_string(),
            "Optional[Text]",
            "already optional types are not wrapped twice"
        );
        assert_eq!(holder.field("id").unwrap().ty.to_string(), "Int");
    }

    #[test]
    fn lookups_run_after_declarations() {
        let mut resolver = TypeResolver::new();
        resolver.add_lookup(TypeTable::new().with("Money", TypeDesc::Decimal));
        resolver.add_lookup(|name: &str| (name == "Stamp").then_some(TypeDesc::DateTime));
        let desc = resolver
            .resolve(&TypeExpr::map(TypeExpr::Text, TypeExpr::named("Money")))
            .unwrap();
        assert_eq!(desc.to_string(), "Map[Text, Decimal]");
        assert!(matches!(
            resolver.resolve(&TypeExpr::named("Stamp")).unwrap(),
            TypeDesc::DateTime
        ));
    }

    #[test]
    fn unknown_names_fail() {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(RecordDecl::new("Holder").required("x", TypeExpr::named("Missing")))
            .unwrap();
        assert_eq!(
            resolver.record("Holder").unwrap_err(),
            ResolveError::UnknownType {
                name: "Missing".to_string(),
                owner: "Holder".to_string(),
            }
        );
        // A failed finalization leaves no half-built state behind.
        assert!(resolver.record("Holder").is_err());
    }

    #[test]
    fn duplicates_fail_at_declaration() {
        let mut resolver = TypeResolver::new();
        resolver.declare(RecordDecl::new("A")).unwrap();
        assert_eq!(
            resolver.declare(RecordDecl::new("A")).unwrap_err(),
            ResolveError::DuplicateRecord("A".to_string())
        );
        let err = resolver
            .declare(
                RecordDecl::new("B")
                    .required("x", TypeExpr::Int)
                    .optional("x", TypeExpr::Text),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::DuplicateField {
                record: "B".to_string(),
                field: "x".to_string(),
            }
        );
    }

    #[test]
    fn unions_keep_declaration_order() {
        let mut resolver = TypeResolver::new();
        resolver.declare(RecordDecl::new("A")).unwrap();
        resolver
            .declare(RecordDecl::new("B").required("b", TypeExpr::Int))
            .unwrap();
        let desc = resolver
            .resolve(&TypeExpr::Union(vec![
                TypeExpr::named("B"),
                TypeExpr::named("A"),
            ]))
            .unwrap();
        assert_eq!(desc.to_string(), "Union[B, A]");
    }
}
