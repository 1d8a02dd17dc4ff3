//! Hook registry: the per-kind conversion functions scalar descriptors are
//! converted with.
//!
//! A hook is a pair of functions, one per direction. Both receive the
//! descriptor being converted so enumeration hooks can reach their member
//! table. Registration happens at setup time; lookups afterward are
//! read-only and deterministic.

mod duration;
mod scalar;
mod temporal;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::HookError;
use crate::typed::Typed;
use crate::types::{HookKind, TypeDesc};

pub(crate) use scalar::{plain, plain_within};

/// Dynamic → typed conversion function.
pub type StructureFn = Arc<dyn Fn(&Value, &TypeDesc) -> Result<Typed, HookError> + Send + Sync>;

/// Typed → dynamic conversion function.
pub type UnstructureFn = Arc<dyn Fn(&Typed, &TypeDesc) -> Result<Value, HookError> + Send + Sync>;

/// One registered hook.
#[derive(Clone)]
pub struct HookEntry {
    pub kind: HookKind,
    pub structure: StructureFn,
    pub unstructure: UnstructureFn,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry").field("kind", &self.kind).finish()
    }
}

/// Kind → hook table. At most one entry per kind.
#[derive(Clone, Default)]
pub struct HookRegistry {
    entries: HashMap<HookKind, HookEntry>,
}

impl HookRegistry {
    /// An empty registry. Every scalar conversion fails with
    /// `UnsupportedType` until hooks are registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in hooks for every scalar kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(HookKind::Bool, scalar::structure_bool, scalar::unstructure_bool);
        registry.register(HookKind::Int, scalar::structure_int, scalar::unstructure_int);
        registry.register(HookKind::Float, scalar::structure_float, scalar::unstructure_float);
        registry.register(HookKind::Text, scalar::structure_text, scalar::unstructure_text);
        registry.register(
            HookKind::Decimal,
            scalar::structure_decimal,
            scalar::unstructure_decimal,
        );
        registry.register(
            HookKind::DateTime,
            temporal::structure_datetime,
            temporal::unstructure_datetime,
        );
        registry.register(HookKind::Date, temporal::structure_date, temporal::unstructure_date);
        registry.register(
            HookKind::Duration,
            duration::structure_duration,
            duration::unstructure_duration,
        );
        registry.register(
            HookKind::NamedEnum,
            scalar::structure_named_enum,
            scalar::unstructure_named_enum,
        );
        registry.register(
            HookKind::ValueEnum,
            scalar::structure_value_enum,
            scalar::unstructure_value_enum,
        );
        registry.register(HookKind::Any, scalar::structure_any, scalar::unstructure_any);
        registry
    }

    /// Register a hook pair for `kind`, replacing any existing entry.
    pub fn register<S, U>(&mut self, kind: HookKind, structure: S, unstructure: U)
    where
        S: Fn(&Value, &TypeDesc) -> Result<Typed, HookError> + Send + Sync + 'static,
        U: Fn(&Typed, &TypeDesc) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        let replaced = self.entries.insert(
            kind.clone(),
            HookEntry {
                kind: kind.clone(),
                structure: Arc::new(structure),
                unstructure: Arc::new(unstructure),
            },
        );
        tracing::debug!(kind = %kind, replaced = replaced.is_some(), "hook registered");
    }

    pub fn lookup(&self, kind: &HookKind) -> Option<&HookEntry> {
        self.entries.get(kind)
    }

    pub fn contains(&self, kind: &HookKind) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.entries.keys().map(|k| k.to_string()).collect();
        kinds.sort();
        f.debug_struct("HookRegistry").field("kinds", &kinds).finish()
    }
}

/// Describe a dynamic value's JSON shape for hook failure reasons.
pub(crate) fn shape(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Failure reason for a typed value handed to the wrong unstructure hook.
pub(crate) fn wrong_typed(expected: &str, got: &Typed) -> HookError {
    HookError::invalid(format!("expected {}, got {}", expected, got.type_name()))
}
