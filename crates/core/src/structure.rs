//! Structuring: dynamic data → typed values.
//!
//! The walk is driven by the descriptor. Scalars go through the hook
//! registry; composites recurse. Failures come in two shapes while walking:
//! raw faults (a hook rejected a value) and formatted [`StructureError`]s. A
//! raw fault is rewritten exactly once, at the innermost enclosing record,
//! into a message naming the record, the field's declared type and the
//! offending value. Formatted errors are never rewritten again.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{HookError, StructureError};
use crate::external::{FieldMeta, ModelCatalog, RelationKind};
use crate::hooks::{shape, HookRegistry};
use crate::typed::{display_value, ExternalInstance, RecordValue, Typed};
use crate::types::{Presence, RecordSchema, TypeDesc, UnionSchema};
use crate::union::StrategyChain;

/// A failure that has not yet reached a record boundary.
enum Fault {
    Raw(String),
    Structure(StructureError),
}

impl From<StructureError> for Fault {
    fn from(e: StructureError) -> Self {
        Fault::Structure(e)
    }
}

impl From<HookError> for Fault {
    fn from(e: HookError) -> Self {
        match e {
            HookError::Invalid(reason) => Fault::Raw(reason),
            HookError::Structure(e) => Fault::Structure(e),
            HookError::Unstructure(e) => Fault::Raw(e.to_string()),
        }
    }
}

/// Rewrite a fault raised under `field` of `owner`.
fn at_field(fault: Fault, owner: &str, field: &str, expected: &TypeDesc, raw: &Value) -> Fault {
    match fault {
        Fault::Raw(reason) => {
            tracing::trace!(owner, field, reason = %reason, "raw failure rewritten");
            Fault::Structure(StructureError::TypeMismatch {
                owner: owner.to_string(),
                expected: expected.to_string(),
                value: display_value(raw),
            })
        }
        formatted => formatted,
    }
}

/// Truthiness of a relation value: null, false, zero and empty
/// containers mean "no related instance".
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ──────────────────────────────────────────────
// Walker
// ──────────────────────────────────────────────

pub(crate) struct Structurer<'a> {
    hooks: &'a HookRegistry,
    strategies: &'a StrategyChain,
    catalog: Option<&'a dyn ModelCatalog>,
    catalog_id: Option<u64>,
    max_depth: usize,
    depth: usize,
}

impl<'a> Structurer<'a> {
    pub(crate) fn new(
        hooks: &'a HookRegistry,
        strategies: &'a StrategyChain,
        catalog: Option<&'a dyn ModelCatalog>,
        catalog_id: Option<u64>,
        max_depth: usize,
    ) -> Self {
        Self {
            hooks,
            strategies,
            catalog,
            catalog_id,
            max_depth,
            depth: 0,
        }
    }

    /// Structure `value` as `desc`. A raw fault with no enclosing record is
    /// reported against `desc` itself.
    pub(crate) fn run(mut self, value: &Value, desc: &TypeDesc) -> Result<Typed, StructureError> {
        self.walk(value, desc).map_err(|fault| match fault {
            Fault::Raw(reason) => {
                tracing::trace!(target_type = %desc, reason = %reason, "raw failure at top level");
                StructureError::TypeMismatch {
                    owner: desc.to_string(),
                    expected: desc.to_string(),
                    value: display_value(value),
                }
            }
            Fault::Structure(e) => e,
        })
    }

    fn enter(&mut self, owner: &dyn std::fmt::Display) -> Result<(), StructureError> {
        if self.depth >= self.max_depth {
            return Err(StructureError::DepthExceeded {
                owner: owner.to_string(),
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn walk(&mut self, value: &Value, desc: &TypeDesc) -> Result<Typed, Fault> {
        match desc {
            TypeDesc::Optional(inner) => {
                if value.is_null() {
                    Ok(Typed::Null)
                } else {
                    self.walk(value, inner)
                }
            }
            TypeDesc::Sequence(item) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| Fault::Raw(format!("expected an array, got {}", shape(value))))?;
                self.enter(desc)?;
                let result = self.sequence(items, item);
                self.leave();
                result.map(Typed::List)
            }
            TypeDesc::Mapping(key, val) => {
                let object = value
                    .as_object()
                    .ok_or_else(|| Fault::Raw(format!("expected an object, got {}", shape(value))))?;
                self.enter(desc)?;
                let result = self.mapping(object, key, val);
                self.leave();
                result.map(Typed::Map)
            }
            TypeDesc::Record(schema) => self.record(value, schema),
            TypeDesc::Deferred(deferred) => {
                let schema = deferred.get().ok_or_else(|| {
                    Fault::Raw(format!("record {} is not resolved", deferred.name))
                })?;
                self.record(value, schema)
            }
            TypeDesc::Union(union) => self.union(value, union),
            TypeDesc::External(model) => self.external(value, model).map(Typed::External),
            scalar => self.hook(value, scalar),
        }
    }

    fn hook(&self, value: &Value, desc: &TypeDesc) -> Result<Typed, Fault> {
        let kind = desc
            .hook_kind()
            .ok_or_else(|| Fault::Raw(format!("{} is not a scalar kind", desc)))?;
        let entry = self
            .hooks
            .lookup(&kind)
            .ok_or_else(|| StructureError::UnsupportedType {
                owner: desc.to_string(),
                kind: kind.to_string(),
            })?;
        Ok((entry.structure)(value, desc)?)
    }

    fn sequence(&mut self, items: &[Value], item: &TypeDesc) -> Result<Vec<Typed>, Fault> {
        let mut out = Vec::with_capacity(items.len());
        for v in items {
            out.push(self.walk(v, item)?);
        }
        Ok(out)
    }

    fn mapping(
        &mut self,
        object: &Map<String, Value>,
        key: &TypeDesc,
        val: &TypeDesc,
    ) -> Result<BTreeMap<String, Typed>, Fault> {
        let mut out = BTreeMap::new();
        for (k, v) in object {
            self.walk(&Value::String(k.clone()), key)?;
            out.insert(k.clone(), self.walk(v, val)?);
        }
        Ok(out)
    }

    // ──────────────────────────────────────────────
    // Records
    // ──────────────────────────────────────────────

    fn record(&mut self, value: &Value, schema: &RecordSchema) -> Result<Typed, Fault> {
        let empty = Map::new();
        let object = match value {
            Value::Object(object) => object,
            Value::Null => &empty,
            other => {
                return Err(Fault::Raw(format!(
                    "expected an object, got {}",
                    shape(other)
                )))
            }
        };
        self.enter(&schema.name)?;
        let result = self.record_fields(object, schema);
        self.leave();
        result.map(Typed::Record)
    }

    fn record_fields(
        &mut self,
        object: &Map<String, Value>,
        schema: &RecordSchema,
    ) -> Result<RecordValue, Fault> {
        let mut record = RecordValue::new(schema.name.clone());
        for field in &schema.fields {
            let typed = match (object.get(&field.name), &field.presence) {
                (Some(raw), _) => self
                    .walk(raw, &field.ty)
                    .map_err(|fault| at_field(fault, &schema.name, &field.name, &field.ty, raw))?,
                (None, Presence::Optional) => Typed::Null,
                (None, Presence::Default(default)) => default.clone(),
                (None, Presence::Required) => {
                    return Err(StructureError::MissingRequiredField {
                        owner: schema.name.clone(),
                        field: field.name.clone(),
                    }
                    .into())
                }
            };
            record.fields.insert(field.name.clone(), typed);
        }
        Ok(record)
    }

    // ──────────────────────────────────────────────
    // Unions
    // ──────────────────────────────────────────────

    fn union(&mut self, value: &Value, union: &UnionSchema) -> Result<Typed, Fault> {
        let table = self.strategies.table_for(union, self.catalog, self.catalog_id)?;
        let candidate = table.resolve(value)?;
        self.enter(&candidate.name)?;
        let result = self.walk(value, &candidate.member);
        self.leave();
        result
    }

    // ──────────────────────────────────────────────
    // External records
    // ──────────────────────────────────────────────

    fn external(&mut self, value: &Value, model: &str) -> Result<ExternalInstance, Fault> {
        let catalog = self.catalog.ok_or_else(|| StructureError::UnsupportedType {
            owner: model.to_string(),
            kind: "external models (no catalog configured)".to_string(),
        })?;
        let empty = Map::new();
        let object = match value {
            Value::Object(object) => object,
            Value::Null => &empty,
            other => {
                return Err(Fault::Raw(format!(
                    "expected an object, got {}",
                    shape(other)
                )))
            }
        };
        self.enter(&model)?;
        let result = self.external_fields(object, model, catalog);
        self.leave();
        result
    }

    fn external_fields(
        &mut self,
        object: &Map<String, Value>,
        model: &str,
        catalog: &dyn ModelCatalog,
    ) -> Result<ExternalInstance, Fault> {
        let meta = catalog
            .meta(model)
            .map_err(|source| StructureError::External {
                model: model.to_string(),
                source,
            })?;

        let mut values = BTreeMap::new();
        let mut persisted = false;
        for field in &meta.fields {
            let raw = object.get(&field.name);
            let is_null = raw.map_or(true, Value::is_null);

            if field.primary_key && field.generated {
                if is_null {
                    continue;
                }
                persisted = true;
            }
            if is_null
                && !field.nullable
                && !field.is_auto_now_add()
                && !field.relation.is_to_many()
            {
                return Err(StructureError::NotNullable {
                    owner: model.to_string(),
                    field: field.name.clone(),
                }
                .into());
            }
            let raw = match raw {
                Some(raw) => raw,
                None => continue,
            };
            if let Some(typed) = self.external_field(raw, model, field)? {
                values.insert(field.name.clone(), typed);
            }
        }

        catalog
            .construct(model, values, persisted)
            .map_err(|source| {
                StructureError::External {
                    model: model.to_string(),
                    source,
                }
                .into()
            })
    }

    /// One present field of an external record; `None` when the field is
    /// never assigned on construction.
    fn external_field(
        &mut self,
        raw: &Value,
        model: &str,
        field: &FieldMeta,
    ) -> Result<Option<Typed>, Fault> {
        let typed = match &field.relation {
            RelationKind::ToManyBackward { .. } => return Ok(None),
            RelationKind::ToOne { .. } | RelationKind::ToManyForward { .. } if !truthy(raw) => {
                Typed::Null
            }
            RelationKind::ToOne { model: related } => {
                let expected = TypeDesc::External(related.clone());
                let mut instance = self
                    .external(raw, related)
                    .map_err(|fault| at_field(fault, model, &field.name, &expected, raw))?;
                instance.persisted = true;
                Typed::External(instance)
            }
            RelationKind::ToManyForward { model: related } => {
                let expected = TypeDesc::sequence(TypeDesc::External(related.clone()));
                let items = self
                    .related_many(raw, related)
                    .map_err(|fault| at_field(fault, model, &field.name, &expected, raw))?;
                Typed::List(items)
            }
            RelationKind::None => match field.kind.descriptor() {
                Some(desc) => {
                    let desc = if field.nullable {
                        TypeDesc::optional(desc)
                    } else {
                        desc
                    };
                    self.walk(raw, &desc)
                        .map_err(|fault| at_field(fault, model, &field.name, &desc, raw))?
                }
                None => Typed::Raw(raw.clone()),
            },
        };
        Ok(Some(typed))
    }

    fn related_many(&mut self, raw: &Value, related: &str) -> Result<Vec<Typed>, Fault> {
        let items = raw
            .as_array()
            .ok_or_else(|| Fault::Raw(format!("expected an array, got {}", shape(raw))))?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut instance = self.external(item, related)?;
            instance.persisted = true;
            out.push(Typed::External(instance));
        }
        Ok(out)
    }
}
