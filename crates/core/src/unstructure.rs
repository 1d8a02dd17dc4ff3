//! Unstructuring: typed values → dynamic data.
//!
//! Mirrors [`structure`](crate::structure). Unions need no disambiguation on
//! the way out: every record and external value carries the name of the
//! schema it was built from.

use serde_json::{Map, Value};

use crate::error::{HookError, UnstructureError};
use crate::external::{Fetched, FieldMeta, ModelCatalog, RelationKind};
use crate::hooks::{plain_within, HookRegistry};
use crate::typed::{display_typed, ExternalInstance, RecordValue, Typed};
use crate::types::{Presence, RecordSchema, TypeDesc, UnionSchema};

enum Fault {
    Raw(String),
    Unstructure(UnstructureError),
}

impl From<UnstructureError> for Fault {
    fn from(e: UnstructureError) -> Self {
        Fault::Unstructure(e)
    }
}

impl From<HookError> for Fault {
    fn from(e: HookError) -> Self {
        match e {
            HookError::Invalid(reason) => Fault::Raw(reason),
            HookError::Unstructure(e) => Fault::Unstructure(e),
            HookError::Structure(e) => Fault::Raw(e.to_string()),
        }
    }
}

fn at_field(fault: Fault, owner: &str, field: &str) -> Fault {
    match fault {
        Fault::Raw(reason) => {
            tracing::trace!(owner, field, reason = %reason, "raw failure rewritten");
            Fault::Unstructure(UnstructureError::Field {
                owner: owner.to_string(),
                field: field.to_string(),
                reason,
            })
        }
        formatted => formatted,
    }
}

fn expected(what: &dyn std::fmt::Display, got: &Typed) -> Fault {
    Fault::Raw(format!("expected {}, got {}", what, got.type_name()))
}

pub(crate) struct Unstructurer<'a> {
    hooks: &'a HookRegistry,
    catalog: Option<&'a dyn ModelCatalog>,
    max_depth: usize,
    depth: usize,
}

impl<'a> Unstructurer<'a> {
    pub(crate) fn new(
        hooks: &'a HookRegistry,
        catalog: Option<&'a dyn ModelCatalog>,
        max_depth: usize,
    ) -> Self {
        Self {
            hooks,
            catalog,
            max_depth,
            depth: 0,
        }
    }

    pub(crate) fn run(mut self, typed: &Typed, desc: &TypeDesc) -> Result<Value, UnstructureError> {
        self.walk(typed, desc).map_err(|fault| match fault {
            Fault::Raw(reason) => {
                tracing::trace!(target_type = %desc, reason = %reason, "raw failure at top level");
                UnstructureError::TypeMismatch {
                    expected: desc.to_string(),
                    value: display_typed(typed),
                }
            }
            Fault::Unstructure(e) => e,
        })
    }

    fn enter(&mut self, owner: &dyn std::fmt::Display) -> Result<(), UnstructureError> {
        if self.depth >= self.max_depth {
            return Err(UnstructureError::DepthExceeded {
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

    fn walk(&mut self, typed: &Typed, desc: &TypeDesc) -> Result<Value, Fault> {
        match desc {
            TypeDesc::Optional(inner) => {
                if typed.is_null() {
                    Ok(Value::Null)
                } else {
                    self.walk(typed, inner)
                }
            }
            TypeDesc::Sequence(item) => {
                let items = typed.as_list().ok_or_else(|| expected(desc, typed))?;
                self.enter(desc)?;
                let result = self.sequence(items, item);
                self.leave();
                result
            }
            TypeDesc::Mapping(_, val) => {
                let entries = match typed {
                    Typed::Map(entries) => entries,
                    other => return Err(expected(desc, other)),
                };
                self.enter(desc)?;
                let result = self.mapping(entries.iter(), val);
                self.leave();
                result
            }
            TypeDesc::Record(schema) => self.record(typed, schema),
            TypeDesc::Deferred(deferred) => {
                let schema = deferred.get().ok_or_else(|| {
                    Fault::Raw(format!("record {} is not resolved", deferred.name))
                })?;
                self.record(typed, schema)
            }
            TypeDesc::Union(union) => self.union(typed, union),
            TypeDesc::External(model) => {
                let instance = typed.as_external().ok_or_else(|| expected(desc, typed))?;
                self.external(instance, model)
            }
            scalar => self.hook(typed, scalar),
        }
    }

    fn hook(&self, typed: &Typed, desc: &TypeDesc) -> Result<Value, Fault> {
        let kind = desc
            .hook_kind()
            .ok_or_else(|| Fault::Raw(format!("{} is not a scalar kind", desc)))?;
        let entry = self
            .hooks
            .lookup(&kind)
            .ok_or_else(|| UnstructureError::UnsupportedType {
                owner: desc.to_string(),
                kind: kind.to_string(),
            })?;
        Ok((entry.unstructure)(typed, desc)?)
    }

    fn sequence(&mut self, items: &[Typed], item: &TypeDesc) -> Result<Value, Fault> {
        let mut out = Vec::with_capacity(items.len());
        for t in items {
            out.push(self.walk(t, item)?);
        }
        Ok(Value::Array(out))
    }

    fn mapping<'t>(
        &mut self,
        entries: impl Iterator<Item = (&'t String, &'t Typed)>,
        val: &TypeDesc,
    ) -> Result<Value, Fault> {
        let mut out = Map::new();
        for (k, v) in entries {
            out.insert(k.clone(), self.walk(v, val)?);
        }
        Ok(Value::Object(out))
    }

    fn record(&mut self, typed: &Typed, schema: &RecordSchema) -> Result<Value, Fault> {
        let record = match typed {
            Typed::Record(record) if record.name == schema.name => record,
            Typed::Record(other) => {
                return Err(Fault::Raw(format!(
                    "expected a {} record, got a {} record",
                    schema.name, other.name
                )))
            }
            other => return Err(expected(&schema.name, other)),
        };
        self.enter(&schema.name)?;
        let result = self.record_fields(record, schema);
        self.leave();
        result
    }

    fn record_fields(&mut self, record: &RecordValue, schema: &RecordSchema) -> Result<Value, Fault> {
        let mut out = Map::new();
        for field in &schema.fields {
            let value = match (record.get(&field.name), &field.presence) {
                (Some(t), _) => self.walk(t, &field.ty),
                (None, Presence::Optional) => Ok(Value::Null),
                (None, Presence::Default(default)) => self.walk(default, &field.ty),
                (None, Presence::Required) => {
                    return Err(UnstructureError::MissingField {
                        owner: schema.name.clone(),
                        field: field.name.clone(),
                    }
                    .into())
                }
            }
            .map_err(|fault| at_field(fault, &schema.name, &field.name))?;
            out.insert(field.name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn union(&mut self, typed: &Typed, union: &UnionSchema) -> Result<Value, Fault> {
        let member = union.member_for(typed).ok_or_else(|| {
            Fault::Raw(format!(
                "{} is not a member of {}",
                display_typed(typed),
                union.name()
            ))
        })?;
        self.walk(typed, member)
    }

    // ──────────────────────────────────────────────
    // External records
    // ──────────────────────────────────────────────

    fn external(&mut self, instance: &ExternalInstance, model: &str) -> Result<Value, Fault> {
        let catalog = self.catalog.ok_or_else(|| UnstructureError::UnsupportedType {
            owner: model.to_string(),
            kind: "external models (no catalog configured)".to_string(),
        })?;
        if instance.model != model {
            return Err(Fault::Raw(format!(
                "expected a {} instance, got a {} instance",
                model, instance.model
            )));
        }
        self.enter(&model)?;
        let result = self.external_fields(instance, catalog);
        self.leave();
        result
    }

    fn external_fields(
        &mut self,
        instance: &ExternalInstance,
        catalog: &dyn ModelCatalog,
    ) -> Result<Value, Fault> {
        let model = instance.model.as_str();
        let meta = catalog
            .meta(model)
            .map_err(|source| UnstructureError::Catalog {
                model: model.to_string(),
                source,
            })?;

        let mut out = Map::new();
        for field in &meta.fields {
            let fetched = catalog
                .fetch(instance, field)
                .map_err(|source| UnstructureError::External {
                    model: model.to_string(),
                    field: field.name.clone(),
                    source,
                })?;
            let typed = match fetched {
                Fetched::Loaded(typed) => typed,
                Fetched::NotLoaded => continue,
            };
            let value = self
                .external_field(&typed, field)
                .map_err(|fault| at_field(fault, model, &field.name))?;
            out.insert(field.name.clone(), value);
        }
        Ok(Value::Object(out))
    }

    fn external_field(&mut self, typed: &Typed, field: &FieldMeta) -> Result<Value, Fault> {
        if typed.is_null() {
            return Ok(Value::Null);
        }
        match &field.relation {
            RelationKind::ToOne { model } => {
                self.walk(typed, &TypeDesc::External(model.clone()))
            }
            RelationKind::ToManyForward { model } | RelationKind::ToManyBackward { model } => self
                .walk(typed, &TypeDesc::sequence(TypeDesc::External(model.clone()))),
            RelationKind::None => match field.kind.descriptor() {
                Some(desc) => self.walk(typed, &desc),
                None => Ok(plain_within(typed, self.max_depth.saturating_sub(self.depth))?),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{RecordDecl, TypeExpr, TypeResolver};
    use serde_json::json;
    use std::str::FromStr;

    fn unstructure(typed: &Typed, desc: &TypeDesc) -> Result<Value, UnstructureError> {
        let hooks = HookRegistry::with_builtins();
        Unstructurer::new(&hooks, None, 64).run(typed, desc)
    }

    fn point() -> TypeDesc {
        let mut resolver = TypeResolver::new();
        resolver
            .declare(
                RecordDecl::new("Point")
                    .required("x", TypeExpr::Int)
                    .optional("label", TypeExpr::optional(TypeExpr::Text))
                    .with_default("scale", TypeExpr::Decimal, rust_decimal::Decimal::ONE),
            )
            .unwrap();
        TypeDesc::Record(resolver.record("Point").unwrap())
    }

    #[test]
    fn record_emits_every_field() {
        let typed = Typed::Record(RecordValue::new("Point").with("x", 3i64));
        assert_eq!(
            unstructure(&typed, &point()).unwrap(),
            json!({"x": 3, "label": null, "scale": "1"})
        );
    }

    #[test]
    fn absent_required_field_fails() {
        let typed = Typed::Record(RecordValue::new("Point").with("label", "p"));
        let err = unstructure(&typed, &point()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot unstructure Point: missing field 'x'");
    }

    #[test]
    fn field_failures_name_the_field() {
        let typed = Typed::Record(RecordValue::new("Point").with("x", "three"));
        let err = unstructure(&typed, &point()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot unstructure Point: field 'x' expected Int, got Text"
        );
    }

    #[test]
    fn containers() {
        let desc = TypeDesc::mapping(TypeDesc::Text, TypeDesc::sequence(TypeDesc::Decimal));
        let typed = Typed::Map(
            [(
                "prices".to_string(),
                Typed::List(vec![Typed::Decimal(
                    rust_decimal::Decimal::from_str("1.23").unwrap(),
                )]),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(unstructure(&typed, &desc).unwrap(), json!({"prices": ["1.23"]}));
        let err = unstructure(&Typed::Int(1), &desc).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot unstructure Map[Text, List[Decimal]]: 1 is not an instance of Map[Text, List[Decimal]]"
        );
    }

    #[test]
    fn optional_null() {
        assert_eq!(
            unstructure(&Typed::Null, &TypeDesc::optional(TypeDesc::Int)).unwrap(),
            Value::Null
        );
    }
}
