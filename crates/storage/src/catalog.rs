//! In-memory [`ModelCatalog`].
//!
//! Models are registered up front; instances are plain field maps. To-many
//! relations are "not loaded" until a value is assigned on construction or
//! through [`MemoryCatalog::load_relation`], mirroring a store where related
//! rows are fetched on demand.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use recast_core::{
    ExternalError, ExternalInstance, Fetched, FieldMeta, ModelCatalog, ModelMeta, RelationKind,
    Typed,
};

use crate::error::StorageError;

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    models: HashMap<String, Arc<ModelMeta>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Names must be unique.
    pub fn register(&mut self, meta: ModelMeta) -> Result<(), StorageError> {
        if self.models.contains_key(&meta.name) {
            return Err(StorageError::AlreadyRegistered { model: meta.name });
        }
        tracing::debug!(model = %meta.name, fields = meta.fields.len(), "model registered");
        self.models.insert(meta.name.clone(), Arc::new(meta));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_model(mut self, meta: ModelMeta) -> Result<Self, StorageError> {
        self.register(meta)?;
        Ok(self)
    }

    /// Registered model names, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every relation refers to a registered model.
    pub fn validate(&self) -> Result<(), StorageError> {
        for meta in self.models.values() {
            for field in &meta.fields {
                if let Some(related) = field.relation.related_model() {
                    if !self.models.contains_key(related) {
                        return Err(StorageError::DanglingRelation {
                            model: meta.name.clone(),
                            field: field.name.clone(),
                            related: related.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn model(&self, model: &str) -> Result<&Arc<ModelMeta>, StorageError> {
        self.models
            .get(model)
            .ok_or_else(|| StorageError::ModelNotFound {
                model: model.to_string(),
            })
    }

    fn field<'m>(meta: &'m ModelMeta, field: &str) -> Result<&'m FieldMeta, StorageError> {
        meta.get(field).ok_or_else(|| StorageError::FieldNotFound {
            model: meta.name.clone(),
            field: field.to_string(),
        })
    }

    /// Build a new (not persisted) instance from field values.
    pub fn instance<K>(
        &self,
        model: &str,
        values: impl IntoIterator<Item = (K, Typed)>,
    ) -> Result<ExternalInstance, StorageError>
    where
        K: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.build(model, values, false)
    }

    fn build(
        &self,
        model: &str,
        values: BTreeMap<String, Typed>,
        persisted: bool,
    ) -> Result<ExternalInstance, StorageError> {
        let meta = self.model(model)?;
        for name in values.keys() {
            let field = Self::field(meta, name)?;
            if matches!(field.relation, RelationKind::ToManyBackward { .. }) {
                return Err(StorageError::BackwardAssignment {
                    model: model.to_string(),
                    field: name.clone(),
                });
            }
        }

        let mut fields = values;
        for field in &meta.fields {
            if !field.relation.is_to_many() {
                fields.entry(field.name.clone()).or_insert(Typed::Null);
            }
        }
        Ok(ExternalInstance {
            model: model.to_string(),
            fields,
            persisted,
        })
    }

    /// Attach fetched related instances to a to-many relation.
    pub fn load_relation(
        &self,
        instance: &mut ExternalInstance,
        field: &str,
        related: Vec<ExternalInstance>,
    ) -> Result<(), StorageError> {
        let meta = self.model(&instance.model)?;
        let meta_field = Self::field(meta, field)?;
        if !meta_field.relation.is_to_many() {
            return Err(StorageError::NotToMany {
                model: instance.model.clone(),
                field: field.to_string(),
            });
        }
        let items = related
            .into_iter()
            .map(|mut r| {
                r.persisted = true;
                Typed::External(r)
            })
            .collect();
        instance.fields.insert(field.to_string(), Typed::List(items));
        Ok(())
    }
}

impl ModelCatalog for MemoryCatalog {
    fn meta(&self, model: &str) -> Result<Arc<ModelMeta>, ExternalError> {
        Ok(Arc::clone(self.model(model)?))
    }

    fn construct(
        &self,
        model: &str,
        values: BTreeMap<String, Typed>,
        persisted: bool,
    ) -> Result<ExternalInstance, ExternalError> {
        Ok(self.build(model, values, persisted)?)
    }

    fn fetch(
        &self,
        instance: &ExternalInstance,
        field: &FieldMeta,
    ) -> Result<Fetched, ExternalError> {
        let meta = self.model(&instance.model)?;
        Self::field(meta, &field.name)?;
        let fetched = match instance.fields.get(&field.name) {
            Some(value) => Fetched::Loaded(value.clone()),
            None if field.relation.is_to_many() => Fetched::NotLoaded,
            None => Fetched::Loaded(Typed::Null),
        };
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_core::FieldKind;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with_model(
                ModelMeta::new("Customer")
                    .field(FieldMeta::generated_pk("id"))
                    .field(FieldMeta::data("name", FieldKind::Other))
                    .field(FieldMeta::relation(
                        "orders",
                        RelationKind::ToManyBackward {
                            model: "Order".to_string(),
                        },
                    )),
            )
            .unwrap()
            .with_model(
                ModelMeta::new("Order")
                    .field(FieldMeta::generated_pk("id"))
                    .field(FieldMeta::data("paid", FieldKind::Bool).nullable())
                    .field(FieldMeta::relation(
                        "customer",
                        RelationKind::ToOne {
                            model: "Customer".to_string(),
                        },
                    )),
            )
            .unwrap()
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut catalog = catalog();
        let err = catalog.register(ModelMeta::new("Order")).unwrap_err();
        assert_eq!(
            err,
            StorageError::AlreadyRegistered {
                model: "Order".to_string()
            }
        );
        assert_eq!(catalog.models(), ["Customer", "Order"]);
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn validate_finds_dangling_relations() {
        let catalog = MemoryCatalog::new()
            .with_model(ModelMeta::new("Order").field(FieldMeta::relation(
                "customer",
                RelationKind::ToOne {
                    model: "Customer".to_string(),
                },
            )))
            .unwrap();
        assert!(matches!(
            catalog.validate(),
            Err(StorageError::DanglingRelation { .. })
        ));
    }

    #[test]
    fn instances_fill_absent_fields_with_null() {
        let catalog = catalog();
        let order = catalog
            .instance("Order", [("paid", Typed::Bool(true))])
            .unwrap();
        assert!(!order.persisted);
        assert_eq!(order.get("paid"), Some(&Typed::Bool(true)));
        assert_eq!(order.get("id"), Some(&Typed::Null));
        assert_eq!(order.get("customer"), Some(&Typed::Null));

        let customer = catalog.instance("Customer", Vec::<(String, Typed)>::new()).unwrap();
        assert!(customer.get("orders").is_none(), "to-many relations stay unloaded");
    }

    #[test]
    fn construction_rejects_unknown_and_backward_fields() {
        let catalog = catalog();
        assert!(matches!(
            catalog.instance("Order", [("missing", Typed::Null)]),
            Err(StorageError::FieldNotFound { .. })
        ));
        assert!(matches!(
            catalog.instance("Customer", [("orders", Typed::List(vec![]))]),
            Err(StorageError::BackwardAssignment { .. })
        ));
        assert!(matches!(
            catalog.instance("Invoice", Vec::<(String, Typed)>::new()),
            Err(StorageError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn fetch_reports_unloaded_relations() {
        let catalog = catalog();
        let mut customer = catalog
            .instance("Customer", [("name", Typed::Raw(serde_json::json!("Ada")))])
            .unwrap();
        let meta = catalog.meta("Customer").unwrap();
        let orders = meta.get("orders").unwrap();
        assert_eq!(catalog.fetch(&customer, orders).unwrap(), Fetched::NotLoaded);

        let order = catalog.instance("Order", [("paid", Typed::Bool(false))]).unwrap();
        catalog
            .load_relation(&mut customer, "orders", vec![order])
            .unwrap();
        match catalog.fetch(&customer, orders).unwrap() {
            Fetched::Loaded(Typed::List(items)) => {
                assert_eq!(items.len(), 1);
                assert!(items[0].as_external().unwrap().persisted);
            }
            other => panic!("expected a loaded list, got {:?}", other),
        }
        assert!(matches!(
            catalog.load_relation(&mut customer, "name", vec![]),
            Err(StorageError::NotToMany { .. })
        ));
    }
}
