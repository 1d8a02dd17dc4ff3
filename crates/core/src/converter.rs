//! The converter facade.
//!
//! A [`Converter`] owns everything a conversion needs: the hook registry,
//! the type resolver, the disambiguation strategy chain, the configuration
//! and an optional external-model catalog. Setup methods take `&mut self`;
//! conversions take `&self`, so once setup is done a converter can be shared
//! across threads behind an `Arc`.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::config::ConverterConfig;
use crate::error::{HookError, ResolveError, StructureError, UnstructureError};
use crate::external::ModelCatalog;
use crate::hooks::HookRegistry;
use crate::resolve::{RecordDecl, TypeExpr, TypeLookup, TypeResolver};
use crate::structure::Structurer;
use crate::typed::Typed;
use crate::types::{HookKind, TypeDesc};
use crate::union::{DisambiguationStrategy, StrategyChain};
use crate::unstructure::Unstructurer;

/// Source of catalog identities; unique for the life of the process.
static NEXT_CATALOG_ID: AtomicU64 = AtomicU64::new(1);

pub struct Converter {
    config: ConverterConfig,
    hooks: HookRegistry,
    resolver: TypeResolver,
    strategies: StrategyChain,
    catalog: Option<Arc<dyn ModelCatalog>>,
    catalog_id: Option<u64>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// A converter with the built-in hooks and default configuration.
    pub fn new() -> Self {
        Self::with_config(ConverterConfig::default())
    }

    pub fn with_config(config: ConverterConfig) -> Self {
        Self {
            config,
            hooks: HookRegistry::with_builtins(),
            resolver: TypeResolver::new(),
            strategies: StrategyChain::default(),
            catalog: None,
            catalog_id: None,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    // ──────────────────────────────────────────────
    // Setup
    // ──────────────────────────────────────────────

    /// Register (or replace) the hook pair for `kind`.
    pub fn register_hook<S, U>(&mut self, kind: HookKind, structure: S, unstructure: U)
    where
        S: Fn(&Value, &TypeDesc) -> Result<Typed, HookError> + Send + Sync + 'static,
        U: Fn(&Typed, &TypeDesc) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.hooks.register(kind, structure, unstructure);
    }

    pub fn declare(&mut self, decl: RecordDecl) -> Result<(), ResolveError> {
        self.resolver.declare(decl)
    }

    pub fn add_lookup(&mut self, lookup: impl TypeLookup + 'static) {
        self.resolver.add_lookup(lookup);
    }

    /// Append a disambiguation strategy after the built-in ones.
    pub fn add_strategy(&mut self, strategy: Arc<dyn DisambiguationStrategy>) {
        self.strategies.push(strategy);
    }

    /// Set or replace the external-model catalog. Union tables cached from a
    /// previous catalog are not reused with the new one.
    pub fn set_catalog(&mut self, catalog: Arc<dyn ModelCatalog>) {
        self.catalog = Some(catalog);
        self.catalog_id = Some(NEXT_CATALOG_ID.fetch_add(1, Ordering::Relaxed));
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ModelCatalog>) -> Self {
        self.set_catalog(catalog);
        self
    }

    /// Resolve a type expression and validate every union reachable from it.
    ///
    /// Unions over external models are validated against the catalog, so
    /// set the catalog before resolving them.
    pub fn resolve(&mut self, expr: &TypeExpr) -> Result<TypeDesc, ResolveError> {
        let desc = self.resolver.resolve(expr)?;
        let mut visited = HashSet::new();
        self.validate_unions(&desc, "top-level type", &mut visited)?;
        Ok(desc)
    }

    /// The descriptor of a declared record.
    pub fn record(&mut self, name: &str) -> Result<TypeDesc, ResolveError> {
        self.resolve(&TypeExpr::named(name))
    }

    fn validate_unions(
        &self,
        desc: &TypeDesc,
        owner: &str,
        visited: &mut HashSet<String>,
    ) -> Result<(), ResolveError> {
        match desc {
            TypeDesc::Optional(inner) | TypeDesc::Sequence(inner) => {
                self.validate_unions(inner, owner, visited)
            }
            TypeDesc::Mapping(key, val) => {
                self.validate_unions(key, owner, visited)?;
                self.validate_unions(val, owner, visited)
            }
            TypeDesc::Record(_) | TypeDesc::Deferred(_) => {
                let schema = match desc.record_schema() {
                    Some(schema) => schema,
                    None => return Ok(()),
                };
                if !visited.insert(schema.name.clone()) {
                    return Ok(());
                }
                for field in &schema.fields {
                    self.validate_unions(&field.ty, &schema.name, visited)?;
                }
                Ok(())
            }
            TypeDesc::Union(union) => {
                self.strategies
                    .table_for(union, self.catalog.as_deref(), self.catalog_id)
                    .map_err(|source| ResolveError::InvalidUnion {
                        owner: owner.to_string(),
                        source,
                    })?;
                for member in &union.members {
                    self.validate_unions(member, owner, visited)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ──────────────────────────────────────────────
    // Conversion
    // ──────────────────────────────────────────────

    /// Dynamic data → typed value.
    pub fn structure(&self, value: &Value, desc: &TypeDesc) -> Result<Typed, StructureError> {
        Structurer::new(
            &self.hooks,
            &self.strategies,
            self.catalog.as_deref(),
            self.catalog_id,
            self.config.max_depth,
        )
        .run(value, desc)
    }

    /// Typed value → dynamic data.
    pub fn unstructure(&self, typed: &Typed, desc: &TypeDesc) -> Result<Value, UnstructureError> {
        Unstructurer::new(&self.hooks, self.catalog.as_deref(), self.config.max_depth)
            .run(typed, desc)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("resolver", &self.resolver)
            .field("strategies", &self.strategies)
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn converter_is_shareable() {
        assert_send_sync::<Converter>();
    }

    #[test]
    fn invalid_unions_fail_at_resolution() {
        let mut converter = Converter::new();
        converter.declare(RecordDecl::new("A")).unwrap();
        converter.declare(RecordDecl::new("B")).unwrap();
        converter
            .declare(RecordDecl::new("Holder").required(
                "either",
                TypeExpr::Union(vec![TypeExpr::named("A"), TypeExpr::named("B")]),
            ))
            .unwrap();
        let err = converter.record("Holder").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid union in Holder: Cannot structure Union[A, B]: at least two members have no fields"
        );
    }

    #[test]
    fn custom_hooks_replace_builtins() {
        let mut converter = Converter::new();
        converter.register_hook(
            HookKind::Bool,
            |v: &Value, _: &TypeDesc| match v {
                Value::String(s) => Ok(Typed::Bool(s == "yes")),
                _ => Err(HookError::invalid("expected yes or no")),
            },
            |t: &Typed, _: &TypeDesc| {
                Ok(json!(if t.as_bool() == Some(true) { "yes" } else { "no" }))
            },
        );
        assert_eq!(
            converter.structure(&json!("yes"), &TypeDesc::Bool).unwrap(),
            Typed::Bool(true)
        );
        assert_eq!(
            converter.unstructure(&Typed::Bool(false), &TypeDesc::Bool).unwrap(),
            json!("no")
        );
    }

    #[test]
    fn custom_kinds() {
        let mut converter = Converter::new();
        converter.register_hook(
            HookKind::Custom("Upper".to_string()),
            |v: &Value, _: &TypeDesc| {
                v.as_str()
                    .map(|s| Typed::Text(s.to_uppercase()))
                    .ok_or_else(|| HookError::invalid("expected text"))
            },
            |t: &Typed, _: &TypeDesc| Ok(json!(t.as_text().unwrap_or_default())),
        );
        let desc = TypeDesc::Custom("Upper".to_string());
        assert_eq!(
            converter.structure(&json!("abc"), &desc).unwrap(),
            Typed::Text("ABC".to_string())
        );
        let err = converter
            .structure(&json!("x"), &TypeDesc::Custom("Lower".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot structure Lower: no hook registered for Lower");
    }
}
