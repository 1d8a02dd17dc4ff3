//! Union disambiguation by input shape.
//!
//! A union of record-like members carries no tag on the wire. The member is
//! chosen by comparing the input mapping's keys with each member's field
//! names: candidates are ordered by field count (fewest first, ties in
//! declaration order) and the first one that declares every input key wins.
//!
//! Candidate field sets come from an ordered chain of
//! [`DisambiguationStrategy`] implementations. The first strategy that
//! recognizes the union's members supplies them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StructureError;
use crate::external::ModelCatalog;
use crate::typed::display_value;
use crate::types::{TypeDesc, UnionSchema};

/// One union member and the field names it accepts.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub member: TypeDesc,
    pub fields: BTreeSet<String>,
}

// ──────────────────────────────────────────────
// Decision table
// ──────────────────────────────────────────────

/// Candidates sorted by ascending field count.
#[derive(Debug, Clone)]
pub struct DisambiguationTable {
    union: String,
    entries: Vec<Candidate>,
    /// Set when the candidates were read from a catalog.
    from_catalog: bool,
    /// Identity of that catalog, as assigned by the converter.
    catalog_id: Option<u64>,
}

impl DisambiguationTable {
    /// Build a table for `union` from its candidates in declaration order.
    ///
    /// Fails with fewer than two candidates, or when more than one candidate
    /// has no fields (an empty input could never pick between them).
    pub fn build(union: &str, candidates: Vec<Candidate>) -> Result<Self, StructureError> {
        if candidates.len() < 2 {
            return Err(StructureError::AmbiguousUnion {
                union: union.to_string(),
                reason: "at least two members are required".to_string(),
            });
        }
        let empty = candidates.iter().filter(|c| c.fields.is_empty()).count();
        if empty > 1 {
            return Err(StructureError::AmbiguousUnion {
                union: union.to_string(),
                reason: "at least two members have no fields".to_string(),
            });
        }

        let mut entries = candidates;
        // Stable: equal sizes keep declaration order.
        entries.sort_by_key(|c| c.fields.len());
        Ok(Self {
            union: union.to_string(),
            entries,
            from_catalog: false,
            catalog_id: None,
        })
    }

    /// Pick the candidate for `input`.
    pub fn resolve(&self, input: &Value) -> Result<&Candidate, StructureError> {
        let object = input.as_object().ok_or_else(|| StructureError::AmbiguousUnion {
            union: self.union.clone(),
            reason: "only mappings are supported as input".to_string(),
        })?;

        let chosen = self
            .entries
            .iter()
            .find(|c| object.keys().all(|k| c.fields.contains(k)))
            .ok_or_else(|| StructureError::AmbiguousUnion {
                union: self.union.clone(),
                reason: format!(
                    "{} does not match any of the union members",
                    display_value(input)
                ),
            })?;
        tracing::trace!(union = %self.union, member = %chosen.name, "union member selected");
        Ok(chosen)
    }

    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }
}

// ──────────────────────────────────────────────
// Strategies
// ──────────────────────────────────────────────

/// Supplies candidates for unions whose members it recognizes.
///
/// Returns `Ok(None)` when the strategy does not apply to these members, so
/// the next strategy in the chain is consulted.
pub trait DisambiguationStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn candidates(
        &self,
        members: &[TypeDesc],
        catalog: Option<&dyn ModelCatalog>,
    ) -> Result<Option<Vec<Candidate>>, StructureError>;

    /// Whether the candidates depend on the catalog. Tables built from such
    /// candidates are only reused with the same catalog.
    fn uses_catalog(&self) -> bool {
        false
    }
}


/// Unions whose members are all records.
#[derive(Debug, Default)]
pub struct RecordStrategy;

impl DisambiguationStrategy for RecordStrategy {
    fn name(&self) -> &str {
        "record"
    }

    fn candidates(
        &self,
        members: &[TypeDesc],
        _catalog: Option<&dyn ModelCatalog>,
    ) -> Result<Option<Vec<Candidate>>, StructureError> {
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            match member.record_schema() {
                Some(schema) => out.push(Candidate {
                    name: schema.name.clone(),
                    member: member.clone(),
                    fields: schema.field_names(),
                }),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }
}

/// Unions whose members are all external models. Needs a catalog.
#[derive(Debug, Default)]
pub struct ExternalStrategy;

impl DisambiguationStrategy for ExternalStrategy {
    fn name(&self) -> &str {
        "external"
    }

    fn uses_catalog(&self) -> bool {
        true
    }

    fn candidates(
        &self,
        members: &[TypeDesc],
        catalog: Option<&dyn ModelCatalog>,
    ) -> Result<Option<Vec<Candidate>>, StructureError> {
        let catalog = match catalog {
            Some(catalog) => catalog,
            None => return Ok(None),
        };
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let model = match member {
                TypeDesc::External(model) => model,
                _ => return Ok(None),
            };
            let meta = catalog
                .meta(model)
                .map_err(|source| StructureError::External {
                    model: model.clone(),
                    source,
                })?;
            out.push(Candidate {
                name: model.clone(),
                member: member.clone(),
                fields: meta.fields.iter().map(|f| f.name.clone()).collect(),
            });
        }
        Ok(Some(out))
    }
}

/// Ordered chain of strategies; the first applicable one wins.
#[derive(Clone)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn DisambiguationStrategy>>,
}

impl Default for StrategyChain {
    fn default() -> Self {
        let record: Arc<dyn DisambiguationStrategy> = Arc::new(RecordStrategy);
        let external: Arc<dyn DisambiguationStrategy> = Arc::new(ExternalStrategy);
        Self {
            strategies: vec![record, external],
        }
    }
}

impl StrategyChain {
    /// Append a strategy after the built-in ones.
    pub fn push(&mut self, strategy: Arc<dyn DisambiguationStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The cached table of a union site, building it on first use.
    ///
    /// Failed builds are not cached: a union over external models may
    /// succeed once a catalog is configured. A cached table read from a
    /// catalog is bypassed when conversion runs against a catalog with a
    /// different `catalog_id`.
    pub fn table_for(
        &self,
        union: &UnionSchema,
        catalog: Option<&dyn ModelCatalog>,
        catalog_id: Option<u64>,
    ) -> Result<Arc<DisambiguationTable>, StructureError> {
        let cached = union.table.get();
        if let Some(table) = cached {
            if !table.from_catalog || table.catalog_id == catalog_id {
                return Ok(Arc::clone(table));
            }
        }
        let mut built = self.build_table(&union.name(), &union.members, catalog)?;
        built.catalog_id = catalog_id;
        let built = Arc::new(built);
        if cached.is_some() {
            tracing::debug!(union = %built.union, "catalog changed, table rebuilt uncached");
            return Ok(built);
        }
        Ok(Arc::clone(union.table.get_or_init(|| built)))
    }

    /// Build the decision table for a union's members.
    pub fn build_table(
        &self,
        union: &str,
        members: &[TypeDesc],
        catalog: Option<&dyn ModelCatalog>,
    ) -> Result<DisambiguationTable, StructureError> {
        for strategy in &self.strategies {
            if let Some(candidates) = strategy.candidates(members, catalog)? {
                let mut table = DisambiguationTable::build(union, candidates)?;
                table.from_catalog = strategy.uses_catalog();
                tracing::debug!(
                    union = %union,
                    strategy = strategy.name(),
                    candidates = table.entries().len(),
                    "disambiguation table built"
                );
                return Ok(table);
            }
        }
        Err(StructureError::AmbiguousUnion {
            union: union.to_string(),
            reason: "only unions of records or external models are supported".to_string(),
        })
    }
}

impl fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("StrategyChain").field("strategies", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldSchema, Presence, RecordSchema};
    use serde_json::json;

    fn record(name: &str, fields: &[&str]) -> TypeDesc {
        TypeDesc::Record(Arc::new(RecordSchema {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|f| FieldSchema {
                    name: f.to_string(),
                    ty: TypeDesc::Int,
                    presence: Presence::Optional,
                })
                .collect(),
        }))
    }

    fn table(members: &[TypeDesc]) -> Result<DisambiguationTable, StructureError> {
        StrategyChain::default().build_table("U", members, None)
    }

    #[test]
    fn fewest_fields_first_regardless_of_order() {
        let a = record("A", &["a", "b"]);
        let b = record("B", &["a", "b", "c"]);
        for members in [vec![a.clone(), b.clone()], vec![b, a]] {
            let table = table(&members).unwrap();
            assert_eq!(table.resolve(&json!({"a": 1, "b": 2})).unwrap().name, "A");
            assert_eq!(table.resolve(&json!({"c": 3})).unwrap().name, "B");
        }
    }

    #[test]
    fn ties_keep_declaration_order() {
        let table = table(&[record("First", &["x"]), record("Second", &["x"])]).unwrap();
        assert_eq!(table.resolve(&json!({"x": 1})).unwrap().name, "First");
    }

    #[test]
    fn empty_input_picks_smallest() {
        let table = table(&[record("Full", &["a"]), record("Empty", &[])]).unwrap();
        assert_eq!(table.resolve(&json!({})).unwrap().name, "Empty");
    }

    #[test]
    fn build_failures() {
        let err = table(&[record("A", &[]), record("B", &[])]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot structure U: at least two members have no fields"
        );
        let err = table(&[record("A", &["a"])]).unwrap_err();
        assert!(err.to_string().contains("at least two members are required"));
        let err = table(&[record("A", &["a"]), TypeDesc::Int]).unwrap_err();
        assert!(err
            .to_string()
            .contains("only unions of records or external models are supported"));
    }

    #[test]
    fn external_members_need_a_catalog() {
        let members = [
            TypeDesc::External("Order".to_string()),
            TypeDesc::External("Invoice".to_string()),
        ];
        assert!(table(&members).is_err());
    }

    #[test]
    fn resolve_failures() {
        let table = table(&[record("A", &["a"]), record("B", &["b"])]).unwrap();
        let err = table.resolve(&json!({"c": 1})).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Cannot structure U: {"c":1} does not match any of the union members"#
        );
        let err = table.resolve(&json!([1])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot structure U: only mappings are supported as input"
        );
    }

    #[test]
    fn record_tables_are_cached_across_catalogs() {
        let union = UnionSchema::new(vec![record("A", &["a"]), record("B", &["b"])]);
        let chain = StrategyChain::default();
        let first = chain.table_for(&union, None, None).unwrap();
        let again = chain.table_for(&union, None, Some(7)).unwrap();
        assert!(
            Arc::ptr_eq(&first, &again),
            "record candidates do not depend on the catalog"
        );
        assert!(!first.from_catalog);
    }
}
