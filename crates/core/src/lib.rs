#![allow(clippy::result_large_err)]
//! recast-core: bidirectional conversion between typed records and dynamic
//! data.
//!
//! Record schemas are declared once and resolved into immutable descriptors.
//! A [`Converter`] then structures untrusted `serde_json::Value`s into
//! validated [`Typed`] values and unstructures them back, reporting failures
//! as single, human-readable messages.
//!
//! # Public API
//!
//! - [`Converter`] -- the facade: setup (`&mut`) then conversion (`&`)
//! - [`RecordDecl`], [`TypeExpr`] -- declarations fed to the resolver
//! - [`TypeDesc`] -- resolved descriptors the engines convert against
//! - [`Typed`] -- the typed side of the boundary
//! - [`ModelCatalog`] -- collaborator interface for external records
//! - [`StructureError`], [`UnstructureError`], [`ResolveError`] -- errors

pub mod config;
pub mod converter;
pub mod error;
pub mod external;
pub mod hooks;
pub mod resolve;
mod structure;
pub mod typed;
pub mod types;
pub mod union;
mod unstructure;

// ── Convenience re-exports ───────────────────────────────────────────

pub use config::ConverterConfig;
pub use converter::Converter;
pub use error::{
    ErrorKind, ExternalError, HookError, ResolveError, StructureError, UnstructureError,
};
pub use external::{Fetched, FieldKind, FieldMeta, ModelCatalog, ModelMeta, RelationKind};
pub use hooks::{HookEntry, HookRegistry};
pub use resolve::{RecordDecl, TypeExpr, TypeLookup, TypeResolver, TypeTable};
pub use typed::{ExternalInstance, RecordValue, Typed};
pub use types::{EnumSchema, HookKind, Presence, RecordSchema, TypeDesc};
pub use union::{Candidate, DisambiguationStrategy, DisambiguationTable};
