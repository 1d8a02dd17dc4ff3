//! recast-storage: an in-memory [`ModelCatalog`](recast_core::ModelCatalog)
//! and a conformance suite for catalog implementations.

mod catalog;
pub mod conformance;
mod error;

pub use catalog::MemoryCatalog;
pub use error::StorageError;
