//! Conformance test suite for `ModelCatalog` implementations.
//!
//! This module provides a backend-agnostic test suite that any `ModelCatalog`
//! implementation can run to verify the behavior the conversion engine
//! relies on. The suite covers:
//!
//! - **Metadata**: field order, relation and flag reporting, unknown models
//! - **Construction**: values kept, persisted flag honored, bad fields rejected
//! - **Fetching**: loaded values, the not-loaded sentinel for unfetched
//!   to-many relations, unknown fields
//! - **Round trip**: structuring and unstructuring through a `Converter`
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh catalog holding the given fixture models for each test:
//!
//! ```ignore
//! use recast_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn sqlite_catalog_conformance() {
//!     let report = run_conformance_suite(|models| create_test_catalog(models));
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod construct;
mod fetch;
mod meta;
mod roundtrip;

use std::fmt;
use std::sync::Arc;

use recast_core::{EnumSchema, FieldKind, FieldMeta, ModelCatalog, ModelMeta, RelationKind};

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "meta", "construct", "fetch").
    pub category: String,
    /// Test name (e.g. "meta_reports_fields_in_order").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a catalog implementation.
///
/// The `factory` function is called once per test with the fixture models
/// (see [`fixture_models`]) and must return a fresh catalog holding exactly
/// those models.
pub fn run_conformance_suite<C, F>(factory: F) -> ConformanceReport
where
    C: ModelCatalog + 'static,
    F: Fn(&[ModelMeta]) -> C,
{
    let models = fixture_models();
    let make = || factory(&models);

    let mut results = Vec::new();
    results.extend(meta::run_meta_tests(&make));
    results.extend(construct::run_construct_tests(&make));
    results.extend(fetch::run_fetch_tests(&make));
    results.extend(roundtrip::run_roundtrip_tests(&make));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Fixture models ───────────────────────────────────────────────────────────

pub(crate) const CUSTOMER: &str = "Customer";
pub(crate) const ORDER: &str = "Order";
pub(crate) const TAG: &str = "Tag";

/// The models every conformance test runs against.
///
/// `Customer` owns the backward side of `Order.customer`; `Order` has a
/// forward to-many relation to `Tag`.
pub fn fixture_models() -> Vec<ModelMeta> {
    let status = Arc::new(
        EnumSchema::new("OrderStatus")
            .member("OPEN", "open")
            .member("SHIPPED", "shipped"),
    );
    vec![
        ModelMeta::new(CUSTOMER)
            .field(FieldMeta::generated_pk("id"))
            .field(FieldMeta::data("name", FieldKind::Other))
            .field(FieldMeta::data("vip", FieldKind::Bool).nullable())
            .field(FieldMeta::relation(
                "orders",
                RelationKind::ToManyBackward {
                    model: ORDER.to_string(),
                },
            )),
        ModelMeta::new(ORDER)
            .field(FieldMeta::generated_pk("id"))
            .field(FieldMeta::data("total", FieldKind::Decimal))
            .field(FieldMeta::data(
                "placed",
                FieldKind::DateTime { auto_now_add: true },
            ))
            .field(FieldMeta::data("status", FieldKind::NamedEnum(status)))
            .field(FieldMeta::relation(
                "customer",
                RelationKind::ToOne {
                    model: CUSTOMER.to_string(),
                },
            ))
            .field(FieldMeta::relation(
                "tags",
                RelationKind::ToManyForward {
                    model: TAG.to_string(),
                },
            )),
        ModelMeta::new(TAG)
            .field(FieldMeta::generated_pk("id"))
            .field(FieldMeta::data("label", FieldKind::Other)),
    ]
}

/// Fetch `field` of `meta`, or fail the test.
fn field<'m>(meta: &'m ModelMeta, name: &str) -> Result<&'m FieldMeta, String> {
    meta.get(name)
        .ok_or_else(|| format!("model {} reports no field {}", meta.name, name))
}
