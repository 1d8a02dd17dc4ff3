use std::sync::Arc;

use recast_core::{Converter, ModelCatalog, StructureError, TypeDesc, Typed};
use serde_json::{json, Value};

use super::{TestResult, CUSTOMER, ORDER};

pub(super) fn run_roundtrip_tests<C, F>(factory: &F) -> Vec<TestResult>
where
    C: ModelCatalog + 'static,
    F: Fn() -> C,
{
    vec![
        TestResult::from_result(
            "roundtrip",
            "structure_marks_related_persisted",
            structure_marks_related_persisted(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "unstructure_omits_unloaded_relations",
            unstructure_omits_unloaded_relations(factory),
        ),
        TestResult::from_result(
            "roundtrip",
            "structure_rejects_missing_non_nullable",
            structure_rejects_missing_non_nullable(factory),
        ),
    ]
}

fn converter<C, F>(factory: &F) -> Converter
where
    C: ModelCatalog + 'static,
    F: Fn() -> C,
{
    Converter::new().with_catalog(Arc::new(factory()))
}

fn order_input() -> Value {
    json!({
        "id": 1,
        "total": "12.50",
        "placed": 1577923200,
        "status": "OPEN",
        "customer": {"id": 3, "name": "Ada", "vip": null},
        "tags": [{"id": 9, "label": "rush"}]
    })
}

fn order_desc() -> TypeDesc {
    TypeDesc::External(ORDER.to_string())
}

// ── 1. Structuring persists the root and every related instance ──────────────

fn structure_marks_related_persisted<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog + 'static,
    F: Fn() -> C,
{
    let conv = converter(factory);
    let typed = conv
        .structure(&order_input(), &order_desc())
        .map_err(|e| format!("structure failed: {}", e))?;
    let order = typed
        .as_external()
        .ok_or_else(|| format!("expected an external instance, got {:?}", typed))?;

    if !order.persisted {
        return Err("an order with a primary key should be persisted".to_string());
    }
    let customer = order
        .get("customer")
        .and_then(Typed::as_external)
        .ok_or_else(|| format!("customer not structured: {:?}", order.get("customer")))?;
    if customer.model != CUSTOMER || !customer.persisted {
        return Err(format!("customer should be a persisted Customer, got {:?}", customer));
    }
    let tags = order
        .get("tags")
        .and_then(Typed::as_list)
        .ok_or_else(|| format!("tags not structured: {:?}", order.get("tags")))?;
    if tags.len() != 1 || !tags.iter().all(|t| t.as_external().is_some_and(|t| t.persisted)) {
        return Err(format!("expected one persisted tag, got {:?}", tags));
    }
    Ok(())
}

// ── 2. Unstructuring skips relations that were never loaded ──────────────────

fn unstructure_omits_unloaded_relations<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog + 'static,
    F: Fn() -> C,
{
    let conv = converter(factory);
    let typed = conv
        .structure(&order_input(), &order_desc())
        .map_err(|e| format!("structure failed: {}", e))?;
    let out = conv
        .unstructure(&typed, &order_desc())
        .map_err(|e| format!("unstructure failed: {}", e))?;

    let expected = json!({
        "id": 1,
        "total": "12.50",
        "placed": 1577923200.0,
        "status": "OPEN",
        "customer": {"id": 3, "name": "Ada", "vip": null},
        "tags": [{"id": 9, "label": "rush"}]
    });
    if out != expected {
        return Err(format!("expected {}, got {}", expected, out));
    }
    Ok(())
}

// ── 3. Missing non-nullable data fields fail with the model name ─────────────

fn structure_rejects_missing_non_nullable<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog + 'static,
    F: Fn() -> C,
{
    let conv = converter(factory);
    match conv.structure(&json!({"status": "OPEN"}), &order_desc()) {
        Err(StructureError::NotNullable { owner, field }) if owner == ORDER && field == "total" => {
            Ok(())
        }
        Err(other) => Err(format!("expected NotNullable(Order.total), got {}", other)),
        Ok(typed) => Err(format!("expected an error, got {:?}", typed)),
    }
}
