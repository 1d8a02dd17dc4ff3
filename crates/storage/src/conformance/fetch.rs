use std::collections::BTreeMap;

use recast_core::{ExternalError, Fetched, FieldKind, FieldMeta, ModelCatalog, Typed};

use super::{field, TestResult, CUSTOMER, ORDER, TAG};

pub(super) fn run_fetch_tests<C, F>(factory: &F) -> Vec<TestResult>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    vec![
        TestResult::from_result(
            "fetch",
            "fetch_returns_loaded_value",
            fetch_returns_loaded_value(factory),
        ),
        TestResult::from_result(
            "fetch",
            "fetch_unassigned_to_many_is_not_loaded",
            fetch_unassigned_to_many_is_not_loaded(factory),
        ),
        TestResult::from_result(
            "fetch",
            "fetch_assigned_to_many_is_loaded",
            fetch_assigned_to_many_is_loaded(factory),
        ),
        TestResult::from_result(
            "fetch",
            "fetch_unknown_field_is_error",
            fetch_unknown_field_is_error(factory),
        ),
    ]
}

// ── 1. Plain fields come back as assigned ────────────────────────────────────

fn fetch_returns_loaded_value<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let meta = c.meta(CUSTOMER).map_err(|e| format!("meta failed: {}", e))?;
    let mut values = BTreeMap::new();
    values.insert("vip".to_string(), Typed::Bool(false));
    let instance = c
        .construct(CUSTOMER, values, true)
        .map_err(|e| format!("construct failed: {}", e))?;

    match c.fetch(&instance, field(&meta, "vip")?) {
        Ok(Fetched::Loaded(Typed::Bool(false))) => Ok(()),
        other => Err(format!("expected Loaded(Bool(false)), got {:?}", other)),
    }
}

// ── 2. To-many relations never assigned report NotLoaded ─────────────────────

fn fetch_unassigned_to_many_is_not_loaded<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let customer = c
        .construct(CUSTOMER, BTreeMap::new(), true)
        .map_err(|e| format!("construct failed: {}", e))?;
    let meta = c.meta(CUSTOMER).map_err(|e| format!("meta failed: {}", e))?;

    match c.fetch(&customer, field(&meta, "orders")?) {
        Ok(Fetched::NotLoaded) => Ok(()),
        other => Err(format!("expected NotLoaded for Customer.orders, got {:?}", other)),
    }
}

// ── 3. Forward to-many relations assigned on construction are loaded ─────────

fn fetch_assigned_to_many_is_loaded<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let mut tag = BTreeMap::new();
    tag.insert("label".to_string(), Typed::Text("rush".to_string()));
    let tag = c
        .construct(TAG, tag, true)
        .map_err(|e| format!("construct failed: {}", e))?;

    let mut values = BTreeMap::new();
    values.insert("tags".to_string(), Typed::List(vec![Typed::External(tag)]));
    let order = c
        .construct(ORDER, values, false)
        .map_err(|e| format!("construct failed: {}", e))?;
    let meta = c.meta(ORDER).map_err(|e| format!("meta failed: {}", e))?;

    match c.fetch(&order, field(&meta, "tags")?) {
        Ok(Fetched::Loaded(Typed::List(items))) if items.len() == 1 => Ok(()),
        other => Err(format!("expected one loaded tag, got {:?}", other)),
    }
}

// ── 4. Fields the model does not declare are an error ────────────────────────

fn fetch_unknown_field_is_error<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let order = c
        .construct(ORDER, BTreeMap::new(), false)
        .map_err(|e| format!("construct failed: {}", e))?;
    let bogus = FieldMeta::data("discount", FieldKind::Other);

    match c.fetch(&order, &bogus) {
        Err(ExternalError::UnknownField { field, .. }) if field == "discount" => Ok(()),
        other => Err(format!("expected UnknownField(discount), got {:?}", other)),
    }
}
