use std::collections::BTreeMap;

use recast_core::{ExternalError, ModelCatalog, Typed};

use super::{TestResult, CUSTOMER, ORDER};

pub(super) fn run_construct_tests<C, F>(factory: &F) -> Vec<TestResult>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "construct",
        "construct_keeps_values",
        construct_keeps_values(factory),
    ));
    results.push(TestResult::from_result(
        "construct",
        "construct_honors_persisted_flag",
        construct_honors_persisted_flag(factory),
    ));
    results.push(TestResult::from_result(
        "construct",
        "construct_rejects_unknown_field",
        construct_rejects_unknown_field(factory),
    ));
    results.push(TestResult::from_result(
        "construct",
        "construct_rejects_backward_relation",
        construct_rejects_backward_relation(factory),
    ));

    results
}

// ── 1. Assigned values are readable on the instance ──────────────────────────

fn construct_keeps_values<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let mut values = BTreeMap::new();
    values.insert("name".to_string(), Typed::Text("Ada".to_string()));
    values.insert("vip".to_string(), Typed::Bool(true));

    let instance = c
        .construct(CUSTOMER, values, false)
        .map_err(|e| format!("construct failed: {}", e))?;
    if instance.model != CUSTOMER {
        return Err(format!("expected model {}, got {}", CUSTOMER, instance.model));
    }
    if instance.get("name") != Some(&Typed::Text("Ada".to_string())) {
        return Err(format!("name not kept, got {:?}", instance.get("name")));
    }
    if instance.get("vip") != Some(&Typed::Bool(true)) {
        return Err(format!("vip not kept, got {:?}", instance.get("vip")));
    }
    Ok(())
}

// ── 2. The persisted flag is stored as given ─────────────────────────────────

fn construct_honors_persisted_flag<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    for persisted in [false, true] {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), Typed::Int(7));
        let instance = c
            .construct(CUSTOMER, values, persisted)
            .map_err(|e| format!("construct failed: {}", e))?;
        if instance.persisted != persisted {
            return Err(format!(
                "expected persisted={}, got {}",
                persisted, instance.persisted
            ));
        }
    }
    Ok(())
}

// ── 3. Fields the model does not declare are rejected ────────────────────────

fn construct_rejects_unknown_field<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let mut values = BTreeMap::new();
    values.insert("discount".to_string(), Typed::Int(5));
    match c.construct(ORDER, values, false) {
        Err(ExternalError::UnknownField { model, field })
            if model == ORDER && field == "discount" =>
        {
            Ok(())
        }
        Err(other) => Err(format!("expected UnknownField(Order.discount), got {:?}", other)),
        Ok(instance) => Err(format!("expected an error, got {:?}", instance)),
    }
}

// ── 4. The backward side of a relation cannot be assigned ────────────────────

fn construct_rejects_backward_relation<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let mut values = BTreeMap::new();
    values.insert("orders".to_string(), Typed::List(Vec::new()));
    match c.construct(CUSTOMER, values, false) {
        Err(_) => Ok(()),
        Ok(instance) => Err(format!(
            "assigning Customer.orders should fail, got {:?}",
            instance
        )),
    }
}
