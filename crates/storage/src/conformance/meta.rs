use recast_core::{ExternalError, FieldKind, ModelCatalog, RelationKind};

use super::{field, TestResult, CUSTOMER, ORDER};

pub(super) fn run_meta_tests<C, F>(factory: &F) -> Vec<TestResult>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    vec![
        TestResult::from_result(
            "meta",
            "meta_reports_fields_in_order",
            meta_reports_fields_in_order(factory),
        ),
        TestResult::from_result(
            "meta",
            "meta_reports_relations_and_flags",
            meta_reports_relations_and_flags(factory),
        ),
        TestResult::from_result(
            "meta",
            "meta_unknown_model_is_error",
            meta_unknown_model_is_error(factory),
        ),
    ]
}

// ── 1. Fields come back in declaration order ─────────────────────────────────

fn meta_reports_fields_in_order<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let meta = c.meta(ORDER).map_err(|e| format!("meta failed: {}", e))?;
    let names: Vec<&str> = meta.fields.iter().map(|f| f.name.as_str()).collect();
    let expected = ["id", "total", "placed", "status", "customer", "tags"];
    if names != expected {
        return Err(format!("expected fields {:?}, got {:?}", expected, names));
    }
    if meta.name != ORDER {
        return Err(format!("expected model name {}, got {}", ORDER, meta.name));
    }
    Ok(())
}

// ── 2. Relation kinds, nullability and key flags survive ─────────────────────

fn meta_reports_relations_and_flags<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    let order = c.meta(ORDER).map_err(|e| format!("meta failed: {}", e))?;

    let id = field(&order, "id")?;
    if !(id.primary_key && id.generated) {
        return Err("Order.id should be a generated primary key".to_string());
    }
    let placed = field(&order, "placed")?;
    if placed.kind != (FieldKind::DateTime { auto_now_add: true }) {
        return Err(format!("Order.placed has kind {:?}", placed.kind));
    }
    let customer = field(&order, "customer")?;
    if customer.relation
        != (RelationKind::ToOne {
            model: CUSTOMER.to_string(),
        })
        || !customer.nullable
    {
        return Err(format!(
            "Order.customer should be a nullable to-one relation, got {:?}",
            customer
        ));
    }

    let cust = c.meta(CUSTOMER).map_err(|e| format!("meta failed: {}", e))?;
    let orders = field(&cust, "orders")?;
    match &orders.relation {
        RelationKind::ToManyBackward { model } if model == ORDER => Ok(()),
        other => Err(format!(
            "Customer.orders should be a backward relation to Order, got {:?}",
            other
        )),
    }
}

// ── 3. Unknown models report UnknownModel ────────────────────────────────────

fn meta_unknown_model_is_error<C, F>(factory: &F) -> Result<(), String>
where
    C: ModelCatalog,
    F: Fn() -> C,
{
    let c = factory();
    match c.meta("Invoice") {
        Err(ExternalError::UnknownModel(model)) if model == "Invoice" => Ok(()),
        Err(other) => Err(format!("expected UnknownModel(Invoice), got {:?}", other)),
        Ok(meta) => Err(format!("expected an error, got {:?}", meta)),
    }
}
