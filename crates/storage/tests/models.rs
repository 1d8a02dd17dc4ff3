//! External model conversion through `MemoryCatalog`.

use std::str::FromStr;
use std::sync::Arc;

use recast_core::{
    Converter, EnumSchema, ExternalInstance, FieldKind, FieldMeta, ModelCatalog, ModelMeta,
    RelationKind, TypeDesc, TypeExpr, Typed,
};
use recast_storage::conformance::{fixture_models, run_conformance_suite};
use recast_storage::MemoryCatalog;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use time::macros::{date, datetime};
use time::Duration;

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

const SOME_MODEL: &str = "SomeModel";

fn some_model() -> ModelMeta {
    let some_enum = Arc::new(EnumSchema::new("SomeEnum").member("K1", "V1"));
    let some_reversed_enum = Arc::new(EnumSchema::new("SomeReversedEnum").member("K2", "V2"));
    ModelMeta::new(SOME_MODEL)
        .field(FieldMeta::generated_pk("id"))
        .field(FieldMeta::data("string", FieldKind::Other).nullable())
        .field(FieldMeta::data("decimal", FieldKind::Decimal).nullable())
        .field(FieldMeta::data("enum", FieldKind::ValueEnum(some_enum)).nullable())
        .field(FieldMeta::data("reversed_enum", FieldKind::NamedEnum(some_reversed_enum)).nullable())
        .field(FieldMeta::data("date", FieldKind::Date).nullable())
        .field(
            FieldMeta::data("datetime", FieldKind::DateTime { auto_now_add: false }).nullable(),
        )
        .field(FieldMeta::data("timedelta", FieldKind::Duration).nullable())
        .field(FieldMeta::data("bool", FieldKind::Bool).nullable())
        .field(FieldMeta::relation(
            "relation",
            RelationKind::ToOne {
                model: SOME_MODEL.to_string(),
            },
        ))
}

fn catalog() -> Arc<MemoryCatalog> {
    let mut catalog = MemoryCatalog::new().with_model(some_model()).unwrap();
    for meta in fixture_models() {
        catalog.register(meta).unwrap();
    }
    catalog.validate().unwrap();
    Arc::new(catalog)
}

fn setup() -> (Converter, Arc<MemoryCatalog>) {
    let catalog = catalog();
    let converter = Converter::new().with_catalog(catalog.clone());
    (converter, catalog)
}

fn desc() -> TypeDesc {
    TypeDesc::External(SOME_MODEL.to_string())
}

/// A `SomeModel` holding every data field, as structured from storage.
fn populated(catalog: &MemoryCatalog, id: i64, flag: bool) -> ExternalInstance {
    let mut instance = catalog
        .instance(
            SOME_MODEL,
            [
                ("id", Typed::Raw(json!(id))),
                ("string", Typed::Raw(json!("test"))),
                ("decimal", Typed::Decimal(Decimal::from_str("1.23").unwrap())),
                ("enum", Typed::Enum("K1".to_string())),
                ("reversed_enum", Typed::Enum("K2".to_string())),
                ("date", Typed::Date(date!(2020 - 01 - 02))),
                ("datetime", Typed::DateTime(datetime!(2020-01-02 3:04:05 UTC))),
                ("timedelta", Typed::Duration(Duration::hours(1))),
                ("bool", Typed::Bool(flag)),
            ],
        )
        .unwrap();
    instance.persisted = true;
    instance
}

fn structured(converter: &Converter, value: Value) -> ExternalInstance {
    match converter.structure(&value, &desc()).unwrap() {
        Typed::External(instance) => instance,
        other => panic!("expected an external instance, got {:?}", other),
    }
}

// ──────────────────────────────────────────────
// Structuring
// ──────────────────────────────────────────────

#[test]
fn structure_model() {
    let (converter, catalog) = setup();
    let model = structured(
        &converter,
        json!({
            "bool": true,
            "date": 1577923200.0,
            "datetime": 1577934245.0,
            "timedelta": 3600.0,
            "decimal": "1.23",
            "enum": "V1",
            "reversed_enum": "K2",
            "id": 1,
            "string": "test"
        }),
    );
    assert_eq!(model, populated(&catalog, 1, true));
    assert!(model.persisted, "a model with a primary key is persisted");
}

#[test]
fn structure_model_humanreadable() {
    let (converter, catalog) = setup();
    let model = structured(
        &converter,
        json!({
            "bool": "false",
            "date": "2020-01-02",
            "datetime": "2020-01-02T03:04:05",
            "timedelta": "1h",
            "decimal": "1.23",
            "enum": "V1",
            "reversed_enum": "K2",
            "id": 1,
            "string": "test"
        }),
    );
    assert_eq!(model, populated(&catalog, 1, false));
}

#[test]
fn structure_model_optional() {
    let (converter, catalog) = setup();
    let model = structured(
        &converter,
        json!({
            "bool": null,
            "date": null,
            "datetime": null,
            "timedelta": null,
            "decimal": null,
            "enum": null,
            "reversed_enum": null,
            "id": null,
            "string": null
        }),
    );
    let expected = catalog
        .instance(SOME_MODEL, Vec::<(String, Typed)>::new())
        .unwrap();
    assert_eq!(model, expected);
    assert!(!model.persisted, "a model without a primary key is new");
}

#[test]
fn structure_model_relation() {
    let (converter, catalog) = setup();
    let model = structured(
        &converter,
        json!({
            "bool": true,
            "date": 1577923200.0,
            "datetime": 1577934245.0,
            "timedelta": 3600.0,
            "decimal": "1.23",
            "enum": "V1",
            "reversed_enum": "K2",
            "id": 1,
            "string": "test",
            "relation": {
                "bool": false,
                "date": 1577923200.0,
                "datetime": 1577934245.0,
                "timedelta": 3600.0,
                "decimal": "1.23",
                "enum": "V1",
                "reversed_enum": "K2",
                "id": 2
            }
        }),
    );
    assert!(model.persisted);

    let related = model
        .get("relation")
        .and_then(Typed::as_external)
        .expect("relation should be structured");
    let mut expected = populated(&catalog, 2, false);
    expected.fields.insert("string".to_string(), Typed::Null);
    assert_eq!(related, &expected);
    assert!(related.persisted, "related instances are marked persisted");
}

#[test]
fn structure_falsy_relation_is_null() {
    let (converter, _) = setup();
    for falsy in [json!(null), json!({}), json!(0), json!("")] {
        let model = structured(&converter, json!({"id": 1, "relation": falsy.clone()}));
        assert_eq!(
            model.get("relation"),
            Some(&Typed::Null),
            "relation {} should be treated as unset",
            falsy
        );
    }
}

#[test]
fn structure_reports_field_errors() {
    let (converter, _) = setup();
    let err = converter
        .structure(&json!({"id": 1, "enum": "K1"}), &desc())
        .unwrap_err();
    assert!(
        err.to_string().starts_with("Cannot structure SomeModel:"),
        "unexpected message: {}",
        err
    );

    let err = converter
        .structure(&json!({"id": 1}), &TypeDesc::External("Tag".to_string()))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot structure Tag: field 'label' is not nullable"
    );
}

#[test]
fn structure_unknown_model_is_external_error() {
    let (converter, _) = setup();
    let err = converter
        .structure(&json!({}), &TypeDesc::External("Invoice".to_string()))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot structure Invoice: unknown model 'Invoice'"
    );
}

// ──────────────────────────────────────────────
// Unstructuring
// ──────────────────────────────────────────────

#[test]
fn unstructure_model() {
    let (converter, catalog) = setup();
    let model = Typed::External(populated(&catalog, 1, true));
    assert_eq!(
        converter.unstructure(&model, &desc()).unwrap(),
        json!({
            "bool": true,
            "date": 1577923200.0,
            "datetime": 1577934245.0,
            "timedelta": 3600.0,
            "decimal": "1.23",
            "enum": "V1",
            "reversed_enum": "K2",
            "id": 1,
            "relation": null,
            "string": "test"
        })
    );
}

#[test]
fn unstructure_model_optional() {
    let (converter, catalog) = setup();
    let model = catalog
        .instance(SOME_MODEL, Vec::<(String, Typed)>::new())
        .unwrap();
    assert_eq!(
        converter
            .unstructure(&Typed::External(model), &desc())
            .unwrap(),
        json!({
            "bool": null,
            "date": null,
            "datetime": null,
            "timedelta": null,
            "decimal": null,
            "enum": null,
            "reversed_enum": null,
            "id": null,
            "relation": null,
            "string": null
        })
    );
}

#[test]
fn unstructure_nested_relation() {
    let (converter, catalog) = setup();
    let mut model = populated(&catalog, 1, true);
    model.fields.insert(
        "relation".to_string(),
        Typed::External(populated(&catalog, 2, false)),
    );
    let out = converter
        .unstructure(&Typed::External(model), &desc())
        .unwrap();
    assert_eq!(out["relation"]["id"], json!(2));
    assert_eq!(out["relation"]["bool"], json!(false));
    assert_eq!(out["relation"]["relation"], Value::Null);
}

#[test]
fn unstructure_skips_unloaded_relations() {
    let (converter, catalog) = setup();
    let desc = TypeDesc::External("Customer".to_string());
    let mut customer = catalog
        .instance(
            "Customer",
            [("id", Typed::Raw(json!(3))), ("name", Typed::Raw(json!("Ada")))],
        )
        .unwrap();

    assert_eq!(
        converter
            .unstructure(&Typed::External(customer.clone()), &desc)
            .unwrap(),
        json!({"id": 3, "name": "Ada", "vip": null}),
        "orders were never fetched and must be omitted"
    );

    let order = catalog
        .instance(
            "Order",
            [
                ("total", Typed::Decimal(Decimal::from(5))),
                ("placed", Typed::DateTime(datetime!(2020-01-02 0:00 UTC))),
                ("status", Typed::Enum("SHIPPED".to_string())),
            ],
        )
        .unwrap();
    catalog
        .load_relation(&mut customer, "orders", vec![order])
        .unwrap();
    assert_eq!(
        converter
            .unstructure(&Typed::External(customer), &desc)
            .unwrap(),
        json!({
            "id": 3,
            "name": "Ada",
            "vip": null,
            "orders": [{
                "id": null,
                "total": "5",
                "placed": 1577923200.0,
                "status": "SHIPPED",
                "customer": null
            }]
        })
    );
}

#[test]
fn unstructure_wrong_model_fails() {
    let (converter, catalog) = setup();
    let tag = catalog
        .instance("Tag", [("label", Typed::Raw(json!("rush")))])
        .unwrap();
    let err = converter
        .unstructure(&Typed::External(tag), &desc())
        .unwrap_err();
    assert!(
        err.to_string().contains("SomeModel"),
        "unexpected message: {}",
        err
    );
}

// ──────────────────────────────────────────────
// Unions of models
// ──────────────────────────────────────────────

fn plain_model(name: &str, fields: &[&str]) -> ModelMeta {
    fields.iter().fold(
        ModelMeta::new(name).field(FieldMeta::generated_pk("id")),
        |meta, field| meta.field(FieldMeta::data(*field, FieldKind::Other).nullable()),
    )
}

fn union_catalog(alpha: &[&str], beta: &[&str]) -> Arc<MemoryCatalog> {
    let catalog = MemoryCatalog::new()
        .with_model(plain_model("Alpha", alpha))
        .unwrap()
        .with_model(plain_model("Beta", beta))
        .unwrap();
    Arc::new(catalog)
}

fn models_union() -> TypeExpr {
    TypeExpr::Union(vec![TypeExpr::external("Beta"), TypeExpr::external("Alpha")])
}

fn model_name(typed: &Typed) -> &str {
    &typed.as_external().expect("an external instance").model
}

#[test]
fn model_union_selects_fewest_fields() {
    let mut converter = Converter::new().with_catalog(union_catalog(&["a"], &["a", "b"]));
    let desc = converter.resolve(&models_union()).unwrap();

    let alpha = converter.structure(&json!({"a": 1}), &desc).unwrap();
    assert_eq!(model_name(&alpha), "Alpha");

    let beta = converter
        .structure(&json!({"id": 4, "a": 1, "b": 2}), &desc)
        .unwrap();
    assert_eq!(model_name(&beta), "Beta");
    assert!(beta.as_external().unwrap().persisted);
    assert_eq!(
        converter.unstructure(&beta, &desc).unwrap(),
        json!({"id": 4, "a": 1, "b": 2})
    );
}

#[test]
fn model_union_without_match_fails() {
    let mut converter = Converter::new().with_catalog(union_catalog(&["a"], &["a", "b"]));
    let desc = converter.resolve(&models_union()).unwrap();
    let err = converter.structure(&json!({"c": 1}), &desc).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Cannot structure Union[Beta, Alpha]: {"c":1} does not match any of the union members"#
    );
}

#[test]
fn model_union_needs_a_catalog() {
    let err = Converter::new().resolve(&models_union()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid union in top-level type: Cannot structure Union[Beta, Alpha]: \
         only unions of records or external models are supported"
    );
}

#[test]
fn model_union_follows_catalog_replacement() {
    let mut converter = Converter::new().with_catalog(union_catalog(&["a"], &["a", "b"]));
    let desc = converter.resolve(&models_union()).unwrap();
    let first = converter.structure(&json!({"a": 1}), &desc).unwrap();
    assert_eq!(model_name(&first), "Alpha");

    // Alpha now has more fields than Beta, so Beta is tried first.
    converter.set_catalog(union_catalog(&["a", "b", "c"], &["a", "b"]));
    let second = converter.structure(&json!({"a": 1}), &desc).unwrap();
    assert_eq!(
        model_name(&second),
        "Beta",
        "a table read from the old catalog must not be reused"
    );
}

// ──────────────────────────────────────────────
// Catalog contract
// ──────────────────────────────────────────────

#[test]
fn memory_catalog_conformance() {
    let report = run_conformance_suite(|models| {
        let mut catalog = MemoryCatalog::new();
        for meta in models {
            catalog.register(meta.clone()).unwrap();
        }
        catalog
    });
    assert_eq!(report.failed, 0, "{}", report);
    assert!(report.total > 0);
}

#[test]
fn catalog_meta_is_shared() {
    let catalog = catalog();
    let a = catalog.meta(SOME_MODEL).unwrap();
    let b = catalog.meta(SOME_MODEL).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
