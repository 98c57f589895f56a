//! End-to-end behavior of cellbox-engine through the `Engine` facade.

use cellbox_engine::{
    AssociationEnd, Catalog, ComplexType, Engine, EntityType, Error, ErrorKind, Limits,
    ManualClock, MemoryStore, Multiplicity, Precondition, PrimitiveKind, Property, QueryOptions,
    StaticCatalog,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn catalog() -> Catalog {
    Catalog::new()
        .with_entity_type(EntityType::new(
            "T",
            vec![
                Property::new("n", PrimitiveKind::Int32),
                Property::new("f", PrimitiveKind::Single),
                Property::complex("address", "Address"),
            ],
        ))
        .with_complex_type(ComplexType::new(
            "Address",
            vec![
                Property::new("city", PrimitiveKind::String),
                Property::new("zip", PrimitiveKind::String),
                Property::new("lines", PrimitiveKind::String).list(),
                Property::complex("geo", "Geo"),
            ],
        ))
        .with_complex_type(ComplexType::new(
            "Geo",
            vec![
                Property::new("lat", PrimitiveKind::Double),
                Property::new("lng", PrimitiveKind::Double),
            ],
        ))
        .with_entity_type(EntityType::new(
            "Customer",
            vec![Property::new("name", PrimitiveKind::String)],
        ))
        .with_entity_type(EntityType::new(
            "Order",
            vec![Property::new("total", PrimitiveKind::Double)],
        ))
        .with_entity_type(EntityType::new("Tag", vec![]))
        .with_association(
            AssociationEnd::new("customer", "Customer", Multiplicity::One),
            AssociationEnd::new("orders", "Order", Multiplicity::Many),
        )
        .with_association(
            AssociationEnd::new("tagged", "Order", Multiplicity::Many),
            AssociationEnd::new("tags", "Tag", Multiplicity::Many),
        )
}

fn engine_with(limits: Limits) -> Engine {
    let source = StaticCatalog::new(catalog(), &limits).unwrap();
    Engine::new(Arc::new(MemoryStore::new()), Arc::new(source), limits)
        .with_clock(Arc::new(ManualClock::at(1_700_000_000_000)))
}

fn engine() -> Engine {
    engine_with(Limits::default())
}

/// Fields of a rendered body, without system fields and navigation properties.
fn user_fields(body: &serde_json::Map<String, Value>) -> Value {
    Value::Object(
        body.iter()
            .filter(|(k, _)| !k.starts_with('_') || k.as_str() == "__id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn get(engine: &Engine, entity_type: &str, id: &str) -> serde_json::Map<String, Value> {
    engine
        .get_record(entity_type, id, &QueryOptions::new())
        .unwrap()
        .body
}

fn ids(engine: &Engine, entity_type: &str, options: QueryOptions) -> Vec<String> {
    engine
        .list_records(entity_type, &options)
        .unwrap()
        .entries
        .into_iter()
        .map(|e| e.record.id)
        .collect()
}

// ============================================================================
// Example Scenarios
// ============================================================================

#[test]
fn declared_integer_scenario() {
    let engine = engine();
    engine
        .create_record("T", &json!({"__id": "r1", "n": 123}))
        .unwrap();

    assert_eq!(
        ids(&engine, "T", QueryOptions::new().with_filter("n eq 123")),
        ["r1"]
    );

    let err = engine
        .list_records("T", &QueryOptions::new().with_filter("n eq \"abc\""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    engine
        .merge_record("T", "r1", &json!({"n": null}), &Precondition::Unconditional)
        .unwrap();
    assert_eq!(get(&engine, "T", "r1")["n"], Value::Null);
}

#[test]
fn dynamic_fields_replace_versus_merge() {
    let engine = engine();
    engine
        .create_record("T", &json!({"__id": "r", "a": 1, "b": 2}))
        .unwrap();
    engine
        .replace_record("T", "r", &json!({"a": 1}), &Precondition::Unconditional)
        .unwrap();
    let body = get(&engine, "T", "r");
    assert_eq!(body["a"], 1);
    assert!(!body.contains_key("b"));

    engine
        .create_record("T", &json!({"__id": "m", "a": 1, "b": 2}))
        .unwrap();
    engine
        .merge_record("T", "m", &json!({"a": 1}), &Precondition::Unconditional)
        .unwrap();
    let body = get(&engine, "T", "m");
    assert_eq!(body["a"], 1);
    assert_eq!(body["b"], 2);
}

#[test]
fn float_and_integer_representations_compare_equal() {
    let engine = engine();
    engine
        .create_record("T", &json!({"__id": "float", "f": 1.0}))
        .unwrap();
    engine
        .create_record("T", &json!({"__id": "int", "f": 1}))
        .unwrap();

    let mut found = ids(&engine, "T", QueryOptions::new().with_filter("f eq 1"));
    found.sort();
    assert_eq!(found, ["float", "int"]);

    let mut found = ids(&engine, "T", QueryOptions::new().with_filter("f eq 1.0"));
    found.sort();
    assert_eq!(found, ["float", "int"]);
}

// ============================================================================
// Update Properties
// ============================================================================

#[test]
fn round_trip_returns_exactly_supplied_fields() {
    let engine = engine();
    let supplied = json!({
        "n": 7,
        "label": "x",
        "flags": [true, false],
        "address": {"city": "Tokyo", "zip": "100", "lines": ["a"], "geo": {"lat": 35.6, "lng": 139.7}}
    });
    let created = engine.create_record("T", &supplied).unwrap();
    let body = get(&engine, "T", &created.record.id);

    let mut expected = supplied.as_object().unwrap().clone();
    expected.insert("__id".into(), json!(created.record.id));
    assert_eq!(user_fields(&body), Value::Object(expected));
}

#[test]
fn nested_merge_keeps_unmentioned_subfields() {
    let engine = engine();
    engine
        .create_record(
            "T",
            &json!({
                "__id": "r",
                "address": {"city": "Tokyo", "zip": "100", "lines": ["a", "b"], "geo": {"lat": 1.5, "lng": 2.5}}
            }),
        )
        .unwrap();
    engine
        .merge_record(
            "T",
            "r",
            &json!({"address": {"zip": "200", "lines": ["c"], "geo": {"lat": 9.5}}}),
            &Precondition::Unconditional,
        )
        .unwrap();

    assert_eq!(
        get(&engine, "T", "r")["address"],
        json!({"city": "Tokyo", "zip": "200", "lines": ["c"], "geo": {"lat": 9.5, "lng": 2.5}})
    );
}

#[test]
fn repeated_replace_is_idempotent_on_fields() {
    let engine = engine();
    let created = engine
        .create_record("T", &json!({"__id": "r", "n": 1, "extra": "x"}))
        .unwrap();
    let body = json!({"n": 2, "other": [1, 2]});

    let mut tag = created.tag();
    let mut snapshots = Vec::new();
    for _ in 0..3 {
        let next = engine
            .replace_record("T", "r", &body, &Precondition::tag(tag))
            .unwrap();
        assert_ne!(next, tag);
        tag = next;
        snapshots.push(user_fields(&get(&engine, "T", "r")));
    }
    assert!(snapshots.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(tag.version, 4);
}

#[test]
fn stale_precondition_loses() {
    let engine = engine();
    let created = engine
        .create_record("T", &json!({"__id": "r", "n": 1}))
        .unwrap();
    let stale = Precondition::tag(created.tag());

    engine
        .replace_record("T", "r", &json!({"n": 2}), &stale)
        .unwrap();
    let err = engine
        .replace_record("T", "r", &json!({"n": 3}), &stale)
        .unwrap_err();

    assert!(matches!(err, Error::PreconditionFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(get(&engine, "T", "r")["n"], 2);
}

#[test]
fn declared_bounds_enforced_through_engine() {
    let engine = engine();
    for (n, ok) in [
        (json!(2147483647), true),
        (json!(-2147483648i64), true),
        (json!(2147483648i64), false),
        (json!(-2147483649i64), false),
        (json!(1.5), false),
    ] {
        let result = engine.create_record("T", &json!({"n": n}));
        assert_eq!(result.is_ok(), ok, "n = {}", n);
    }
    for (f, ok) in [
        (json!(12345.12345), true),
        (json!(-12345.12345), true),
        (json!(123456.1), false),
        (json!(1.123456), false),
    ] {
        let result = engine.create_record("T", &json!({"f": f}));
        assert_eq!(result.is_ok(), ok, "f = {}", f);
    }
}

// ============================================================================
// Nested complex types
// ============================================================================

/// `Deep.root` nests `L1` through `L5`; `extra` and `items` hold `L5` directly.
fn deep_engine() -> Engine {
    let mut catalog = Catalog::new()
        .with_entity_type(EntityType::new(
            "Deep",
            vec![
                Property::complex("root", "L1"),
                Property::complex("extra", "L5"),
                Property::complex("items", "L5").list(),
            ],
        ))
        .with_complex_type(ComplexType::new(
            "L5",
            vec![
                Property::new("a", PrimitiveKind::Int32),
                Property::new("b", PrimitiveKind::String).with_default(json!("dflt")),
                Property::new("must", PrimitiveKind::String).not_null(),
            ],
        ));
    for level in 1..5 {
        catalog = catalog.with_complex_type(ComplexType::new(
            format!("L{}", level),
            vec![
                Property::new("tag", PrimitiveKind::String),
                Property::complex("next", format!("L{}", level + 1)),
            ],
        ));
    }
    let limits = Limits::default();
    let source = StaticCatalog::new(catalog, &limits).unwrap();
    Engine::new(Arc::new(MemoryStore::new()), Arc::new(source), limits)
}

/// Wrap `leaf` in four `next` levels under `root`.
fn at_level_five(leaf: Value) -> Value {
    let mut value = leaf;
    for _ in 0..4 {
        value = json!({ "next": value });
    }
    json!({ "root": value })
}

#[test]
fn five_levels_of_nesting() {
    let engine = deep_engine();

    let missing = engine.create_record("Deep", &at_level_five(json!({"a": 1})));
    assert_eq!(
        missing.unwrap_err(),
        Error::MissingRequiredField("root/next/next/next/next/must".into())
    );

    let mut body = at_level_five(json!({"a": 1, "must": "m"}));
    body["__id"] = json!("d");
    body["root"]["tag"] = json!("top");
    engine.create_record("Deep", &body).unwrap();
    assert_eq!(
        get(&engine, "Deep", "d")["root"]["next"]["next"]["next"]["next"],
        json!({"a": 1, "b": "dflt", "must": "m"})
    );

    engine
        .merge_record(
            "Deep",
            "d",
            &at_level_five(json!({"a": 2})),
            &Precondition::Unconditional,
        )
        .unwrap();
    let stored = get(&engine, "Deep", "d");
    assert_eq!(stored["root"]["tag"], "top");
    assert_eq!(
        stored["root"]["next"]["next"]["next"]["next"],
        json!({"a": 2, "b": "dflt", "must": "m"})
    );

    let err = engine
        .merge_record(
            "Deep",
            "d",
            &at_level_five(json!({"a": "two"})),
            &Precondition::Unconditional,
        )
        .unwrap_err();
    assert!(
        matches!(&err, Error::TypeMismatch { field, .. } if field == "root/next/next/next/next/a"),
        "{:?}",
        err
    );
}

#[test]
fn merged_complex_values_conform_in_full() {
    let engine = deep_engine();
    let created = engine
        .create_record("Deep", &json!({"__id": "d"}))
        .unwrap();

    // No stored object to merge over
    let err = engine
        .merge_record("Deep", "d", &json!({"extra": {}}), &Precondition::Unconditional)
        .unwrap_err();
    assert_eq!(err, Error::MissingRequiredField("extra/must".into()));
    assert!(get(&engine, "Deep", "d").get("extra").is_none());

    // Stored null
    engine
        .merge_record("Deep", "d", &json!({"extra": null}), &Precondition::Unconditional)
        .unwrap();
    assert!(engine
        .merge_record("Deep", "d", &json!({"extra": {"a": 1}}), &Precondition::Unconditional)
        .is_err());

    // List elements replace wholesale
    assert_eq!(
        engine
            .merge_record("Deep", "d", &json!({"items": [{}]}), &Precondition::Unconditional)
            .unwrap_err(),
        Error::MissingRequiredField("items/must".into())
    );

    // Partial leaf under an absent parent
    assert_eq!(
        engine
            .merge_record(
                "Deep",
                "d",
                &at_level_five(json!({"a": 1})),
                &Precondition::Unconditional,
            )
            .unwrap_err(),
        Error::MissingRequiredField("root/next/next/next/next/must".into())
    );

    let tag = engine
        .merge_record(
            "Deep",
            "d",
            &json!({"extra": {"must": "m"}, "items": [{"must": "x", "b": "y"}]}),
            &Precondition::Unconditional,
        )
        .unwrap();
    assert_eq!(tag.version, created.tag().version + 2);
    let stored = get(&engine, "Deep", "d");
    assert_eq!(stored["extra"], json!({"b": "dflt", "must": "m"}));
    assert_eq!(stored["items"], json!([{"b": "y", "must": "x"}]));
}

// ============================================================================
// Queries
// ============================================================================

fn seeded() -> Engine {
    let engine = engine();
    for (id, n, name) in [
        ("a", Some(3), "Pochi the dog"),
        ("b", None, "Tama the cat"),
        ("c", Some(1), "Mike the cat"),
        ("d", Some(2), "ぽちたま"),
    ] {
        let mut body = json!({"__id": id, "name": name});
        if let Some(n) = n {
            body["n"] = json!(n);
        }
        engine.create_record("T", &body).unwrap();
    }
    engine
}

#[test]
fn orderby_and_paging() {
    let engine = seeded();
    assert_eq!(
        ids(&engine, "T", QueryOptions::new().with_orderby("n")),
        ["b", "c", "d", "a"]
    );
    assert_eq!(
        ids(&engine, "T", QueryOptions::new().with_orderby("n desc")),
        ["a", "d", "c", "b"]
    );
    assert_eq!(
        ids(
            &engine,
            "T",
            QueryOptions::new().with_orderby("n").with_skip(1).with_top(2)
        ),
        ["c", "d"]
    );

    let page = engine
        .list_records(
            "T",
            &QueryOptions::new()
                .with_filter("n ne null")
                .with_top(1)
                .with_inlinecount("allpages"),
        )
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.count, Some(3));
}

#[test]
fn search_and_filter_combine() {
    let engine = seeded();
    let mut found = ids(&engine, "T", QueryOptions::new().with_search("cat"));
    found.sort();
    assert_eq!(found, ["b", "c"]);

    assert_eq!(
        ids(
            &engine,
            "T",
            QueryOptions::new().with_search("cat").with_filter("n eq 1")
        ),
        ["c"]
    );
    assert_eq!(ids(&engine, "T", QueryOptions::new().with_search("ちた")), ["d"]);
}

#[test]
fn select_projects_fields() {
    let engine = seeded();
    let page = engine
        .list_records(
            "T",
            &QueryOptions::new().with_select("name").with_filter("__id eq 'a'"),
        )
        .unwrap();
    let body = &page.entries[0].body;
    assert_eq!(body["name"], "Pochi the dog");
    assert!(!body.contains_key("n"));
    assert!(body.contains_key("__id"));
    assert!(body.contains_key("__metadata"));
}

#[test]
fn query_errors_are_categorized() {
    let engine = seeded();
    for options in [
        QueryOptions::new().with_filter("n eq"),
        QueryOptions::new().with_orderby("n DESC"),
        QueryOptions::new().with_select("'n'"),
        QueryOptions::new().with_search(""),
        QueryOptions::new().with_expand("Order"),
        QueryOptions::new().with_top(10_001),
        QueryOptions::new().with_search("a".repeat(256)),
    ] {
        let err = engine.list_records("T", &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query, "{:?}", options);
    }
}

// ============================================================================
// Links
// ============================================================================

fn shop() -> Engine {
    let engine = engine();
    engine
        .create_record("Customer", &json!({"__id": "c1", "name": "Ann"}))
        .unwrap();
    engine
        .create_record("Customer", &json!({"__id": "c2", "name": "Bob"}))
        .unwrap();
    for id in ["o1", "o2", "o3"] {
        engine
            .create_record("Order", &json!({"__id": id, "total": 10}))
            .unwrap();
    }
    engine
}

#[test]
fn link_lifecycle() {
    let engine = shop();
    engine.create_link("Customer", "c1", "_Order", "o1").unwrap();
    engine.create_link("Order", "o2", "_Customer", "c1").unwrap();

    assert_eq!(engine.list_links("Customer", "c1", "_Order").unwrap(), ["o1", "o2"]);
    assert_eq!(engine.list_links("Order", "o1", "_Customer").unwrap(), ["c1"]);

    assert!(matches!(
        engine.create_link("Customer", "c1", "_Order", "o1"),
        Err(Error::LinkAlreadyExists(_))
    ));

    engine.delete_link("Customer", "c1", "_Order", "o1").unwrap();
    assert!(matches!(
        engine.delete_link("Customer", "c1", "_Order", "o1"),
        Err(Error::LinkNotFound(_))
    ));
    assert_eq!(engine.list_links("Customer", "c1", "_Order").unwrap(), ["o2"]);
}

#[test]
fn single_end_allows_one_partner() {
    let engine = shop();
    engine.create_link("Customer", "c1", "_Order", "o1").unwrap();
    let err = engine
        .create_link("Customer", "c2", "_Order", "o1")
        .unwrap_err();
    assert!(matches!(err, Error::Multiplicity(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn link_errors() {
    let engine = shop();
    assert!(matches!(
        engine.create_link("Customer", "c1", "_Invoice", "o1"),
        Err(Error::NavigationNotFound(_))
    ));
    assert!(matches!(
        engine.create_link("Customer", "c1", "_Order", "missing"),
        Err(Error::RecordNotFound { .. })
    ));
    assert!(matches!(
        engine.create_link("Customer", "missing", "_Order", "o1"),
        Err(Error::RecordNotFound { .. })
    ));
    assert!(matches!(
        engine.list_links("Nope", "c1", "_Order"),
        Err(Error::EntityTypeNotFound(_))
    ));
}

#[test]
fn many_to_many_links_are_capped() {
    let engine = engine_with(Limits::default().with_max_links(2));
    engine.create_record("Order", &json!({"__id": "o1"})).unwrap();
    for id in ["t1", "t2", "t3"] {
        engine.create_record("Tag", &json!({"__id": id})).unwrap();
    }
    engine.create_link("Order", "o1", "_Tag", "t1").unwrap();
    engine.create_link("Order", "o1", "_Tag", "t2").unwrap();
    let err = engine.create_link("Order", "o1", "_Tag", "t3").unwrap_err();
    assert!(matches!(err, Error::LinkLimit { limit: 2, .. }));
}

#[test]
fn delete_rule_for_linked_records() {
    let engine = shop();
    engine.create_link("Customer", "c1", "_Order", "o1").unwrap();

    // The order sits on the many side and still holds its link.
    let err = engine
        .delete_record("Order", "o1", &Precondition::Unconditional)
        .unwrap_err();
    assert!(matches!(err, Error::LinkedRecord(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // The customer sits on the single side; its links go with it.
    engine
        .delete_record("Customer", "c1", &Precondition::Unconditional)
        .unwrap();
    assert!(engine.list_links("Order", "o1", "_Customer").unwrap().is_empty());
    engine
        .delete_record("Order", "o1", &Precondition::Unconditional)
        .unwrap();
}

#[test]
fn related_records_support_queries() {
    let engine = shop();
    engine
        .create_via_navigation("Customer", "c1", "_Order", &json!({"__id": "o4", "total": 99}))
        .unwrap();
    engine.create_link("Customer", "c1", "_Order", "o1").unwrap();

    let page = engine
        .list_related(
            "Customer",
            "c1",
            "_Order",
            &QueryOptions::new()
                .with_orderby("total desc")
                .with_inlinecount("allpages"),
        )
        .unwrap();
    let found: Vec<_> = page.entries.iter().map(|e| e.record.id.as_str()).collect();
    assert_eq!(found, ["o4", "o1"]);
    assert_eq!(page.count, Some(2));

    let none = engine
        .list_related("Customer", "c2", "_Order", &QueryOptions::new())
        .unwrap();
    assert!(none.entries.is_empty());
}

#[test]
fn list_expand_is_capped() {
    let engine = shop();
    let err = engine
        .list_records(
            "Order",
            &QueryOptions::new().with_expand("_Customer").with_top(101),
        )
        .unwrap_err();
    assert!(matches!(err, Error::QueryLimit { option: "$top", .. }));

    let page = engine
        .list_records("Order", &QueryOptions::new().with_expand("_Customer,_Tag"))
        .unwrap();
    assert_eq!(page.entries.len(), 3);
    assert_eq!(page.entries[0].body["_Customer"], Value::Null);
    assert_eq!(page.entries[0].body["_Tag"], json!([]));
}
