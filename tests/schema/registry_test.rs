//! Tests for two-phase registry construction and schema validation.

use relgraph::schema::{
    ArgumentFilter, ArgumentHandlers, Cardinality, EntityType, Field, FieldDescriptor, FilterOp,
    JoinCondition, RegistryBuilder, Relation, RelationStrategy, SchemaDef,
};
use relgraph::value::ScalarKind;
use relgraph::{EngineError, ErrorKind};

fn case_shell() -> EntityType {
    EntityType::shell("Case", "cases", vec!["id".into()])
}

#[test]
fn test_self_reference_resolves_after_second_pass() {
    let mut b = RegistryBuilder::new();
    b.register(case_shell()).unwrap();
    b.attach_fields(
        "Case",
        vec![
            Field::scalar("id", "id", ScalarKind::Integer),
            Field::relation(
                "cites",
                Relation::junction(
                    "Case",
                    "case_to_case",
                    JoinCondition::on(&[("id", "case_id_1")]),
                    JoinCondition::on(&[("case_id_2", "id")]),
                ),
            ),
            Field::relation(
                "cited_by",
                Relation::junction(
                    "Case",
                    "case_to_case",
                    JoinCondition::on(&[("id", "case_id_2")]),
                    JoinCondition::on(&[("case_id_1", "id")]),
                ),
            ),
        ],
    )
    .unwrap();

    let registry = b.build().unwrap();
    let case = registry.resolve("Case").unwrap();
    let relations: Vec<&str> = case.relations().map(|(name, _)| name).collect();
    assert_eq!(relations, vec!["cites", "cited_by"]);
}

#[test]
fn test_forward_reference_to_later_shell() {
    // Court is registered after Case references it.
    let mut b = RegistryBuilder::new();
    b.register(case_shell()).unwrap();
    b.register(EntityType::shell("Court", "courts", vec!["id".into()]))
        .unwrap();
    b.attach_fields(
        "Case",
        vec![
            Field::scalar("court_id", "court_id", ScalarKind::Integer),
            Field::relation(
                "court",
                Relation::direct("Court", JoinCondition::on(&[("court_id", "id")])),
            ),
        ],
    )
    .unwrap();
    b.attach_fields("Court", vec![Field::scalar("id", "id", ScalarKind::Integer)])
        .unwrap();

    let registry = b.build().unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("Court"));
}

#[test]
fn test_resolve_unknown_entity() {
    let mut b = RegistryBuilder::new();
    b.register(case_shell()).unwrap();
    let registry = b.build().unwrap();

    let err = registry.resolve("Judge").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEntity);
    assert_eq!(err.to_string(), "unknown entity: 'Judge'");
}

#[test]
fn test_duplicate_shell_is_rejected() {
    let mut b = RegistryBuilder::new();
    b.register(case_shell()).unwrap();
    assert!(matches!(
        b.register(case_shell()),
        Err(EngineError::InvalidSchema(_))
    ));
}

#[test]
fn test_attach_to_unregistered_entity_fails() {
    let mut b = RegistryBuilder::new();
    let err = b
        .attach_fields("Case", vec![Field::scalar("id", "id", ScalarKind::Integer)])
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownEntity(name) if name == "Case"));
}

#[test]
fn test_lookup_must_target_scalar_column() {
    let mut b = RegistryBuilder::new();
    b.register(case_shell()).unwrap();
    b.attach_fields("Case", vec![Field::scalar("id", "id", ScalarKind::Integer)])
        .unwrap();
    b.attach_lookups(
        "Case",
        ArgumentHandlers::required(vec![ArgumentFilter::new(
            "title",
            "title",
            FilterOp::Like,
        )]),
    )
    .unwrap();
    assert!(matches!(b.build(), Err(EngineError::InvalidSchema(_))));
}

#[test]
fn test_schema_def_with_junction_and_handlers() {
    let json = r#"{
        "entities": [
            {
                "name": "Case",
                "table": "cases",
                "key": ["id"],
                "fields": [
                    {"name": "id", "kind": "scalar", "column": "id", "type": "integer"},
                    {
                        "name": "legislation",
                        "kind": "relation",
                        "target": "Legislation",
                        "handlers": {
                            "handlers": [
                                {"argument": "id", "column": "id"},
                                {"argument": "title", "column": "title", "op": "like"}
                            ],
                            "mode": "required"
                        },
                        "strategy": {
                            "type": "junction",
                            "table": "legislation_to_cases",
                            "parent_leg": [{"left": {"side": "left", "column": "id"},
                                            "right": {"side": "right", "column": "case_id"}}],
                            "child_leg": [{"left": {"side": "right", "column": "id"},
                                           "right": {"side": "left", "column": "legislation_id"}}],
                            "fields": [{"name": "section", "column": "section", "type": "string"}]
                        }
                    }
                ]
            },
            {
                "name": "Legislation",
                "table": "legislation",
                "key": ["id"],
                "fields": [
                    {"name": "id", "kind": "scalar", "column": "id", "type": "integer"},
                    {"name": "title", "kind": "scalar", "column": "title", "type": "string"}
                ]
            }
        ]
    }"#;

    let registry = SchemaDef::from_json(json).unwrap().into_registry().unwrap();
    let case = registry.resolve("Case").unwrap();
    let Some(FieldDescriptor::Relation(rel)) = case.field("legislation") else {
        panic!("legislation should be a relation");
    };
    assert_eq!(rel.cardinality, Cardinality::Many);
    assert_eq!(rel.handlers.argument_names(), vec!["id", "title"]);
    match &rel.strategy {
        RelationStrategy::Junction {
            child_leg, fields, ..
        } => {
            // Operands given right-to-left still normalize to (junction, child).
            assert_eq!(child_leg.column_pairs(), Some(vec![("legislation_id", "id")]));
            assert_eq!(fields[0].name, "section");
        }
        other => panic!("expected junction, got {:?}", other),
    }
}

#[test]
fn test_schema_def_unknown_target() {
    let json = r#"{
        "entities": [{
            "name": "Case",
            "table": "cases",
            "key": ["id"],
            "fields": [{
                "name": "court",
                "kind": "relation",
                "target": "Court",
                "strategy": {"type": "batched_one_to_many", "child_column": "id", "parent_column": "court_id"}
            }]
        }]
    }"#;
    let err = SchemaDef::from_json(json)
        .unwrap()
        .into_registry()
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownEntity(name) if name == "Court"));
}

#[test]
fn test_demo_schema_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/cases.schema.json");
    let registry = SchemaDef::from_file(path).unwrap().into_registry().unwrap();
    assert_eq!(registry.len(), 4);
    let case = registry.resolve("Case").unwrap();
    assert!(case.field("cited_by").is_some());
}
