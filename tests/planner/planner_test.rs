//! Tests for selection planning: level layout, aliasing and plan-time errors.

use relgraph::planner::{LevelSource, PlanField, Planner, QueryPlan};
use relgraph::schema::{
    ArgumentFilter, ArgumentHandlers, Cardinality, EntityType, Field, FilterOp, JoinCondition,
    JunctionField, RegistryBuilder, Relation, SchemaRegistry,
};
use relgraph::selection::{QueryNode, Request};
use relgraph::value::{ScalarKind, Value};
use relgraph::{EngineError, ErrorKind};

fn registry() -> SchemaRegistry {
    let mut b = RegistryBuilder::new();
    b.register(EntityType::shell("Case", "cases", vec!["id".into()]))
        .unwrap();
    b.register(EntityType::shell("Court", "courts", vec!["id".into()]))
        .unwrap();
    b.register(EntityType::shell(
        "Citation",
        "case_citations",
        vec!["case_id".into(), "citation".into()],
    ))
    .unwrap();

    b.attach_fields(
        "Case",
        vec![
            Field::scalar("id", "id", ScalarKind::Integer),
            Field::scalar("case_name", "case_name", ScalarKind::String),
            Field::scalar("decided", "decision_date", ScalarKind::Date),
            Field::relation(
                "court",
                Relation::direct("Court", JoinCondition::on(&[("court_id", "id")])),
            ),
            Field::relation("citations", Relation::batched("Citation", "case_id", "id")),
            Field::relation(
                "cites",
                Relation::junction(
                    "Case",
                    "case_to_case",
                    JoinCondition::on(&[("id", "case_id_1")]),
                    JoinCondition::on(&[("case_id_2", "id")]),
                )
                .with_junction_field(JunctionField::new(
                    "treatment",
                    "treatment",
                    ScalarKind::String,
                )),
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
    b.attach_fields(
        "Court",
        vec![
            Field::scalar("id", "id", ScalarKind::Integer),
            Field::scalar("name", "name", ScalarKind::String),
        ],
    )
    .unwrap();
    b.attach_fields(
        "Citation",
        vec![Field::scalar("citation", "citation", ScalarKind::String)],
    )
    .unwrap();
    b.attach_lookups(
        "Case",
        ArgumentHandlers::optional(vec![ArgumentFilter::new("id", "id", FilterOp::Eq)]),
    )
    .unwrap();
    b.build().unwrap()
}

fn plan(request: Request) -> Result<QueryPlan, EngineError> {
    Planner::new(&registry()).plan_request(&request)
}

#[test]
fn test_scalars_and_direct_join_share_one_level() {
    let plan = plan(Request::new("Case").select(vec![
        QueryNode::field("case_name"),
        QueryNode::field("court").select(vec![QueryNode::field("name")]),
    ]))
    .unwrap();

    assert_eq!(plan.levels.len(), 1);
    let root = plan.root();
    let joins = root.node.joins();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].0.alias, "courts_1");
    // case_name, courts.name, then the joined key to detect a missing court.
    let columns: Vec<(&str, &str)> = root
        .columns
        .iter()
        .map(|c| (c.alias.as_str(), c.column.as_str()))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("cases_0", "case_name"),
            ("courts_1", "name"),
            ("courts_1", "id")
        ]
    );
}

#[test]
fn test_only_requested_columns_are_projected() {
    let plan = plan(Request::new("Case").select(vec![QueryNode::field("decided")])).unwrap();
    let columns: Vec<&str> = plan
        .root()
        .columns
        .iter()
        .map(|c| c.column.as_str())
        .collect();
    assert_eq!(columns, vec!["decision_date"]);
}

#[test]
fn test_self_relations_get_distinct_aliases() {
    let plan = plan(Request::new("Case").arg("id", 1).select(vec![
        QueryNode::field("cites").select(vec![QueryNode::field("id")]),
        QueryNode::field("cited_by").select(vec![QueryNode::field("id")]),
    ]))
    .unwrap();

    assert_eq!(plan.levels.len(), 3);
    let mut aliases = vec![plan.root().node.alias.clone()];
    for level in &plan.levels[1..] {
        let LevelSource::Junction { alias, .. } = &level.source else {
            panic!("expected a junction level");
        };
        aliases.push(alias.clone());
        aliases.push(level.node.alias.clone());
    }
    assert_eq!(
        aliases,
        vec![
            "cases_0",
            "case_to_case_1",
            "cases_2",
            "case_to_case_3",
            "cases_4"
        ]
    );
}

#[test]
fn test_junction_level_filters_on_junction_columns() {
    let plan = plan(Request::new("Case").select(vec![QueryNode::field("cited_by")
        .select(vec![QueryNode::field("id")])]))
    .unwrap();
    let level = plan.level(1);
    assert_eq!(level.parent(), Some(0));
    assert_eq!(level.key_columns[0].alias, "case_to_case_1");
    assert_eq!(level.key_columns[0].column, "case_id_2");
    assert_eq!(plan.parent_slots(1), Some(&[0][..]));
}

#[test]
fn test_junction_field_is_selectable_on_child() {
    let plan = plan(Request::new("Case").select(vec![QueryNode::field("cites").select(vec![
        QueryNode::field("id"),
        QueryNode::field("treatment"),
    ])]))
    .unwrap();
    let level = plan.level(1);
    assert!(level
        .columns
        .iter()
        .any(|c| c.alias == "case_to_case_1" && c.column == "treatment"));
}

#[test]
fn test_single_root_only_for_key_lookup() {
    let single = plan(Request::new("Case").arg("id", 1).select(vec![QueryNode::field("id")]))
        .unwrap();
    assert!(single.single_root());

    let list = plan(Request::new("Case").select(vec![QueryNode::field("id")])).unwrap();
    assert!(!list.single_root());
}

#[test]
fn test_deferred_cardinality_comes_from_relation() {
    let plan = plan(Request::new("Case").select(vec![QueryNode::field("citations")
        .select(vec![QueryNode::field("citation")])]))
    .unwrap();
    match &plan.root().node.fields[0] {
        PlanField::Deferred {
            level, cardinality, ..
        } => {
            assert_eq!(*level, 1);
            assert_eq!(*cardinality, Cardinality::Many);
        }
        other => panic!("expected deferred field, got {:?}", other),
    }
}

#[test]
fn test_pagination_on_root() {
    let plan = plan(
        Request::new("Case")
            .arg("first", 10)
            .arg("offset", 5)
            .arg("order_by", "-case_name")
            .select(vec![QueryNode::field("id")]),
    )
    .unwrap();
    match &plan.root().source {
        LevelSource::Root { limit, offset, .. } => {
            assert_eq!(limit, &Some(Value::Int(10)));
            assert_eq!(offset, &Some(Value::Int(5)));
        }
        other => panic!("expected root, got {:?}", other),
    }
    let order: Vec<&str> = plan
        .root()
        .order_by
        .iter()
        .map(|t| t.column.column.as_str())
        .collect();
    assert_eq!(order, vec!["case_name", "id"]);
}

#[test]
fn test_unknown_field() {
    let err = plan(Request::new("Case").select(vec![QueryNode::field("judge")])).unwrap_err();
    assert!(matches!(
        &err,
        EngineError::UnknownField { entity, field } if entity == "Case" && field == "judge"
    ));
}

#[test]
fn test_unknown_field_in_nested_selection() {
    let err = plan(Request::new("Case").select(vec![QueryNode::field("court")
        .select(vec![QueryNode::field("case_name")])]))
    .unwrap_err();
    assert!(matches!(
        &err,
        EngineError::UnknownField { entity, .. } if entity == "Court"
    ));
}

#[test]
fn test_junction_field_not_visible_through_other_relation() {
    let err = plan(Request::new("Case").select(vec![QueryNode::field("cited_by")
        .select(vec![QueryNode::field("treatment")])]))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownField);
}

#[test]
fn test_unknown_entity() {
    let err = plan(Request::new("Judge").select(vec![QueryNode::field("id")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownEntity);
}

#[test]
fn test_unknown_argument() {
    let err = plan(
        Request::new("Case")
            .arg("name", "x")
            .select(vec![QueryNode::field("id")]),
    )
    .unwrap_err();
    assert!(matches!(
        &err,
        EngineError::UnknownArgument { argument, .. } if argument == "name"
    ));
}

#[test]
fn test_invalid_selection_shapes() {
    let scalar_with_children = plan(Request::new("Case").select(vec![
        QueryNode::field("id").select(vec![QueryNode::field("x")]),
    ]))
    .unwrap_err();
    assert_eq!(scalar_with_children.kind(), ErrorKind::InvalidArgument);

    let bare_relation = plan(Request::new("Case").select(vec![QueryNode::field("citations")]))
        .unwrap_err();
    assert_eq!(bare_relation.kind(), ErrorKind::InvalidArgument);

    let duplicate = plan(Request::new("Case").select(vec![
        QueryNode::field("id"),
        QueryNode::field("case_name").with_alias("id"),
    ]))
    .unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_nested_pagination_is_rejected() {
    let err = plan(Request::new("Case").select(vec![QueryNode::field("citations")
        .arg("first", 1)
        .select(vec![QueryNode::field("citation")])]))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_negative_first_is_rejected() {
    let err = plan(
        Request::new("Case")
            .arg("first", -1)
            .select(vec![QueryNode::field("id")]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_every_declared_field_plans() {
    let registry = registry();
    let planner = Planner::new(&registry);
    for entity in registry.entities() {
        let selections: Vec<QueryNode> = entity
            .fields
            .iter()
            .map(|f| match &f.descriptor {
                relgraph::schema::FieldDescriptor::Scalar { .. } => QueryNode::field(&f.name),
                relgraph::schema::FieldDescriptor::Relation(rel) => {
                    let target = registry.resolve(&rel.target).unwrap();
                    let first_scalar = target
                        .fields
                        .iter()
                        .find(|t| {
                            matches!(
                                t.descriptor,
                                relgraph::schema::FieldDescriptor::Scalar { .. }
                            )
                        })
                        .unwrap();
                    QueryNode::field(&f.name).select(vec![QueryNode::field(&first_scalar.name)])
                }
            })
            .collect();
        let request = Request::new(&entity.name).select(selections);
        assert!(
            planner.plan_request(&request).is_ok(),
            "planning every field of {} should succeed",
            entity.name
        );
    }
}
