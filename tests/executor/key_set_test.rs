//! Tests for parent key sets and statement cancellation against SQLite.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use relgraph::executor::{Connection, Pool, PoolConfig, SqliteManager};
use relgraph::schema::{
    ArgumentFilter, ArgumentHandlers, EntityType, Field, FilterOp, JoinCondition, RegistryBuilder,
    Relation, SchemaRegistry,
};
use relgraph::selection::{QueryNode, Request};
use relgraph::sql::{Dialect, Emitter};
use relgraph::value::{ScalarKind, Value};
use relgraph::Engine;

/// Above SQLite's 32,766 host parameter limit.
const MANY_CASES: i64 = 40_000;
const MANY_PARTIES: i64 = 3_000;

fn fixture() -> String {
    format!(
        "
        CREATE TABLE cases (id INTEGER PRIMARY KEY, case_name TEXT);
        CREATE TABLE case_citations (case_id INTEGER NOT NULL, citation TEXT NOT NULL);
        CREATE TABLE case_notes (case_ref TEXT NOT NULL, body TEXT NOT NULL);
        CREATE TABLE parties (a INTEGER NOT NULL, b TEXT NOT NULL, PRIMARY KEY (a, b));
        CREATE TABLE party_cases (pa INTEGER NOT NULL, pb TEXT NOT NULL, case_id INTEGER NOT NULL);

        INSERT INTO cases
            WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {cases})
            SELECT i, 'Case ' || i FROM n;
        INSERT INTO case_citations SELECT id, id || ' CLR 1' FROM cases;
        INSERT INTO case_notes VALUES ('1', 'first'), ('2', 'second'), ('2', 'again');

        INSERT INTO parties
            WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {parties})
            SELECT i, 'p' || i FROM n;
        INSERT INTO party_cases SELECT a, b, (a % 3) + 1 FROM parties;
        -- Same first key column, different second: must not match any party.
        INSERT INTO party_cases SELECT a, 'q' || a, 4 FROM parties;
        ",
        cases = MANY_CASES,
        parties = MANY_PARTIES,
    )
}

fn registry() -> SchemaRegistry {
    let mut b = RegistryBuilder::new();
    b.register(EntityType::shell("Case", "cases", vec!["id".into()]))
        .unwrap();
    b.register(EntityType::shell(
        "Citation",
        "case_citations",
        vec!["case_id".into(), "citation".into()],
    ))
    .unwrap();
    b.register(EntityType::shell(
        "Note",
        "case_notes",
        vec!["case_ref".into(), "body".into()],
    ))
    .unwrap();
    b.register(EntityType::shell(
        "Party",
        "parties",
        vec!["a".into(), "b".into()],
    ))
    .unwrap();

    b.attach_fields(
        "Case",
        vec![
            Field::scalar("id", "id", ScalarKind::Integer),
            Field::scalar("case_name", "case_name", ScalarKind::String),
            Field::relation("citations", Relation::batched("Citation", "case_id", "id")),
            Field::relation("notes", Relation::batched("Note", "case_ref", "id")),
        ],
    )
    .unwrap();
    b.attach_fields(
        "Citation",
        vec![Field::scalar("citation", "citation", ScalarKind::String)],
    )
    .unwrap();
    b.attach_fields("Note", vec![Field::scalar("body", "body", ScalarKind::String)])
        .unwrap();
    b.attach_fields(
        "Party",
        vec![
            Field::scalar("a", "a", ScalarKind::Integer),
            Field::scalar("b", "b", ScalarKind::String),
            Field::relation(
                "cases",
                Relation::junction(
                    "Case",
                    "party_cases",
                    JoinCondition::on(&[("a", "pa"), ("b", "pb")]),
                    JoinCondition::on(&[("case_id", "id")]),
                ),
            ),
        ],
    )
    .unwrap();
    b.attach_lookups(
        "Case",
        ArgumentHandlers::optional(vec![ArgumentFilter::new("id", "id", FilterOp::Eq)]),
    )
    .unwrap();
    b.build().unwrap()
}

fn engine() -> Engine<SqliteManager> {
    let manager = SqliteManager::memory().unwrap();
    manager.seed(&fixture()).unwrap();
    Engine::new(
        Arc::new(registry()),
        Emitter::new(Dialect::Sqlite),
        Pool::new(manager, PoolConfig::default()),
    )
}

#[tokio::test]
async fn test_key_set_larger_than_parameter_limit() {
    let executed = engine()
        .execute(&Request::new("Case").select(vec![
            QueryNode::field("id"),
            QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
        ]))
        .await
        .unwrap();

    assert_eq!(executed.statements.len(), 2);
    assert_eq!(executed.statements[1].params.len(), 1);

    let cases = executed.data.as_list().unwrap();
    assert_eq!(cases.len(), MANY_CASES as usize);
    for case in cases {
        let id = case.get("id").and_then(|v| v.as_scalar()).cloned().unwrap();
        let Value::Int(id) = id else {
            panic!("non-integer id {:?}", id);
        };
        assert_eq!(
            case.get("citations").unwrap().to_json(),
            json!([{"citation": format!("{} CLR 1", id)}])
        );
    }
}

#[tokio::test]
async fn test_composite_junction_keys_match_as_tuples() {
    let executed = engine()
        .execute(&Request::new("Party").select(vec![
            QueryNode::field("a"),
            QueryNode::field("b"),
            QueryNode::field("cases").select(vec![QueryNode::field("id")]),
        ]))
        .await
        .unwrap();

    assert_eq!(executed.statements.len(), 2);
    assert_eq!(executed.statements[1].params.len(), 1);

    let parties = executed.data.to_json();
    let parties = parties.as_array().unwrap();
    assert_eq!(parties.len(), MANY_PARTIES as usize);

    let by_key: HashMap<(i64, String), &serde_json::Value> = parties
        .iter()
        .map(|p| {
            let a = p["a"].as_i64().unwrap();
            let b = p["b"].as_str().unwrap().to_string();
            ((a, b), &p["cases"])
        })
        .collect();
    for a in 1..=MANY_PARTIES {
        let cases = by_key[&(a, format!("p{}", a))];
        assert_eq!(*cases, json!([{"id": (a % 3) + 1}]), "party {}", a);
    }
}

#[tokio::test]
async fn test_text_foreign_keys_group_under_integer_parents() {
    let executed = engine()
        .execute(
            &Request::new("Case")
                .arg("id", 2)
                .select(vec![
                    QueryNode::field("id"),
                    QueryNode::field("notes").select(vec![QueryNode::field("body")]),
                ]),
        )
        .await
        .unwrap();

    assert_eq!(
        executed.data.to_json(),
        json!({"id": 2, "notes": [{"body": "again"}, {"body": "second"}]})
    );
}

const ENDLESS: &str = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n \
                       WHERE i < 1000000000) SELECT count(*) FROM n";

#[tokio::test]
async fn test_cancelled_statement_stops_before_connection_is_reused() {
    let manager = SqliteManager::memory().unwrap();
    let pool = Pool::new(
        manager,
        PoolConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..PoolConfig::default()
        },
    );

    let started = Instant::now();
    {
        let mut conn = pool.acquire().await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_millis(50), conn.query(ENDLESS, &[])).await;
        assert!(outcome.is_err());
    }

    // The only connection comes back once its statement has stopped.
    let mut conn = pool.acquire().await.unwrap();
    assert!(!conn.is_busy());
    let rows = conn.query("SELECT 1", &[]).await.unwrap();
    assert_eq!(rows, vec![vec![Value::Int(1)]]);
    assert!(started.elapsed() < Duration::from_secs(5));
}
