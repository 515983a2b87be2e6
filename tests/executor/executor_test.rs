//! Tests for wave execution, grouping and runtime failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use relgraph::executor::{
    Connection, ConnectionManager, DbResult, Pool, PoolConfig, SqliteManager,
};
use relgraph::schema::{
    ArgumentFilter, ArgumentHandlers, EntityType, Field, FilterOp, JoinCondition, RegistryBuilder,
    Relation, SchemaRegistry,
};
use relgraph::selection::{QueryNode, Request};
use relgraph::sql::{Dialect, Emitter};
use relgraph::value::{Row, ScalarKind, Value};
use relgraph::{Engine, EngineError, EngineOptions, ErrorKind};

const FIXTURE: &str = "
    CREATE TABLE courts (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE cases (
        id INTEGER PRIMARY KEY,
        case_name TEXT,
        court_id INTEGER,
        decision_date TEXT
    );
    CREATE TABLE case_citations (case_id INTEGER NOT NULL, citation TEXT NOT NULL);
    CREATE TABLE case_to_case (case_id_1 INTEGER NOT NULL, case_id_2 INTEGER NOT NULL);

    INSERT INTO courts VALUES (1, 'High Court'), (2, 'Court of Appeal');
    INSERT INTO cases VALUES
        (1, 'Mabo', 1, '1992-06-03'),
        (2, 'Wik', 1, '1996-12-23'),
        (3, 'Yorta Yorta', NULL, '2002-12-12'),
        (4, 'Ward', 2, NULL);
    INSERT INTO case_citations VALUES
        (1, '175 CLR 1'), (2, '187 CLR 1'), (1, '66 ALJR 408'),
        (4, '213 CLR 1'), (2, '71 ALJR 173'), (1, '107 ALR 1');
    INSERT INTO case_to_case VALUES (2, 1), (3, 1), (3, 2), (4, 1);
";

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
    b.register(EntityType::shell("Ghost", "no_such_table", vec!["id".into()]))
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
                ),
            ),
            Field::relation("ghosts", Relation::batched("Ghost", "case_id", "id")),
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
    b.attach_fields("Ghost", vec![Field::scalar("id", "id", ScalarKind::Integer)])
        .unwrap();
    b.attach_lookups(
        "Case",
        ArgumentHandlers::optional(vec![
            ArgumentFilter::new("id", "id", FilterOp::Eq),
            ArgumentFilter::new("name", "case_name", FilterOp::Like),
        ]),
    )
    .unwrap();
    b.build().unwrap()
}

fn engine_with(config: PoolConfig) -> Engine<SqliteManager> {
    let manager = SqliteManager::memory().unwrap();
    manager.seed(FIXTURE).unwrap();
    Engine::new(
        Arc::new(registry()),
        Emitter::new(Dialect::Sqlite),
        Pool::new(manager, config),
    )
}

fn engine() -> Engine<SqliteManager> {
    engine_with(PoolConfig::default())
}

#[tokio::test]
async fn test_grouping_is_complete_and_exclusive() {
    let executed = engine()
        .execute(&Request::new("Case").select(vec![
            QueryNode::field("id"),
            QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
        ]))
        .await
        .unwrap();

    assert_eq!(executed.statements.len(), 2);
    assert_eq!(
        executed.data.to_json(),
        json!([
            {"id": 1, "citations": [
                {"citation": "107 ALR 1"}, {"citation": "175 CLR 1"}, {"citation": "66 ALJR 408"}
            ]},
            {"id": 2, "citations": [{"citation": "187 CLR 1"}, {"citation": "71 ALJR 173"}]},
            {"id": 3, "citations": []},
            {"id": 4, "citations": [{"citation": "213 CLR 1"}]}
        ])
    );
}

#[tokio::test]
async fn test_missing_direct_join_is_null() {
    let executed = engine()
        .execute(
            &Request::new("Case")
                .arg("id", 3)
                .select(vec![
                    QueryNode::field("case_name"),
                    QueryNode::field("court").select(vec![QueryNode::field("name")]),
                ]),
        )
        .await
        .unwrap();
    assert_eq!(executed.statements.len(), 1);
    assert_eq!(
        executed.data.to_json(),
        json!({"case_name": "Yorta Yorta", "court": null})
    );
}

#[tokio::test]
async fn test_dates_are_coerced_from_text() {
    let executed = engine()
        .execute(
            &Request::new("Case")
                .arg("order_by", "-decided")
                .arg("first", 2)
                .select(vec![QueryNode::field("decided")]),
        )
        .await
        .unwrap();
    assert_eq!(
        executed.data.to_json(),
        json!([{"decided": "2002-12-12"}, {"decided": "1996-12-23"}])
    );
}

#[tokio::test]
async fn test_empty_parent_set_skips_child_level() {
    let executed = engine()
        .execute(&Request::new("Case").arg("name", "Nobody%").select(vec![
            QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
        ]))
        .await
        .unwrap();
    assert_eq!(executed.statements.len(), 1);
    assert_eq!(executed.data.to_json(), json!([]));
}

#[tokio::test]
async fn test_single_root_miss_is_null() {
    let executed = engine()
        .execute(&Request::new("Case").arg("id", 99).select(vec![QueryNode::field("id")]))
        .await
        .unwrap();
    assert!(executed.data.is_null());
}

#[tokio::test]
async fn test_sibling_levels_share_a_wave_with_one_connection() {
    let engine = engine_with(PoolConfig {
        max_connections: 1,
        ..PoolConfig::default()
    });
    let executed = engine
        .execute(&Request::new("Case").arg("id", 3).select(vec![
            QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
            QueryNode::field("cites").select(vec![QueryNode::field("case_name")]),
        ]))
        .await
        .unwrap();

    assert_eq!(executed.statements.len(), 3);
    assert_eq!(
        executed.data.to_json(),
        json!({
            "citations": [],
            "cites": [{"case_name": "Mabo"}, {"case_name": "Wik"}]
        })
    );
    assert_eq!(engine.pool().available(), 1);
}

#[tokio::test]
async fn test_nested_levels_run_in_order() {
    let executed = engine()
        .execute(&Request::new("Case").arg("id", 4).select(vec![QueryNode::field("cites")
            .select(vec![
                QueryNode::field("case_name"),
                QueryNode::field("court").select(vec![QueryNode::field("name")]),
                QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
            ])]))
        .await
        .unwrap();

    assert_eq!(executed.statements.len(), 3);
    assert_eq!(
        executed.data.to_json(),
        json!({"cites": [{
            "case_name": "Mabo",
            "court": {"name": "High Court"},
            "citations": [
                {"citation": "107 ALR 1"}, {"citation": "175 CLR 1"}, {"citation": "66 ALJR 408"}
            ]
        }]})
    );
}

#[tokio::test]
async fn test_statement_failure_names_level() {
    let err = engine()
        .execute(&Request::new("Case").select(vec![
            QueryNode::field("id"),
            QueryNode::field("ghosts").select(vec![QueryNode::field("id")]),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Execution { level: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::ExecutionError);
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_failed_request_returns_error_envelope_only() {
    let response = engine()
        .respond(&Request::new("Case").select(vec![
            QueryNode::field("id"),
            QueryNode::field("ghosts").select(vec![QueryNode::field("id")]),
        ]))
        .await;
    assert!(response.is_error());
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["error"]["kind"], "execution_error");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_concurrent_requests_share_the_engine() {
    let engine = engine_with(PoolConfig {
        max_connections: 2,
        ..PoolConfig::default()
    });
    let requests: Vec<Request> = (1..=4)
        .map(|id| {
            Request::new("Case").arg("id", id).select(vec![
                QueryNode::field("id"),
                QueryNode::field("citations").select(vec![QueryNode::field("citation")]),
            ])
        })
        .collect();

    let results = futures::future::join_all(requests.iter().map(|r| engine.execute(r))).await;
    for (id, result) in (1..=4).zip(results) {
        let data = result.unwrap().data;
        assert_eq!(data.get("id").and_then(|v| v.as_scalar()), Some(&Value::Int(id)));
    }
    assert_eq!(engine.pool().available(), 2);
}

// =============================================================================
// Stub backend
// =============================================================================

/// Answers every statement with no rows after `delay`.
struct SlowManager {
    delay: Duration,
}

struct SlowConnection {
    delay: Duration,
}

#[async_trait]
impl Connection for SlowConnection {
    async fn query(&mut self, _sql: &str, _params: &[Value]) -> DbResult<Vec<Row>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

#[async_trait]
impl ConnectionManager for SlowManager {
    type Connection = SlowConnection;

    async fn connect(&self) -> DbResult<SlowConnection> {
        Ok(SlowConnection { delay: self.delay })
    }
}

fn slow_engine(delay: Duration, config: PoolConfig) -> Engine<SlowManager> {
    Engine::new(
        Arc::new(registry()),
        Emitter::new(Dialect::Sqlite),
        Pool::new(SlowManager { delay }, config),
    )
}

#[tokio::test]
async fn test_request_deadline() {
    let engine = slow_engine(Duration::from_millis(500), PoolConfig::default()).with_options(
        EngineOptions {
            request_timeout: Some(Duration::from_millis(20)),
            ..EngineOptions::default()
        },
    );
    let err = engine
        .execute(&Request::new("Case").select(vec![QueryNode::field("id")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    // The cancelled statement returned its connection.
    assert_eq!(engine.pool().available(), engine.pool().config().max_connections);
}

#[tokio::test]
async fn test_exhausted_pool_is_connection_unavailable() {
    let engine = slow_engine(
        Duration::ZERO,
        PoolConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(20),
            ..PoolConfig::default()
        },
    );
    let _held = engine.pool().acquire().await.unwrap();

    let err = engine
        .execute(&Request::new("Case").select(vec![QueryNode::field("id")]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConnectionUnavailable(_)));
}

#[tokio::test]
async fn test_plan_errors_issue_no_statements() {
    // Every connection is checked out, so any statement would fail to acquire one.
    let engine = slow_engine(
        Duration::ZERO,
        PoolConfig {
            acquire_timeout: Duration::from_millis(1),
            ..PoolConfig::default()
        },
    );
    let _held: Vec<_> = futures::future::try_join_all(
        (0..engine.pool().config().max_connections).map(|_| engine.pool().acquire()),
    )
    .await
    .unwrap();

    let err = engine
        .execute(&Request::new("Case").select(vec![QueryNode::field("judge")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownField);
}
