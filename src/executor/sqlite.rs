//! SQLite backend over `rusqlite`.
//!
//! Statements run on tokio's blocking pool. An in-memory database is a named
//! shared-cache database kept alive by the manager, so every pooled
//! connection sees the same tables.
//!
//! Dropping a `query` future cancels its statement: the blocking task is
//! flagged and the connection interrupted. The task itself is kept until it
//! has stopped, and the connection reports itself busy in the meantime.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::InterruptHandle;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backend::{Connection, ConnectionManager};
use super::error::{DbError, DbResult};
use crate::value::{Row, Value};

static MEMORY_DB_SEQ: AtomicUsize = AtomicUsize::new(0);

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
        })
    }
}

fn decode(column: usize, cell: ValueRef<'_>) -> DbResult<Value> {
    match cell {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(n) => Ok(Value::Int(n)),
        ValueRef::Real(f) => Ok(Value::Float(f)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|e| DbError::decode(column, e.to_string())),
        ValueRef::Blob(_) => Err(DbError::decode(column, "blob columns are not supported")),
    }
}

fn run(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
    cancelled: &AtomicBool,
) -> DbResult<Vec<Row>> {
    if cancelled.load(Ordering::Acquire) {
        return Err(DbError::Cancelled);
    }
    let mut stmt = conn.prepare_cached(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        if cancelled.load(Ordering::Relaxed) {
            return Err(DbError::Cancelled);
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(decode(i, row.get_ref(i)?)?);
        }
        out.push(cells);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    /// Shared-cache URI of a named in-memory database.
    Memory(String),
}

/// Opens SQLite connections to a file or a shared in-memory database.
pub struct SqliteManager {
    target: Target,
    /// Holds an in-memory database open while the manager lives.
    _keeper: Option<Mutex<rusqlite::Connection>>,
}

impl SqliteManager {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
            _keeper: None,
        }
    }

    /// A fresh, private in-memory database.
    pub fn memory() -> DbResult<Self> {
        let uri = format!(
            "file:relgraph-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let keeper = rusqlite::Connection::open(&uri)?;
        Ok(Self {
            target: Target::Memory(uri),
            _keeper: Some(Mutex::new(keeper)),
        })
    }

    fn open(&self) -> DbResult<rusqlite::Connection> {
        let conn = match &self.target {
            Target::File(path) => rusqlite::Connection::open(path)?,
            Target::Memory(uri) => rusqlite::Connection::open(uri)?,
        };
        Ok(conn)
    }

    /// Run a batch of statements (DDL and inserts) on a dedicated connection.
    pub fn seed(&self, sql: &str) -> DbResult<()> {
        self.open()?.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionManager for SqliteManager {
    type Connection = SqliteConnection;

    async fn connect(&self) -> DbResult<SqliteConnection> {
        let conn = self.open().map_err(|e| DbError::Connect(e.to_string()))?;
        Ok(SqliteConnection {
            interrupt: Arc::new(conn.get_interrupt_handle()),
            conn: Arc::new(Mutex::new(conn)),
            in_flight: None,
        })
    }
}

/// A single SQLite connection.
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    interrupt: Arc<InterruptHandle>,
    /// The statement task of the last `query`, until it has been joined.
    in_flight: Option<JoinHandle<DbResult<Vec<Row>>>>,
}

/// Cancels a running statement unless disarmed first.
struct CancelOnDrop {
    cancelled: Arc<AtomicBool>,
    interrupt: Arc<InterruptHandle>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("interrupting abandoned statement");
            self.cancelled.store(true, Ordering::Release);
            self.interrupt.interrupt();
        }
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        self.settle().await;

        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params = params.to_vec();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = self.in_flight.insert(tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            run(&conn, &sql, &params, &flag)
        }));
        let guard = CancelOnDrop {
            cancelled,
            interrupt: Arc::clone(&self.interrupt),
            armed: true,
        };

        let result = task.await;
        guard.disarm();
        self.in_flight = None;
        result.map_err(|e| DbError::Task(e.to_string()))?
    }

    fn is_busy(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn settle(&mut self) {
        if let Some(task) = self.in_flight.take() {
            // Outcome of a statement whose request is gone.
            let _ = task.await;
        }
    }
}
