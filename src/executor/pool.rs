//! Bounded connection pool.
//!
//! Capacity is a semaphore: each checked-out connection holds one permit.
//! A [`PooledConnection`] is a scoped guard that puts its connection back on
//! the idle list when dropped, including when the request future holding it
//! is cancelled. A connection dropped with a statement still running keeps
//! its permit until the statement has finished, so the database never sees
//! more than `max_connections` statements at once.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::backend::{Connection, ConnectionManager};
use super::error::{DbError, DbResult};
use crate::error::{EngineError, EngineResult};
use crate::value::{Row, Value};

/// Pool sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: usize,
    /// How long `acquire` waits for a free connection.
    pub acquire_timeout: Duration,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

struct Idle<C> {
    conn: C,
    since: Instant,
}

struct Inner<M: ConnectionManager> {
    manager: M,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Idle<M::Connection>>>,
}

impl<M: ConnectionManager> Inner<M> {
    fn take_idle(&self) -> Option<M::Connection> {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(entry) = idle.pop() {
            if entry.since.elapsed() < self.config.idle_timeout {
                return Some(entry.conn);
            }
            debug!("closing idle connection");
        }
        None
    }

    fn release(&self, conn: M::Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.push(Idle {
            conn,
            since: Instant::now(),
        });
    }
}

/// A cloneable handle to a bounded set of connections.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<Inner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ConnectionManager> Pool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
                config,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Connections not currently checked out.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Check out a connection, waiting at most `acquire_timeout`.
    pub async fn acquire(&self) -> EngineResult<PooledConnection<M>> {
        let timeout = self.inner.config.acquire_timeout;
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.inner.permits).acquire_owned())
            .await
            .map_err(|_| {
                warn!(?timeout, "connection pool exhausted");
                EngineError::ConnectionUnavailable(format!(
                    "no connection available within {:?}",
                    timeout
                ))
            })?
            .map_err(|_| EngineError::ConnectionUnavailable("pool is closed".to_string()))?;

        let conn = match self.inner.take_idle() {
            Some(conn) => conn,
            None => self
                .inner
                .manager
                .connect()
                .await
                .map_err(|e| EngineError::ConnectionUnavailable(e.to_string()))?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            permit: Some(permit),
        })
    }
}

/// A checked-out connection. Returned to the pool on drop.
pub struct PooledConnection<M: ConnectionManager> {
    conn: Option<M::Connection>,
    pool: Arc<Inner<M>>,
    permit: Option<OwnedSemaphorePermit>,
}

#[async_trait]
impl<M: ConnectionManager> Connection for PooledConnection<M> {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        match self.conn.as_mut() {
            Some(conn) => conn.query(sql, params).await,
            None => Err(DbError::Connect("connection already released".to_string())),
        }
    }

    fn is_busy(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| c.is_busy())
    }

    async fn settle(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.settle().await;
        }
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if !conn.is_busy() {
            self.pool.release(conn);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("connection returned mid-statement, waiting before reuse");
                let pool = Arc::clone(&self.pool);
                let permit = self.permit.take();
                handle.spawn(async move {
                    conn.settle().await;
                    pool.release(conn);
                    drop(permit);
                });
            }
            Err(_) => warn!("discarding a connection with a statement still running"),
        }
    }
}
