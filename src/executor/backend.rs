//! Connection traits implemented by database backends.

use async_trait::async_trait;

use super::error::DbResult;
use crate::value::{Row, Value};

/// An open connection that runs parameterized read statements.
#[async_trait]
pub trait Connection: Send {
    /// Run `sql` with `params` bound in placeholder order.
    ///
    /// Each returned row matches the statement's select list positionally.
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Whether a statement abandoned by a cancelled `query` is still running.
    ///
    /// A busy connection must not be handed to another caller until
    /// [`settle`](Connection::settle) returns.
    fn is_busy(&self) -> bool {
        false
    }

    /// Wait until no abandoned statement is running on this connection.
    async fn settle(&mut self) {}
}

/// Opens connections for a [`Pool`](super::Pool).
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Connection + 'static;

    async fn connect(&self) -> DbResult<Self::Connection>;
}
