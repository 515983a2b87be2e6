//! Backend error types.

use thiserror::Error;

/// Result type for backend operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by a database backend.
#[derive(Error, Debug)]
pub enum DbError {
    /// The SQLite driver reported an error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A cell could not be converted to a [`Value`](crate::value::Value).
    #[error("cannot decode column {column}: {message}")]
    Decode { column: usize, message: String },

    /// A row's width does not match the statement's select list.
    #[error("expected {expected} columns, got {actual}")]
    ColumnMismatch { expected: usize, actual: usize },

    /// Opening a connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request that issued the statement was cancelled.
    #[error("statement cancelled")]
    Cancelled,

    /// The blocking task running the statement panicked or was cancelled.
    #[error("statement task failed: {0}")]
    Task(String),
}

impl DbError {
    pub fn decode(column: usize, message: impl Into<String>) -> Self {
        Self::Decode {
            column,
            message: message.into(),
        }
    }
}
