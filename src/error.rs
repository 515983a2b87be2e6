//! Engine error types.
//!
//! Plan-time errors ([`EngineError::UnknownEntity`], [`EngineError::UnknownField`],
//! [`EngineError::MissingFilterArgument`], ...) are raised before any statement
//! is issued. Runtime errors abort the remaining levels of the request.

use std::time::Duration;

use serde::Serialize;

use crate::executor::DbError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building the registry, planning or executing a request.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Referenced an entity that is not registered.
    #[error("unknown entity: '{0}'")]
    UnknownEntity(String),

    /// Requested a field with no descriptor on its enclosing entity.
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A field with required argument handlers received none of them.
    #[error("'{field}' requires one of the arguments [{}]", .expected.join(", "))]
    MissingFilterArgument { field: String, expected: Vec<String> },

    /// An argument that is neither a declared handler nor a reserved argument.
    #[error("unknown argument '{argument}' on '{field}'")]
    UnknownArgument { field: String, argument: String },

    /// An argument value that cannot be used as given.
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// The registry description violates a schema invariant.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A statement failed while executing the given plan level.
    #[error("execution failed at level {level}: {cause}")]
    Execution {
        level: usize,
        #[source]
        cause: DbError,
    },

    /// No pooled connection could be acquired in time.
    #[error("connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// The request exceeded its deadline and was cancelled.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Stable, client-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownEntity,
    UnknownField,
    MissingFilterArgument,
    UnknownArgument,
    InvalidArgument,
    InvalidSchema,
    ExecutionError,
    ConnectionUnavailable,
    Timeout,
}

impl EngineError {
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownEntity(_) => ErrorKind::UnknownEntity,
            EngineError::UnknownField { .. } => ErrorKind::UnknownField,
            EngineError::MissingFilterArgument { .. } => ErrorKind::MissingFilterArgument,
            EngineError::UnknownArgument { .. } => ErrorKind::UnknownArgument,
            EngineError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            EngineError::InvalidSchema(_) => ErrorKind::InvalidSchema,
            EngineError::Execution { .. } => ErrorKind::ExecutionError,
            EngineError::ConnectionUnavailable(_) => ErrorKind::ConnectionUnavailable,
            EngineError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Whether the error was caused by the request rather than the datastore.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnknownEntity
                | ErrorKind::UnknownField
                | ErrorKind::MissingFilterArgument
                | ErrorKind::UnknownArgument
                | ErrorKind::InvalidArgument
        )
    }
}
