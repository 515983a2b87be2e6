//! # relgraph
//!
//! A relational graph query engine: nested selection requests compile to a
//! small set of batched, parameterized SQL statements whose flat rows are
//! reassembled into the requested tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           Request (entity + nested selections)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner + schema registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │        QueryPlan (levels: root, batched, junction)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql::emit, per dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Statements (SQL text + bound parameters)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor: waves over a pool]
//! ┌─────────────────────────────────────────────────────────┐
//! │               Result tree / JSON response                │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod planner;
pub mod result;
pub mod schema;
pub mod selection;
pub mod sql;
pub mod value;

// Re-export SQL submodules at crate level
pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;

pub use engine::{Engine, EngineOptions};
pub use error::{EngineError, EngineResult, ErrorKind};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::engine::{Engine, EngineOptions};
    pub use crate::error::{EngineError, EngineResult, ErrorKind};
    pub use crate::executor::{
        Connection, ConnectionManager, Executed, Pool, PoolConfig, SqliteManager,
    };
    pub use crate::planner::{Planner, QueryPlan};
    pub use crate::result::{Response, ResultObject, ResultValue};
    pub use crate::schema::{
        ArgumentFilter, ArgumentHandlers, Cardinality, EntityType, Field, FilterOp, JoinCondition,
        JunctionField, RegistryBuilder, Relation, SchemaDef, SchemaRegistry,
    };
    pub use crate::selection::{ArgValue, Arguments, QueryNode, Request};
    pub use crate::sql::{Dialect, Emitter, Statement};
    pub use crate::value::{ScalarKind, Value};
}
