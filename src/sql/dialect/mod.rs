//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (PostgreSQL/SQLite), `` ` `` (MySQL)
//! - Placeholders: `$1` (PostgreSQL), `?` (MySQL), `?1` (SQLite)
//! - Pagination: LIMIT/OFFSET, and what to emit for a bare OFFSET
//! - Key sets: the row source that unpacks a JSON key-set parameter
//!
//! The dialect never influences planning; it only changes how a planned
//! statement is spelled.
//!
//! # Usage
//!
//! ```ignore
//! use relgraph::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("case");  // "case"
//! ```

pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;
use crate::value::{ScalarKind, Value};

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    ///
    /// - PostgreSQL/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder for the bound parameter at 1-based `position`.
    fn placeholder(&self, position: usize) -> String;

    /// Emit LIMIT/OFFSET or equivalent pagination clause with bound values.
    fn emit_limit_offset(&self, limit: Option<&Value>, offset: Option<&Value>) -> TokenStream {
        helpers::emit_limit_offset_bound(limit, offset, None)
    }

    /// A subquery yielding one row per key of `keys`, a JSON array of key
    /// tuples bound as a single parameter. Column `i` is cast to `kinds[i]`
    /// where the dialect needs a type.
    fn emit_key_set(&self, kinds: &[Option<ScalarKind>], keys: &Value) -> TokenStream;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn placeholder(&self, position: usize) -> String {
        self.dialect().placeholder(position)
    }

    fn emit_limit_offset(&self, limit: Option<&Value>, offset: Option<&Value>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn emit_key_set(&self, kinds: &[Option<ScalarKind>], keys: &Value) -> TokenStream {
        self.dialect().emit_key_set(kinds, keys)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(format!(
                "unsupported dialect '{}', expected one of: postgres, mysql, sqlite",
                other
            )),
        }
    }
}
