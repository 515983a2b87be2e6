//! SQL generation module.
//!
//! A small, type-safe SELECT builder that renders to several dialects with
//! bound parameters:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`emit`] - Plan level to statement rendering
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod emit;
pub mod expr;
pub mod query;
pub mod token;


// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use emit::{Emitter, Statement};
pub use expr::{param, table_col, BinaryOperator, Expr, ExprExt, SortDir};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
