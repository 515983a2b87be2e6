//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use crate::value::Value;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

// =============================================================================
// Placeholders
// =============================================================================

/// `$1`, `$2`, ...
/// Used by: Postgres
pub fn placeholder_dollar(position: usize) -> String {
    format!("${}", position)
}

/// `?` (positional, unnumbered).
/// Used by: MySQL
pub fn placeholder_question(_position: usize) -> String {
    "?".to_string()
}

/// `?1`, `?2`, ...
/// Used by: SQLite
pub fn placeholder_numbered_question(position: usize) -> String {
    format!("?{}", position)
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... with bound values.
///
/// `offset_only_limit` is the sentinel some dialects need in front of a bare
/// OFFSET (MySQL and SQLite reject OFFSET without LIMIT).
pub fn emit_limit_offset_bound(
    limit: Option<&Value>,
    offset: Option<&Value>,
    offset_only_limit: Option<&'static str>,
) -> TokenStream {
    let mut ts = TokenStream::new();

    match (limit, offset_only_limit) {
        (Some(lim), _) => {
            ts.push(Token::Limit).space().push(Token::Param(lim.clone()));
        }
        (None, Some(sentinel)) if offset.is_some() => {
            ts.push(Token::Limit).space().push(Token::Raw(sentinel.into()));
        }
        _ => {}
    }

    if let Some(off) = offset {
        if !ts.is_empty() {
            ts.space();
        }
        ts.push(Token::Offset).space().push(Token::Param(off.clone()));
    }

    ts
}

// =============================================================================
// Key Sets
// =============================================================================

/// Alias of the row source a key set is read from.
pub const KEY_SET_ALIAS: &str = "k";

/// `SELECT <column 0>, <column 1>, ... FROM <source> AS "k"`
///
/// `column(i)` spells the `i`-th key component of a row of `source`.
pub fn emit_key_set_select(
    arity: usize,
    column: impl Fn(usize) -> TokenStream,
    source: TokenStream,
) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Select).space();
    for i in 0..arity {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&column(i));
    }
    ts.space()
        .push(Token::From)
        .space()
        .append(&source)
        .space()
        .push(Token::As)
        .space()
        .push(Token::Ident(KEY_SET_ALIAS.into()));
    ts
}

/// `"k"."value"`
pub fn key_set_value() -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Ident(KEY_SET_ALIAS.into()))
        .push(Token::Dot)
        .push(Token::Ident("value".into()));
    ts
}
