//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Numbered placeholders (`$1`, `$2`, ...)
//! - Bare OFFSET is allowed without LIMIT
//! - Key sets unpack through `json_array_elements`, cast per key column

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};
use crate::value::{ScalarKind, Value};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, position: usize) -> String {
        helpers::placeholder_dollar(position)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn emit_key_set(&self, kinds: &[Option<ScalarKind>], keys: &Value) -> TokenStream {
        let mut source = TokenStream::new();
        source
            .push(Token::Raw("json_array_elements(CAST(".into()))
            .push(Token::Param(keys.clone()))
            .push(Token::Raw(" AS JSON))".into()));

        helpers::emit_key_set_select(
            kinds.len(),
            |i| {
                let mut ts = TokenStream::new();
                ts.push(Token::Raw("CAST(".into()))
                    .append(&helpers::key_set_value())
                    .push(Token::Raw(format!(" ->> {} AS {})", i, cast_type(kinds[i]))));
                ts
            },
            source,
        )
    }
}

fn cast_type(kind: Option<ScalarKind>) -> &'static str {
    match kind {
        Some(ScalarKind::Integer) => "BIGINT",
        Some(ScalarKind::Float) => "DOUBLE PRECISION",
        Some(ScalarKind::Date) => "DATE",
        Some(ScalarKind::Boolean) => "BOOLEAN",
        Some(ScalarKind::String) | None => "TEXT",
    }
}
