//! SQLite SQL dialect.
//!
//! SQLite differences:
//! - ANSI identifier quoting (`"`)
//! - Numbered `?NNN` placeholders
//! - OFFSET requires a LIMIT; a negative limit means "no limit"
//! - Key sets unpack through `json_each`; values keep their JSON type and
//!   take the compared column's affinity

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};
use crate::value::{ScalarKind, Value};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, position: usize) -> String {
        helpers::placeholder_numbered_question(position)
    }

    fn emit_limit_offset(&self, limit: Option<&Value>, offset: Option<&Value>) -> TokenStream {
        helpers::emit_limit_offset_bound(limit, offset, Some("-1"))
    }

    fn emit_key_set(&self, kinds: &[Option<ScalarKind>], keys: &Value) -> TokenStream {
        let mut source = TokenStream::new();
        source
            .push(Token::Raw("json_each(".into()))
            .push(Token::Param(keys.clone()))
            .rparen();

        helpers::emit_key_set_select(
            kinds.len(),
            |i| {
                let mut ts = TokenStream::new();
                ts.push(Token::Raw("json_extract(".into()))
                    .append(&helpers::key_set_value())
                    .push(Token::Raw(format!(", '$[{}]')", i)));
                ts
            },
            source,
        )
    }
}
