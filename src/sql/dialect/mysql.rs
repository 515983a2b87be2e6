//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Unnumbered `?` placeholders
//! - OFFSET requires a LIMIT; the documented idiom is the maximum u64
//! - Key sets unpack through `JSON_TABLE`, which needs typed columns

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};
use crate::value::{ScalarKind, Value};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn placeholder(&self, position: usize) -> String {
        helpers::placeholder_question(position)
    }

    fn emit_limit_offset(&self, limit: Option<&Value>, offset: Option<&Value>) -> TokenStream {
        helpers::emit_limit_offset_bound(limit, offset, Some("18446744073709551615"))
    }

    fn emit_key_set(&self, kinds: &[Option<ScalarKind>], keys: &Value) -> TokenStream {
        let mut source = TokenStream::new();
        source
            .push(Token::Raw("JSON_TABLE(".into()))
            .push(Token::Param(keys.clone()))
            .push(Token::Raw(", '$[*]' COLUMNS (".into()));
        for (i, kind) in kinds.iter().enumerate() {
            if i > 0 {
                source.comma().space();
            }
            source
                .push(Token::Ident(format!("k{}", i)))
                .push(Token::Raw(format!(" {} PATH '$[{}]'", column_type(*kind), i)));
        }
        source.rparen().rparen();

        helpers::emit_key_set_select(
            kinds.len(),
            |i| {
                let mut ts = TokenStream::new();
                ts.push(Token::Ident(helpers::KEY_SET_ALIAS.into()))
                    .push(Token::Dot)
                    .push(Token::Ident(format!("k{}", i)));
                ts
            },
            source,
        )
    }
}

fn column_type(kind: Option<ScalarKind>) -> &'static str {
    match kind {
        Some(ScalarKind::Integer) => "BIGINT",
        Some(ScalarKind::Float) => "DOUBLE",
        Some(ScalarKind::Date) => "DATE",
        Some(ScalarKind::Boolean) => "BOOLEAN",
        Some(ScalarKind::String) | None => "VARCHAR(512)",
    }
}
