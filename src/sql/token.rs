//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize to
//! dialect-specific strings. Bound values travel as [`Token::Param`] and are
//! replaced by placeholders when a stream is rendered, so argument values never
//! appear in SQL text.

use super::dialect::{Dialect, SqlDialect};
use crate::value::{ScalarKind, Value};

/// SQL Token - every element the emitter can produce.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    As,
    On,
    Join,
    Inner,
    Left,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    In,
    Like,
    IsNull,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Qualified identifier: schema.table or just table
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    /// Integer literal
    LitInt(i64),
    /// Bound parameter, rendered as a dialect placeholder
    Param(Value),
    /// Row source over a key set bound as one JSON parameter; the dialect
    /// chooses the spelling.
    KeySet {
        kinds: Vec<Option<ScalarKind>>,
        keys: Value,
    },

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass user input to this variant.** Only use with trusted,
    /// static SQL fragments. Client-supplied values go through
    /// [`Token::Param`].
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    ///
    /// `Param` tokens need a position and are handled by
    /// [`TokenStream::render`]; serialized on their own they use position 1.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::In => "IN".into(),
            Token::Like => "LIKE".into(),
            Token::IsNull => "IS NULL".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),

            // Whitespace
            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { schema, name } => match schema {
                Some(s) => format!(
                    "{}.{}",
                    dialect.quote_identifier(s),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Token::LitInt(n) => n.to_string(),
            Token::Param(_) => dialect.placeholder(1),
            Token::KeySet { kinds, keys } => dialect.emit_key_set(kinds, keys).serialize(dialect),

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that can be rendered to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Render to SQL text plus the bound values in placeholder order.
    ///
    /// Placeholders are numbered by their position in the stream, so the
    /// parameter list always lines up with the text.
    pub fn render(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_into(dialect, &mut sql, &mut params);
        (sql, params)
    }

    fn render_into(&self, dialect: Dialect, sql: &mut String, params: &mut Vec<Value>) {
        for token in &self.tokens {
            match token {
                Token::Param(value) => {
                    params.push(value.clone());
                    sql.push_str(&dialect.placeholder(params.len()));
                }
                Token::KeySet { kinds, keys } => {
                    dialect
                        .emit_key_set(kinds, keys)
                        .render_into(dialect, sql, params);
                }
                other => sql.push_str(&other.serialize(dialect)),
            }
        }
    }

    /// Render to SQL text only.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.render(dialect).0
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
