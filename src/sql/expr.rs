//! Expression AST - the predicate and projection language of emitted statements.
//!
//! Expressions are dialect-agnostic. Client values only ever enter an
//! expression as [`Expr::Param`], which renders as a bound placeholder.

use super::token::{Token, TokenStream};
use crate::value::{ScalarKind, Value};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Bound parameter.
    Param(Value),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// IN: expr IN (values...)
    In { expr: Box<Expr>, values: Vec<Expr> },

    /// Membership in a key set bound as a single parameter:
    /// `(a, b) IN (SELECT ... FROM <keys>)`.
    ///
    /// `keys` holds a JSON array of key tuples (see
    /// [`encode_key_set`](crate::value::encode_key_set)); each dialect
    /// spells the row source for it. The statement text and parameter count
    /// do not grow with the number of keys.
    InKeySet {
        columns: Vec<Expr>,
        kinds: Vec<Option<ScalarKind>>,
        keys: Value,
    },

    /// IS NULL
    IsNull(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    And,
    Like,
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Param(value) => {
                ts.push(Token::Param(value.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens());
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens());
            }

            Expr::In { expr, values } => {
                // "x IN ()" is invalid SQL; an empty list matches nothing.
                if values.is_empty() {
                    ts.push(Token::LitInt(1))
                        .space()
                        .push(Token::Ne)
                        .space()
                        .push(Token::LitInt(1));
                } else {
                    ts.append(&expr.to_tokens());
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens());
                    }
                    ts.rparen();
                }
            }

            Expr::InKeySet {
                columns,
                kinds,
                keys,
            } => {
                if let [column] = columns.as_slice() {
                    ts.append(&column.to_tokens());
                } else {
                    ts.lparen();
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&column.to_tokens());
                    }
                    ts.rparen();
                }
                ts.space().push(Token::In).space().lparen();
                ts.push(Token::KeySet {
                    kinds: kinds.clone(),
                    keys: keys.clone(),
                });
                ts.rparen();
            }

            Expr::IsNull(expr) => {
                ts.append(&expr.to_tokens());
                ts.space();
                ts.push(Token::IsNull);
            }
        }

        ts
    }

    /// Fold expressions into a left-nested `AND` chain.
    ///
    /// Returns `None` for an empty input.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(|acc, e| acc.and(e))
    }

    /// Collect bound values in the order they will be rendered.
    pub fn params(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut Vec<Value>) {
        match self {
            Expr::Column { .. } => {}
            Expr::Param(v) => out.push(v.clone()),
            Expr::BinaryOp { left, right, .. } => {
                left.collect_params(out);
                right.collect_params(out);
            }
            Expr::IsNull(expr) => expr.collect_params(out),
            Expr::In { expr, values } => {
                if !values.is_empty() {
                    expr.collect_params(out);
                    for v in values {
                        v.collect_params(out);
                    }
                }
            }
            Expr::InKeySet { columns, keys, .. } => {
                for c in columns {
                    c.collect_params(out);
                }
                out.push(keys.clone());
            }
        }
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::And => Token::And,
        BinaryOperator::Like => Token::Like,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a qualified column reference (alias.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Create a bound parameter.
pub fn param(value: impl Into<Value>) -> Expr {
    Expr::Param(value.into())
}

// =============================================================================
// Fluent API
// =============================================================================

/// Extension trait for fluent expression building.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::And, other.into())
    }

    fn like(self, pattern: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Like, pattern.into())
    }

    #[allow(clippy::wrong_self_convention)]
    fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self.into_expr()))
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
        }
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Param(v)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        param(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        param(n)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        param(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        param(b)
    }
}

// =============================================================================
// Tests
// =============================================================================
