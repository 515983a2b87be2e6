//! Argument-driven predicates.
//!
//! Handlers are evaluated in declared order and the first one whose argument
//! is present applies; later ones are ignored. Values are coerced to the
//! filtered column's kind and always enter the expression as bound parameters.

use crate::error::{EngineError, EngineResult};
use crate::schema::{ArgumentFilter, ArgumentHandlers, EntityType, FilterMode, FilterOp};
use crate::selection::{ArgValue, Arguments};
use crate::sql::expr::{param, table_col, Expr, ExprExt};
use crate::value::Value;

/// The handler that applies to `args`, if any.
pub fn select_handler<'h>(
    handlers: &'h ArgumentHandlers,
    args: &Arguments,
) -> Option<&'h ArgumentFilter> {
    handlers
        .handlers
        .iter()
        .find(|h| args.contains_key(&h.argument))
}

/// Build the filter for `field` over `target` rows bound to `alias`.
///
/// Fails with `MissingFilterArgument` when the handlers are required and no
/// handler argument is present.
pub fn build_predicate(
    field: &str,
    target: &EntityType,
    handlers: &ArgumentHandlers,
    alias: &str,
    args: &Arguments,
) -> EngineResult<Option<Expr>> {
    let Some(handler) = select_handler(handlers, args) else {
        return match handlers.mode {
            FilterMode::Required if !handlers.is_empty() => {
                Err(EngineError::MissingFilterArgument {
                    field: field.to_string(),
                    expected: handlers.argument_names(),
                })
            }
            _ => Ok(None),
        };
    };

    let kind = target.column_kind(&handler.column).ok_or_else(|| {
        EngineError::InvalidSchema(format!(
            "column '{}' of '{}' has no scalar kind",
            handler.column, target.name
        ))
    })?;
    let coerce = |v: Value| {
        v.coerce(kind)
            .map_err(|msg| EngineError::invalid_argument(&handler.argument, msg))
    };

    let column = table_col(alias, &handler.column);
    let value = args
        .get(&handler.argument)
        .cloned()
        .unwrap_or(ArgValue::Scalar(Value::Null));

    let expr = match handler.op {
        FilterOp::Eq => match single(&handler.argument, value)? {
            Value::Null => column.is_null(),
            v => column.eq(param(coerce(v)?)),
        },
        FilterOp::Like => {
            let pattern = single(&handler.argument, value)?;
            if pattern.is_null() {
                return Err(EngineError::invalid_argument(
                    &handler.argument,
                    "a pattern is required",
                ));
            }
            let pattern = pattern
                .coerce(crate::value::ScalarKind::String)
                .map_err(|msg| EngineError::invalid_argument(&handler.argument, msg))?;
            column.like(param(pattern))
        }
        FilterOp::In => {
            let mut values = Vec::new();
            for v in value.into_list() {
                if v.is_null() {
                    return Err(EngineError::invalid_argument(
                        &handler.argument,
                        "list members must not be null",
                    ));
                }
                values.push(param(coerce(v)?));
            }
            column.in_list(values)
        }
    };

    Ok(Some(expr))
}

fn single(argument: &str, value: ArgValue) -> EngineResult<Value> {
    match value {
        ArgValue::Scalar(v) => Ok(v),
        ArgValue::List(_) => Err(EngineError::invalid_argument(
            argument,
            "expected a single value, got a list",
        )),
    }
}
