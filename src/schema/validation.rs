//! Validation of a registry before it is frozen.
//!
//! Checks, per entity:
//! - field names are unique
//! - every relation target is registered
//! - direct joins are single-valued and render to a predicate
//! - junction parent legs are plain equality conjunctions
//! - argument handlers filter declared scalar columns

use std::collections::HashSet;

use super::entity::{ArgumentHandlers, Cardinality, EntityType, RelationStrategy};
use super::registry::SchemaRegistry;
use crate::error::{EngineError, EngineResult};

impl SchemaRegistry {
    pub(super) fn validate(&self) -> EngineResult<()> {
        for entity in self.entities() {
            self.validate_entity(entity)?;
        }
        Ok(())
    }

    fn validate_entity(&self, entity: &EntityType) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for field in &entity.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!(
                    "field '{}' is declared twice on '{}'",
                    field.name, entity.name
                )));
            }
        }

        validate_handlers(entity, &entity.lookups, &entity.name)?;

        for (name, relation) in entity.relations() {
            let target = self.resolve(&relation.target)?;
            let path = format!("{}.{}", entity.name, name);

            match &relation.strategy {
                RelationStrategy::DirectJoin { on } => {
                    if relation.cardinality != Cardinality::One {
                        return Err(invalid(format!(
                            "'{}' is a direct join and must be single-valued",
                            path
                        )));
                    }
                    if on.to_expr("l", "r").is_none() {
                        return Err(invalid(format!(
                            "'{}' has an empty or one-sided join condition",
                            path
                        )));
                    }
                }
                RelationStrategy::BatchedOneToMany {
                    child_column,
                    parent_column,
                } => {
                    if child_column.is_empty() || parent_column.is_empty() {
                        return Err(invalid(format!("'{}' has an empty key column", path)));
                    }
                }
                RelationStrategy::Junction {
                    table,
                    parent_leg,
                    child_leg,
                    fields,
                } => {
                    if table.is_empty() {
                        return Err(invalid(format!("'{}' has no junction table", path)));
                    }
                    if parent_leg.column_pairs().is_none() {
                        return Err(invalid(format!(
                            "'{}' parent leg must be a conjunction of column equalities",
                            path
                        )));
                    }
                    if child_leg.to_expr("l", "r").is_none() {
                        return Err(invalid(format!(
                            "'{}' has an empty or one-sided child leg",
                            path
                        )));
                    }
                    for jf in fields {
                        if target.field(&jf.name).is_some() {
                            return Err(invalid(format!(
                                "junction field '{}' on '{}' shadows a field of '{}'",
                                jf.name, path, target.name
                            )));
                        }
                    }
                }
            }

            validate_handlers(target, &relation.handlers, &path)?;
        }

        Ok(())
    }
}

fn validate_handlers(
    target: &EntityType,
    handlers: &ArgumentHandlers,
    path: &str,
) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for handler in &handlers.handlers {
        if !seen.insert(handler.argument.as_str()) {
            return Err(invalid(format!(
                "argument '{}' is handled twice on '{}'",
                handler.argument, path
            )));
        }
        if target.column_kind(&handler.column).is_none() {
            return Err(invalid(format!(
                "argument '{}' on '{}' filters column '{}', which is not a scalar of '{}'",
                handler.argument, path, handler.column, target.name
            )));
        }
    }
    Ok(())
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidSchema(message)
}
