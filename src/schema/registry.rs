//! Two-phase entity registration and by-name lookup.
//!
//! Shells (name, table, key) are registered first so that relations may
//! reference entities whose fields are not attached yet, including the
//! entity itself. `build()` validates every relation and freezes the result.

use std::collections::HashMap;

use tracing::debug;

use super::entity::{ArgumentHandlers, EntityType, Field};
use crate::error::{EngineError, EngineResult};

/// Collects entity shells and their fields before validation.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity shell. Any fields already on it are kept.
    pub fn register(&mut self, shell: EntityType) -> EngineResult<&mut Self> {
        if self.index.contains_key(&shell.name) {
            return Err(EngineError::InvalidSchema(format!(
                "entity '{}' is registered twice",
                shell.name
            )));
        }
        if shell.key.is_empty() {
            return Err(EngineError::InvalidSchema(format!(
                "entity '{}' declares no key columns",
                shell.name
            )));
        }
        self.index.insert(shell.name.clone(), self.entities.len());
        self.entities.push(shell);
        Ok(self)
    }

    /// Append fields to a registered shell.
    pub fn attach_fields(
        &mut self,
        entity: &str,
        fields: impl IntoIterator<Item = Field>,
    ) -> EngineResult<&mut Self> {
        let idx = self.slot(entity)?;
        self.entities[idx].fields.extend(fields);
        Ok(self)
    }

    /// Set the handlers used when `entity` is the root of a request.
    pub fn attach_lookups(
        &mut self,
        entity: &str,
        lookups: ArgumentHandlers,
    ) -> EngineResult<&mut Self> {
        let idx = self.slot(entity)?;
        self.entities[idx].lookups = lookups;
        Ok(self)
    }

    fn slot(&self, entity: &str) -> EngineResult<usize> {
        self.index
            .get(entity)
            .copied()
            .ok_or_else(|| EngineError::UnknownEntity(entity.to_string()))
    }

    /// Validate all entities and freeze the registry.
    pub fn build(self) -> EngineResult<SchemaRegistry> {
        let registry = SchemaRegistry {
            entities: self.entities,
            index: self.index,
        };
        registry.validate()?;
        debug!(entities = registry.entities.len(), "schema registry built");
        Ok(registry)
    }
}

/// Immutable, validated set of entity types.
///
/// Shared read-only across requests (typically behind an `Arc`).
#[derive(Debug)]
pub struct SchemaRegistry {
    entities: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up an entity by name.
    pub fn resolve(&self, name: &str) -> EngineResult<&EntityType> {
        self.index
            .get(name)
            .map(|&idx| &self.entities[idx])
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
