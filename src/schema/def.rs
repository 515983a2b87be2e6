//! Serializable registry description.
//!
//! Loaded from JSON by the CLI; custom join predicates cannot be expressed
//! here and are only available when building a registry in code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::entity::{ArgumentHandlers, EntityType, Field};
use super::registry::{RegistryBuilder, SchemaRegistry};
use crate::error::{EngineError, EngineResult};

/// One entity of a [`SchemaDef`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    pub key: Vec<String>,
    #[serde(default)]
    pub lookups: ArgumentHandlers,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A whole registry as data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDef {
    pub entities: Vec<EntityDef>,
}

impl SchemaDef {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidSchema(format!("malformed schema: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidSchema(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Register every shell, then attach fields and lookups, then validate.
    pub fn into_registry(self) -> EngineResult<SchemaRegistry> {
        let mut builder = RegistryBuilder::new();
        for def in &self.entities {
            builder.register(EntityType::shell(&def.name, &def.table, def.key.clone()))?;
        }
        for def in self.entities {
            builder.attach_fields(&def.name, def.fields)?;
            builder.attach_lookups(&def.name, def.lookups)?;
        }
        builder.build()
    }
}
