//! Schema registry: entity types, relation descriptors and their lookup table.

mod def;
mod entity;
mod registry;
mod validation;

pub use def::{EntityDef, SchemaDef};
pub use entity::{
    ArgumentFilter, ArgumentHandlers, Cardinality, ColumnRef, EntityType, Equality, Field,
    FieldDescriptor, FilterMode, FilterOp, JoinCondition, JoinPredicate, JunctionField, Relation,
    RelationStrategy, Side,
};
pub use registry::{RegistryBuilder, SchemaRegistry};
