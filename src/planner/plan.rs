//! Query plan types.
//!
//! A plan is an arena of levels. Each level renders to exactly one statement;
//! direct joins live inside their parent's level, batched and junction
//! relations start a new level that depends on its parent's key values.

use std::collections::BTreeMap;

use crate::schema::Cardinality;
use crate::sql::expr::{Expr, SortDir};
use crate::value::{ScalarKind, Value};

pub type LevelId = usize;

/// A projected or filtered column: `alias.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    pub alias: String,
    pub column: String,
}

impl ColumnSlot {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: ColumnSlot,
    pub dir: SortDir,
}

/// How a level's base rows are selected.
#[derive(Debug, Clone)]
pub enum LevelSource {
    /// The request root.
    Root {
        /// The applied lookup targets the entity's unique key.
        single: bool,
        limit: Option<Value>,
        offset: Option<Value>,
    },
    /// Children filtered by `child_column IN (parent keys)`.
    Batched { parent: LevelId },
    /// `junction INNER JOIN child`, filtered on the junction's parent-side columns.
    Junction {
        parent: LevelId,
        table: String,
        alias: String,
        child_on: Expr,
    },
}

/// A field of a planned object, in selection order.
#[derive(Debug, Clone)]
pub enum PlanField {
    Scalar {
        key: String,
        slot: usize,
        kind: ScalarKind,
    },
    /// Direct join inlined into the same statement.
    Joined {
        key: String,
        on: Expr,
        node: Box<PlanNode>,
    },
    /// Relation fetched by a separate level.
    Deferred {
        key: String,
        level: LevelId,
        cardinality: Cardinality,
        /// Slots in the current level holding the parent-side key values.
        parent_slots: Vec<usize>,
    },
}

impl PlanField {
    pub fn key(&self) -> &str {
        match self {
            PlanField::Scalar { key, .. }
            | PlanField::Joined { key, .. }
            | PlanField::Deferred { key, .. } => key,
        }
    }
}

/// An entity bound into a level under a unique alias.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub entity: String,
    pub table: String,
    pub alias: String,
    pub fields: Vec<PlanField>,
    /// Key slots used to tell an absent joined row from a present one.
    pub key_slots: Vec<usize>,
    pub predicate: Option<Expr>,
}

impl PlanNode {
    /// Direct-joined nodes in pre-order, with their ON conditions.
    pub fn joins(&self) -> Vec<(&PlanNode, &Expr)> {
        let mut out = Vec::new();
        self.collect_joins(&mut out);
        out
    }

    /// Parent key slots of the deferred field that opens level `id`.
    fn deferred_slots(&self, id: LevelId) -> Option<&[usize]> {
        self.fields.iter().find_map(|field| match field {
            PlanField::Deferred {
                level,
                parent_slots,
                ..
            } if *level == id => Some(parent_slots.as_slice()),
            PlanField::Joined { node, .. } => node.deferred_slots(id),
            _ => None,
        })
    }

    fn collect_joins<'a>(&'a self, out: &mut Vec<(&'a PlanNode, &'a Expr)>) {
        for field in &self.fields {
            if let PlanField::Joined { on, node, .. } = field {
                out.push((node.as_ref(), on));
                node.collect_joins(out);
            }
        }
    }
}

/// One statement's worth of planning.
#[derive(Debug, Clone)]
pub struct PlanLevel {
    pub id: LevelId,
    /// Number of deferred hops from the root.
    pub depth: usize,
    pub source: LevelSource,
    pub node: PlanNode,
    /// The select list, in slot order.
    pub columns: Vec<ColumnSlot>,
    /// Columns filtered by the parent key set (empty for the root).
    pub key_columns: Vec<ColumnSlot>,
    /// Declared kind of each key column, where the schema names one.
    pub key_kinds: Vec<Option<ScalarKind>>,
    /// Slots of `key_columns` in the select list, used to group rows.
    pub group_slots: Vec<usize>,
    pub order_by: Vec<OrderTerm>,
}

impl PlanLevel {
    pub fn parent(&self) -> Option<LevelId> {
        match &self.source {
            LevelSource::Root { .. } => None,
            LevelSource::Batched { parent } | LevelSource::Junction { parent, .. } => {
                Some(*parent)
            }
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.source, LevelSource::Root { .. })
    }
}

/// The full per-request plan. Level 0 is the root.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub entity: String,
    pub levels: Vec<PlanLevel>,
}

impl QueryPlan {
    pub fn root(&self) -> &PlanLevel {
        &self.levels[0]
    }

    pub fn level(&self, id: LevelId) -> &PlanLevel {
        &self.levels[id]
    }

    /// Whether the root yields a single object rather than a list.
    pub fn single_root(&self) -> bool {
        matches!(self.root().source, LevelSource::Root { single: true, .. })
    }

    /// Levels grouped by depth. Every level's parent is in an earlier wave.
    pub fn waves(&self) -> Vec<Vec<LevelId>> {
        let mut by_depth: BTreeMap<usize, Vec<LevelId>> = BTreeMap::new();
        for level in &self.levels {
            by_depth.entry(level.depth).or_default().push(level.id);
        }
        by_depth.into_values().collect()
    }

    /// Slots of the parent level that hold the key set for level `id`.
    pub fn parent_slots(&self, id: LevelId) -> Option<&[usize]> {
        let parent = self.level(id).parent()?;
        self.level(parent).node.deferred_slots(id)
    }

    pub fn children(&self, id: LevelId) -> impl Iterator<Item = &PlanLevel> {
        self.levels
            .iter()
            .filter(move |level| level.parent() == Some(id))
    }
}
