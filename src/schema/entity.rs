//! Entity and relation descriptors.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sql::expr::{table_col, Expr, ExprExt};
use crate::value::ScalarKind;

// =============================================================================
// Entity Type
// =============================================================================

/// A registered entity: a backing table plus its ordered field descriptors.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub table: String,
    /// Column(s) forming the row identity.
    pub key: Vec<String>,
    pub fields: Vec<Field>,
    /// Handlers applied when this entity is the root of a request.
    pub lookups: ArgumentHandlers,
}

impl EntityType {
    /// An entity shell with no fields attached yet.
    pub fn shell(name: impl Into<String>, table: impl Into<String>, key: Vec<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            key,
            fields: Vec::new(),
            lookups: ArgumentHandlers::default(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.descriptor)
    }

    /// Scalar kind of a column, if a scalar field is declared over it.
    pub fn column_kind(&self, column: &str) -> Option<ScalarKind> {
        self.fields.iter().find_map(|f| match &f.descriptor {
            FieldDescriptor::Scalar { column: c, kind } if c == column => Some(*kind),
            _ => None,
        })
    }

    /// Column and kind of the scalar field called `name`.
    pub fn scalar_named(&self, name: &str) -> Option<(&str, ScalarKind)> {
        match self.field(name)? {
            FieldDescriptor::Scalar { column, kind } => Some((column.as_str(), *kind)),
            FieldDescriptor::Relation(_) => None,
        }
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.fields.iter().filter_map(|f| match &f.descriptor {
            FieldDescriptor::Relation(r) => Some((f.name.as_str(), r)),
            FieldDescriptor::Scalar { .. } => None,
        })
    }
}

/// A named field on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
}

impl Field {
    pub fn scalar(name: impl Into<String>, column: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            descriptor: FieldDescriptor::Scalar {
                column: column.into(),
                kind,
            },
        }
    }

    pub fn relation(name: impl Into<String>, relation: Relation) -> Self {
        Self {
            name: name.into(),
            descriptor: FieldDescriptor::Relation(relation),
        }
    }
}

/// What a field resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDescriptor {
    Scalar {
        column: String,
        #[serde(rename = "type")]
        kind: ScalarKind,
    },
    Relation(Relation),
}

// =============================================================================
// Relations
// =============================================================================

/// Whether a relation yields one object or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    #[default]
    Many,
}

/// A relation to another entity. The target is resolved by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub target: String,
    pub strategy: RelationStrategy,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "ArgumentHandlers::is_empty")]
    pub handlers: ArgumentHandlers,
}

impl Relation {
    /// Single-valued relation inlined into the parent statement.
    pub fn direct(target: impl Into<String>, on: JoinCondition) -> Self {
        Self {
            target: target.into(),
            strategy: RelationStrategy::DirectJoin { on },
            cardinality: Cardinality::One,
            handlers: ArgumentHandlers::default(),
        }
    }

    /// Children whose `child_column` equals the parent's `parent_column`.
    pub fn batched(
        target: impl Into<String>,
        child_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            strategy: RelationStrategy::BatchedOneToMany {
                child_column: child_column.into(),
                parent_column: parent_column.into(),
            },
            cardinality: Cardinality::Many,
            handlers: ArgumentHandlers::default(),
        }
    }

    /// Many-to-many through `table`.
    pub fn junction(
        target: impl Into<String>,
        table: impl Into<String>,
        parent_leg: JoinCondition,
        child_leg: JoinCondition,
    ) -> Self {
        Self {
            target: target.into(),
            strategy: RelationStrategy::Junction {
                table: table.into(),
                parent_leg,
                child_leg,
                fields: Vec::new(),
            },
            cardinality: Cardinality::Many,
            handlers: ArgumentHandlers::default(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_handlers(mut self, handlers: ArgumentHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Expose a junction column on the child's projected row.
    pub fn with_junction_field(mut self, field: JunctionField) -> Self {
        if let RelationStrategy::Junction { fields, .. } = &mut self.strategy {
            fields.push(field);
        }
        self
    }
}

/// How a relation's rows are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationStrategy {
    /// LEFT JOIN into the parent statement. `left` is the parent, `right` the child.
    DirectJoin { on: JoinCondition },
    /// Separate statement keyed by the parent's `parent_column` values.
    BatchedOneToMany {
        child_column: String,
        parent_column: String,
    },
    /// Parent leg: (parent, junction). Child leg: (junction, child).
    Junction {
        table: String,
        parent_leg: JoinCondition,
        child_leg: JoinCondition,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<JunctionField>,
    },
}

/// A junction-table column exposed as a field of the child object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionField {
    pub name: String,
    pub column: String,
    #[serde(rename = "type")]
    pub kind: ScalarKind,
}

impl JunctionField {
    pub fn new(name: impl Into<String>, column: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            kind,
        }
    }
}

// =============================================================================
// Join Conditions
// =============================================================================

/// Which alias of a (left, right) pair a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// A column on one side of a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub side: Side,
    pub column: String,
}

impl ColumnRef {
    pub fn left(column: impl Into<String>) -> Self {
        Self {
            side: Side::Left,
            column: column.into(),
        }
    }

    pub fn right(column: impl Into<String>) -> Self {
        Self {
            side: Side::Right,
            column: column.into(),
        }
    }
}

/// `a = b`, with the operands in either order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equality {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl Equality {
    pub fn new(a: ColumnRef, b: ColumnRef) -> Self {
        Self { left: a, right: b }
    }

    /// `(left column, right column)`, or `None` when both operands name the same side.
    pub fn normalized(&self) -> Option<(&str, &str)> {
        match (self.left.side, self.right.side) {
            (Side::Left, Side::Right) => Some((&self.left.column, &self.right.column)),
            (Side::Right, Side::Left) => Some((&self.right.column, &self.left.column)),
            _ => None,
        }
    }
}

/// Genuinely dynamic join predicate over `(left alias, right alias)`.
///
/// Implementations build expressions from column references; values, if any,
/// must enter as bound parameters.
pub trait JoinPredicate: Send + Sync {
    fn predicate(&self, left_alias: &str, right_alias: &str) -> Expr;
}

impl<F> JoinPredicate for F
where
    F: Fn(&str, &str) -> Expr + Send + Sync,
{
    fn predicate(&self, left_alias: &str, right_alias: &str) -> Expr {
        self(left_alias, right_alias)
    }
}

/// A join condition between two aliases.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinCondition {
    /// Conjunction of column equalities.
    Equalities(Vec<Equality>),
    /// Not serializable; build in code.
    #[serde(skip)]
    Custom(Arc<dyn JoinPredicate>),
}

impl JoinCondition {
    /// `left.l = right.r AND ...` for each `(l, r)` pair.
    pub fn on(pairs: &[(&str, &str)]) -> Self {
        JoinCondition::Equalities(
            pairs
                .iter()
                .map(|(l, r)| Equality::new(ColumnRef::left(*l), ColumnRef::right(*r)))
                .collect(),
        )
    }

    pub fn custom(predicate: impl JoinPredicate + 'static) -> Self {
        JoinCondition::Custom(Arc::new(predicate))
    }

    /// Normalized `(left column, right column)` pairs for an equality conjunction.
    ///
    /// `None` for custom predicates, empty conjunctions, or an equality whose
    /// operands both name the same side.
    pub fn column_pairs(&self) -> Option<Vec<(&str, &str)>> {
        match self {
            JoinCondition::Equalities(eqs) if !eqs.is_empty() => {
                eqs.iter().map(Equality::normalized).collect()
            }
            _ => None,
        }
    }

    /// Render the condition for a concrete alias pair.
    pub fn to_expr(&self, left_alias: &str, right_alias: &str) -> Option<Expr> {
        match self {
            JoinCondition::Equalities(_) => {
                let pairs = self.column_pairs()?;
                Expr::and_all(pairs.into_iter().map(|(l, r)| {
                    table_col(left_alias, l).eq(table_col(right_alias, r))
                }))
            }
            JoinCondition::Custom(p) => Some(p.predicate(left_alias, right_alias)),
        }
    }
}

impl fmt::Debug for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::Equalities(eqs) => f.debug_tuple("Equalities").field(eqs).finish(),
            JoinCondition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// =============================================================================
// Argument Handlers
// =============================================================================

/// Comparison applied by an argument filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Eq,
    Like,
    In,
}

/// Maps a client argument onto a column predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentFilter {
    pub argument: String,
    pub column: String,
    #[serde(default)]
    pub op: FilterOp,
}

impl ArgumentFilter {
    pub fn new(argument: impl Into<String>, column: impl Into<String>, op: FilterOp) -> Self {
        Self {
            argument: argument.into(),
            column: column.into(),
            op,
        }
    }
}

/// Whether at least one handler argument must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Required,
    #[default]
    Optional,
}

/// Ordered argument handlers; the first one present wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentHandlers {
    #[serde(default)]
    pub handlers: Vec<ArgumentFilter>,
    #[serde(default)]
    pub mode: FilterMode,
}

impl ArgumentHandlers {
    pub fn required(handlers: Vec<ArgumentFilter>) -> Self {
        Self {
            handlers,
            mode: FilterMode::Required,
        }
    }

    pub fn optional(handlers: Vec<ArgumentFilter>) -> Self {
        Self {
            handlers,
            mode: FilterMode::Optional,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn recognizes(&self, argument: &str) -> bool {
        self.handlers.iter().any(|h| h.argument == argument)
    }

    pub fn argument_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.argument.clone()).collect()
    }
}
