//! Selection planner: binds a selection tree to the registry.
//!
//! Planning is pure. It walks the selection tree once, projecting requested
//! scalars, inlining direct joins into the current level and opening a new
//! level for every batched or junction relation. All plan-time errors are
//! raised here, before any statement exists.
//!
//! # Reserved arguments
//!
//! - `first`, `offset`: pagination of the root list
//! - `order_by`: a scalar field name (or list of names) on the root or on a
//!   list-valued relation; a leading `-` sorts descending
//!
//! Every other argument must be declared by the field's handlers.

pub mod join_resolver;
pub mod plan;
pub mod predicate;

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

pub use plan::{
    ColumnSlot, LevelId, LevelSource, OrderTerm, PlanField, PlanLevel, PlanNode, QueryPlan,
};

use crate::error::{EngineError, EngineResult};
use crate::schema::{
    ArgumentHandlers, EntityType, FieldDescriptor, FilterOp, JunctionField, Relation,
    RelationStrategy, SchemaRegistry,
};
use crate::selection::{ArgValue, Arguments, QueryNode, Request};
use crate::sql::expr::{ExprExt, SortDir};
use crate::value::{ScalarKind, Value};

/// Default bound on selection nesting.
pub const DEFAULT_MAX_DEPTH: usize = 8;

const ARG_FIRST: &str = "first";
const ARG_OFFSET: &str = "offset";
const ARG_ORDER_BY: &str = "order_by";

/// Plans requests against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
}

impl<'r> Planner<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn plan_request(&self, request: &Request) -> EngineResult<QueryPlan> {
        self.plan(&request.entity, &request.selections, &request.arguments)
    }

    /// Plan `selections` on `root_entity` filtered by `args`.
    pub fn plan(
        &self,
        root_entity: &str,
        selections: &[QueryNode],
        args: &Arguments,
    ) -> EngineResult<QueryPlan> {
        let entity = self.registry.resolve(root_entity)?;
        let (args, reserved) = split_reserved(args, &[ARG_FIRST, ARG_OFFSET, ARG_ORDER_BY])?;
        check_arguments(&entity.name, &entity.lookups, &args)?;

        let limit = reserved
            .get(ARG_FIRST)
            .map(|v| non_negative(ARG_FIRST, v))
            .transpose()?;
        let offset = reserved
            .get(ARG_OFFSET)
            .map(|v| non_negative(ARG_OFFSET, v))
            .transpose()?;
        let single = predicate::select_handler(&entity.lookups, &args).is_some_and(|h| {
            h.op == FilterOp::Eq && entity.key.len() == 1 && entity.key[0] == h.column
        });

        let mut ctx = PlanContext::default();
        let mut draft = LevelDraft::new(ctx.reserve_level(), 0);
        let alias = ctx.alias(&entity.table);
        let filter =
            predicate::build_predicate(&entity.name, entity, &entity.lookups, &alias, &args)?;

        let mut node = self.plan_node(&mut ctx, &mut draft, entity, alias, selections, None)?;
        node.predicate = filter;
        let order_by = order_terms(entity, &node.alias, reserved.get(ARG_ORDER_BY))?;

        ctx.finish(
            draft,
            LevelParts {
                source: LevelSource::Root {
                    single,
                    limit,
                    offset,
                },
                node,
                key_columns: Vec::new(),
                key_kinds: Vec::new(),
                group_slots: Vec::new(),
                order_by,
            },
        );

        let plan = ctx.into_plan(&entity.name);
        debug!(entity = %entity.name, levels = plan.levels.len(), "planned request");
        Ok(plan)
    }

    /// Plan the fields of one entity occurrence into `draft`.
    ///
    /// `junction` carries the junction alias and its exposed fields when the
    /// entity is reached through a junction relation.
    fn plan_node(
        &self,
        ctx: &mut PlanContext,
        draft: &mut LevelDraft,
        entity: &EntityType,
        alias: String,
        selections: &[QueryNode],
        junction: Option<(&str, &[JunctionField])>,
    ) -> EngineResult<PlanNode> {
        let mut keys_seen = HashSet::new();
        let mut fields = Vec::with_capacity(selections.len());

        for sel in selections {
            let key = sel.response_key().to_string();
            if !keys_seen.insert(key.clone()) {
                return Err(EngineError::invalid_argument(
                    &key,
                    format!("response key '{}' appears twice on '{}'", key, entity.name),
                ));
            }

            let field = match entity.field(&sel.name) {
                Some(FieldDescriptor::Scalar { column, kind }) => {
                    scalar_only(sel)?;
                    PlanField::Scalar {
                        key,
                        slot: draft.slot(&alias, column),
                        kind: *kind,
                    }
                }
                Some(FieldDescriptor::Relation(relation)) => {
                    if sel.selections.is_empty() {
                        return Err(EngineError::invalid_argument(
                            &sel.name,
                            "a relation requires a sub-selection",
                        ));
                    }
                    self.plan_relation(ctx, draft, entity, &alias, sel, key, relation)?
                }
                None => {
                    let (j_alias, jf) = junction
                        .and_then(|(j_alias, jfields)| {
                            jfields
                                .iter()
                                .find(|f| f.name == sel.name)
                                .map(|f| (j_alias, f))
                        })
                        .ok_or_else(|| EngineError::unknown_field(&entity.name, &sel.name))?;
                    scalar_only(sel)?;
                    PlanField::Scalar {
                        key,
                        slot: draft.slot(j_alias, &jf.column),
                        kind: jf.kind,
                    }
                }
            };
            fields.push(field);
        }

        Ok(PlanNode {
            entity: entity.name.clone(),
            table: entity.table.clone(),
            alias,
            fields,
            key_slots: Vec::new(),
            predicate: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_relation(
        &self,
        ctx: &mut PlanContext,
        draft: &mut LevelDraft,
        parent: &EntityType,
        parent_alias: &str,
        sel: &QueryNode,
        key: String,
        relation: &Relation,
    ) -> EngineResult<PlanField> {
        let target = self.registry.resolve(&relation.target)?;
        let (args, reserved) = split_reserved(&sel.arguments, &[ARG_ORDER_BY])?;
        check_arguments(&sel.name, &relation.handlers, &args)?;
        let order_arg = reserved.get(ARG_ORDER_BY);

        match &relation.strategy {
            RelationStrategy::DirectJoin { on } => {
                if order_arg.is_some() {
                    return Err(EngineError::invalid_argument(
                        ARG_ORDER_BY,
                        format!("'{}' is single-valued and cannot be ordered", sel.name),
                    ));
                }
                let child_alias = ctx.alias(&target.table);
                let mut on = join_resolver::inline_join(on, parent_alias, &child_alias)?;
                if let Some(filter) = predicate::build_predicate(
                    &sel.name,
                    target,
                    &relation.handlers,
                    &child_alias,
                    &args,
                )? {
                    on = on.and(filter);
                }
                let mut node =
                    self.plan_node(ctx, draft, target, child_alias, &sel.selections, None)?;
                node.key_slots = target
                    .key
                    .iter()
                    .map(|k| draft.slot(&node.alias, k))
                    .collect();
                Ok(PlanField::Joined {
                    key,
                    on,
                    node: Box::new(node),
                })
            }

            RelationStrategy::BatchedOneToMany {
                child_column,
                parent_column,
            } => {
                let parent_slots = vec![draft.slot(parent_alias, parent_column)];
                let mut child = self.open_level(ctx, draft, &sel.name)?;
                let child_alias = ctx.alias(&target.table);
                let key_columns = vec![ColumnSlot::new(&child_alias, child_column)];
                let key_kinds = vec![parent
                    .column_kind(parent_column)
                    .or_else(|| target.column_kind(child_column))];
                let group_slots = child.slots(&key_columns);

                let filter = predicate::build_predicate(
                    &sel.name,
                    target,
                    &relation.handlers,
                    &child_alias,
                    &args,
                )?;
                let mut node =
                    self.plan_node(ctx, &mut child, target, child_alias, &sel.selections, None)?;
                node.predicate = filter;
                let order_by = order_terms(target, &node.alias, order_arg)?;

                let level = child.id;
                ctx.finish(
                    child,
                    LevelParts {
                        source: LevelSource::Batched { parent: draft.id },
                        node,
                        key_columns,
                        key_kinds,
                        group_slots,
                        order_by,
                    },
                );
                Ok(PlanField::Deferred {
                    key,
                    level,
                    cardinality: relation.cardinality,
                    parent_slots,
                })
            }

            RelationStrategy::Junction {
                table,
                parent_leg,
                child_leg,
                fields,
            } => {
                let mut child = self.open_level(ctx, draft, &sel.name)?;
                let junction_alias = ctx.alias(table);
                let child_alias = ctx.alias(&target.table);
                let legs = join_resolver::junction_legs(
                    parent_leg,
                    child_leg,
                    &junction_alias,
                    &child_alias,
                )?;

                let parent_slots = legs
                    .parent_columns
                    .iter()
                    .map(|c| draft.slot(parent_alias, c))
                    .collect();
                let key_columns: Vec<ColumnSlot> = legs
                    .junction_columns
                    .iter()
                    .map(|c| ColumnSlot::new(&junction_alias, c))
                    .collect();
                let key_kinds = legs
                    .parent_columns
                    .iter()
                    .zip(&legs.junction_columns)
                    .map(|(p, j)| {
                        parent.column_kind(p).or_else(|| {
                            fields.iter().find(|f| &f.column == j).map(|f| f.kind)
                        })
                    })
                    .collect();
                let group_slots = child.slots(&key_columns);

                let filter = predicate::build_predicate(
                    &sel.name,
                    target,
                    &relation.handlers,
                    &child_alias,
                    &args,
                )?;
                let mut node = self.plan_node(
                    ctx,
                    &mut child,
                    target,
                    child_alias,
                    &sel.selections,
                    Some((&junction_alias, fields)),
                )?;
                node.predicate = filter;
                let order_by = order_terms(target, &node.alias, order_arg)?;

                let level = child.id;
                ctx.finish(
                    child,
                    LevelParts {
                        source: LevelSource::Junction {
                            parent: draft.id,
                            table: table.clone(),
                            alias: junction_alias,
                            child_on: legs.child_on,
                        },
                        node,
                        key_columns,
                        key_kinds,
                        group_slots,
                        order_by,
                    },
                );
                Ok(PlanField::Deferred {
                    key,
                    level,
                    cardinality: relation.cardinality,
                    parent_slots,
                })
            }
        }
    }

    /// Start a deferred level below `parent`, enforcing `max_depth`.
    fn open_level(
        &self,
        ctx: &mut PlanContext,
        parent: &LevelDraft,
        field: &str,
    ) -> EngineResult<LevelDraft> {
        let depth = parent.depth + 1;
        if depth > self.max_depth {
            return Err(EngineError::invalid_argument(
                field,
                format!(
                    "selection nesting exceeds the maximum depth of {}",
                    self.max_depth
                ),
            ));
        }
        Ok(LevelDraft::new(ctx.reserve_level(), depth))
    }
}

// =============================================================================
// Planning State
// =============================================================================

/// The select list of the level being planned.
#[derive(Debug)]
struct LevelDraft {
    id: LevelId,
    depth: usize,
    columns: Vec<ColumnSlot>,
}

impl LevelDraft {
    fn new(id: LevelId, depth: usize) -> Self {
        Self {
            id,
            depth,
            columns: Vec::new(),
        }
    }

    /// Slot of `alias.column`, projecting it on first use.
    fn slot(&mut self, alias: &str, column: &str) -> usize {
        if let Some(pos) = self
            .columns
            .iter()
            .position(|c| c.alias == alias && c.column == column)
        {
            return pos;
        }
        self.columns.push(ColumnSlot::new(alias, column));
        self.columns.len() - 1
    }

    fn slots(&mut self, columns: &[ColumnSlot]) -> Vec<usize> {
        columns
            .iter()
            .map(|c| self.slot(&c.alias, &c.column))
            .collect()
    }
}

/// Plan-wide counters and finished levels.
#[derive(Debug, Default)]
struct PlanContext {
    next_level: LevelId,
    next_alias: usize,
    levels: BTreeMap<LevelId, PlanLevel>,
}

impl PlanContext {
    /// Reserve the next level id; levels are numbered in pre-order.
    fn reserve_level(&mut self) -> LevelId {
        let id = self.next_level;
        self.next_level += 1;
        id
    }

    /// Fresh, plan-unique alias for a table occurrence.
    fn alias(&mut self, table: &str) -> String {
        let alias = format!("{}_{}", table, self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn finish(&mut self, draft: LevelDraft, level: LevelParts) {
        self.levels.insert(
            draft.id,
            PlanLevel {
                id: draft.id,
                depth: draft.depth,
                source: level.source,
                node: level.node,
                columns: draft.columns,
                key_columns: level.key_columns,
                key_kinds: level.key_kinds,
                group_slots: level.group_slots,
                order_by: level.order_by,
            },
        );
    }

    fn into_plan(self, entity: &str) -> QueryPlan {
        QueryPlan {
            entity: entity.to_string(),
            levels: self.levels.into_values().collect(),
        }
    }
}

/// Everything of a level except its select list.
struct LevelParts {
    source: LevelSource,
    node: PlanNode,
    key_columns: Vec<ColumnSlot>,
    key_kinds: Vec<Option<ScalarKind>>,
    group_slots: Vec<usize>,
    order_by: Vec<OrderTerm>,
}

// =============================================================================
// Arguments
// =============================================================================

/// Separate reserved arguments from handler arguments.
fn split_reserved(
    args: &Arguments,
    allowed: &[&str],
) -> EngineResult<(Arguments, BTreeMap<String, ArgValue>)> {
    let mut plain = Arguments::new();
    let mut reserved = BTreeMap::new();
    for (name, value) in args {
        if [ARG_FIRST, ARG_OFFSET, ARG_ORDER_BY].contains(&name.as_str()) {
            if !allowed.contains(&name.as_str()) {
                return Err(EngineError::invalid_argument(
                    name,
                    format!("'{}' is only accepted on the request root", name),
                ));
            }
            reserved.insert(name.clone(), value.clone());
        } else {
            plain.insert(name.clone(), value.clone());
        }
    }
    Ok((plain, reserved))
}

/// Reject arguments no handler declares.
fn check_arguments(field: &str, handlers: &ArgumentHandlers, args: &Arguments) -> EngineResult<()> {
    match args.keys().find(|name| !handlers.recognizes(name)) {
        Some(name) => Err(EngineError::UnknownArgument {
            field: field.to_string(),
            argument: name.clone(),
        }),
        None => Ok(()),
    }
}

fn scalar_only(sel: &QueryNode) -> EngineResult<()> {
    if let Some(name) = sel.arguments.keys().next() {
        return Err(EngineError::UnknownArgument {
            field: sel.name.clone(),
            argument: name.clone(),
        });
    }
    if !sel.selections.is_empty() {
        return Err(EngineError::invalid_argument(
            &sel.name,
            "a scalar field takes no sub-selection",
        ));
    }
    Ok(())
}

fn non_negative(argument: &str, value: &ArgValue) -> EngineResult<Value> {
    let v = value
        .as_scalar()
        .cloned()
        .ok_or_else(|| EngineError::invalid_argument(argument, "expected an integer"))?
        .coerce(ScalarKind::Integer)
        .map_err(|msg| EngineError::invalid_argument(argument, msg))?;
    match v {
        Value::Int(n) if n >= 0 => Ok(v),
        _ => Err(EngineError::invalid_argument(
            argument,
            "expected a non-negative integer",
        )),
    }
}

/// Explicit ordering followed by the entity key, so output is deterministic.
fn order_terms(
    entity: &EntityType,
    alias: &str,
    arg: Option<&ArgValue>,
) -> EngineResult<Vec<OrderTerm>> {
    let mut terms: Vec<OrderTerm> = Vec::new();

    if let Some(arg) = arg {
        for value in arg.clone().into_list() {
            let Value::Text(spec) = value else {
                return Err(EngineError::invalid_argument(
                    ARG_ORDER_BY,
                    "expected a field name",
                ));
            };
            let (name, dir) = match spec.strip_prefix('-') {
                Some(rest) => (rest, SortDir::Desc),
                None => (spec.as_str(), SortDir::Asc),
            };
            let (column, _) = entity.scalar_named(name).ok_or_else(|| {
                EngineError::invalid_argument(
                    ARG_ORDER_BY,
                    format!("'{}' is not a scalar field of '{}'", name, entity.name),
                )
            })?;
            terms.push(OrderTerm {
                column: ColumnSlot::new(alias, column),
                dir,
            });
        }
    }

    for key in &entity.key {
        if !terms.iter().any(|t| &t.column.column == key) {
            terms.push(OrderTerm {
                column: ColumnSlot::new(alias, key),
                dir: SortDir::Asc,
            });
        }
    }

    Ok(terms)
}
