//! Plan level emission.
//!
//! Each [`PlanLevel`] renders to exactly one SELECT. The select list is the
//! level's column slots in slot order, so the executor reads cells by
//! position. Deferred levels are filtered by the key set collected from
//! their parent; the whole key set is bound as one parameter, never inlined.

use tracing::debug;

use super::dialect::Dialect;
use super::expr::{table_col, Expr, ExprExt, SortDir};
use super::query::{OrderByExpr, Query, TableRef};
use crate::planner::join_resolver::{key_filter, key_filter_template};
use crate::planner::{LevelSource, PlanLevel, QueryPlan};
use crate::value::{Key, Value};

/// Rendered SQL text and its bound values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders plan levels for one dialect.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    dialect: Dialect,
    schema: Option<String>,
}

impl Emitter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            schema: None,
        }
    }

    /// Qualify every table with `schema`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn table(&self, table: &str, alias: &str) -> TableRef {
        TableRef::new(table)
            .with_schema(self.schema.as_deref())
            .with_alias(alias)
    }

    /// Build the SELECT for `level`.
    ///
    /// `keys` is the parent key set of a deferred level. `None` binds an
    /// empty key set instead, for display.
    pub fn build_query(&self, level: &PlanLevel, keys: Option<&[Key]>) -> Query {
        let node = &level.node;
        let columns: Vec<Expr> = level
            .columns
            .iter()
            .map(|c| table_col(&c.alias, &c.column))
            .collect();

        let mut query = Query::new().select(columns);

        query = match &level.source {
            LevelSource::Junction {
                table,
                alias,
                child_on,
                ..
            } => query
                .from(self.table(table, alias))
                .inner_join(self.table(&node.table, &node.alias), child_on.clone()),
            LevelSource::Root { .. } | LevelSource::Batched { .. } => {
                query.from(self.table(&node.table, &node.alias))
            }
        };

        for (joined, on) in node.joins() {
            query = query.left_join(self.table(&joined.table, &joined.alias), on.clone());
        }

        if !level.is_root() {
            let filter = match keys {
                Some([]) => level
                    .key_columns
                    .first()
                    .map(|c| table_col(&c.alias, &c.column).in_list(Vec::new())),
                Some(keys) => key_filter(&level.key_columns, &level.key_kinds, keys),
                None => key_filter_template(&level.key_columns, &level.key_kinds),
            };
            if let Some(filter) = filter {
                query = query.filter(filter);
            }
        }
        if let Some(predicate) = &node.predicate {
            query = query.filter(predicate.clone());
        }

        query = query.order_by(
            level
                .order_by
                .iter()
                .map(|term| {
                    let expr = table_col(&term.column.alias, &term.column.column);
                    match term.dir {
                        SortDir::Asc => OrderByExpr::asc(expr),
                        SortDir::Desc => OrderByExpr::desc(expr),
                    }
                })
                .collect(),
        );

        if let LevelSource::Root { limit, offset, .. } = &level.source {
            if let Some(limit) = limit {
                query = query.limit(limit.clone());
            }
            if let Some(offset) = offset {
                query = query.offset(offset.clone());
            }
        }

        query
    }

    /// Render `level` filtered by `keys`.
    pub fn emit(&self, level: &PlanLevel, keys: Option<&[Key]>) -> Statement {
        let (sql, params) = self.build_query(level, keys).render(self.dialect);
        debug!(
            level = level.id,
            dialect = %self.dialect,
            params = params.len(),
            sql = %sql,
            "emitted statement"
        );
        Statement { sql, params }
    }

    /// One statement per level, deferred levels shown over an empty key set.
    pub fn explain(&self, plan: &QueryPlan) -> Vec<Statement> {
        plan.levels.iter().map(|level| self.emit(level, None)).collect()
    }
}
