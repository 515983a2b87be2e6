//! Plan execution.
//!
//! Levels run in waves by depth: every level in a wave has its parent
//! grouped before the wave starts, and the statements of a wave run
//! concurrently, bounded by the pool. The first failing statement fails the
//! request; rows already fetched are discarded.

pub mod assemble;
mod backend;
mod error;
pub mod pool;
pub mod sqlite;

use std::collections::HashMap;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, info};

pub use assemble::{assemble, LevelRows};
pub use backend::{Connection, ConnectionManager};
pub use error::{DbError, DbResult};
pub use pool::{Pool, PoolConfig, PooledConnection};
pub use sqlite::{SqliteConnection, SqliteManager};

use crate::error::{EngineError, EngineResult};
use crate::planner::join_resolver::{collect_keys, group_rows, LevelState};
use crate::planner::{LevelId, QueryPlan};
use crate::result::ResultValue;
use crate::sql::{Emitter, Statement};
use crate::value::{Key, Row};

/// The assembled tree and the statements that produced it, in issue order.
#[derive(Debug, Clone)]
pub struct Executed {
    pub data: ResultValue,
    pub statements: Vec<Statement>,
}

/// Run `plan` against `pool` and assemble the result tree.
pub async fn execute<M: ConnectionManager>(
    plan: &QueryPlan,
    emitter: &Emitter,
    pool: &Pool<M>,
) -> EngineResult<Executed> {
    let started = Instant::now();
    let mut fetched: Vec<LevelRows> = vec![LevelRows::default(); plan.levels.len()];
    let mut states = vec![LevelState::Planned; plan.levels.len()];
    let mut statements = Vec::new();

    for wave in plan.waves() {
        let mut jobs: Vec<(LevelId, Statement)> = Vec::with_capacity(wave.len());

        for id in wave {
            let keys = level_keys(plan, &fetched, &states, id);
            advance(&mut states, id, LevelState::KeysCollected);

            if keys.as_ref().is_some_and(Vec::is_empty) {
                debug!(level = id, "no parent keys, skipping level");
                advance(&mut states, id, LevelState::Fetched);
                advance(&mut states, id, LevelState::Grouped);
                continue;
            }
            jobs.push((id, emitter.emit(plan.level(id), keys.as_deref())));
        }

        let results = try_join_all(
            jobs.iter()
                .map(|(id, stmt)| run(pool, *id, plan.level(*id).columns.len(), stmt)),
        )
        .await?;

        for ((id, stmt), rows) in jobs.into_iter().zip(results) {
            advance(&mut states, id, LevelState::Fetched);
            let level = plan.level(id);
            let groups = if level.is_root() {
                HashMap::new()
            } else {
                group_rows(&rows, &level.group_slots, &level.key_kinds)
            };
            fetched[id] = LevelRows { rows, groups };
            advance(&mut states, id, LevelState::Grouped);
            statements.push(stmt);
        }
    }

    let data = assemble(plan, &fetched);
    info!(
        entity = %plan.entity,
        levels = plan.levels.len(),
        statements = statements.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "executed request"
    );
    Ok(Executed { data, statements })
}

/// Parent key set for a deferred level; `None` for the root.
fn level_keys(
    plan: &QueryPlan,
    fetched: &[LevelRows],
    states: &[LevelState],
    id: LevelId,
) -> Option<Vec<Key>> {
    let level = plan.level(id);
    let parent = level.parent()?;
    debug_assert_eq!(states[parent], LevelState::Grouped);
    let slots = plan.parent_slots(id).unwrap_or_default();
    Some(collect_keys(&fetched[parent].rows, slots, &level.key_kinds))
}

fn advance(states: &mut [LevelState], id: LevelId, to: LevelState) {
    debug_assert_eq!(states[id].next(), Some(to));
    states[id] = to;
}

async fn run<M: ConnectionManager>(
    pool: &Pool<M>,
    level: LevelId,
    width: usize,
    stmt: &Statement,
) -> EngineResult<Vec<Row>> {
    let mut conn = pool.acquire().await?;
    let rows = conn
        .query(&stmt.sql, &stmt.params)
        .await
        .map_err(|cause| EngineError::Execution { level, cause })?;

    if let Some(row) = rows.iter().find(|r| r.len() != width) {
        return Err(EngineError::Execution {
            level,
            cause: DbError::ColumnMismatch {
                expected: width,
                actual: row.len(),
            },
        });
    }
    Ok(rows)
}
