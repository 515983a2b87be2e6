//! Join resolution: how each relation level is fetched.
//!
//! - Direct joins become a LEFT JOIN in the parent's statement.
//! - Batched one-to-many and junction relations become their own level,
//!   filtered by the distinct parent keys in a single round trip.
//!
//! The key set is bound as a single parameter and unpacked by the dialect,
//! so the statement text stays the same size however many parent rows there
//! are. Composite keys compare as row values.
//!
//! Key cells are normalized to the key column's declared kind before they
//! are hashed, on the parent side and the child side alike.

use std::collections::{HashMap, HashSet};

use super::plan::ColumnSlot;
use crate::error::{EngineError, EngineResult};
use crate::schema::JoinCondition;
use crate::sql::expr::{table_col, Expr};
use crate::value::{encode_key_set, Key, Row, ScalarKind};

// =============================================================================
// Level State
// =============================================================================

/// Lifecycle of a plan level during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LevelState {
    Planned,
    /// Parent keys gathered (trivially for the root).
    KeysCollected,
    Fetched,
    /// Rows indexed by group key; children may now collect keys.
    Grouped,
}

impl LevelState {
    /// The only legal successor of this state.
    pub fn next(self) -> Option<LevelState> {
        match self {
            LevelState::Planned => Some(LevelState::KeysCollected),
            LevelState::KeysCollected => Some(LevelState::Fetched),
            LevelState::Fetched => Some(LevelState::Grouped),
            LevelState::Grouped => None,
        }
    }
}

// =============================================================================
// Relation Resolution
// =============================================================================

/// ON condition for a direct join from `parent_alias` to `child_alias`.
pub fn inline_join(on: &JoinCondition, parent_alias: &str, child_alias: &str) -> EngineResult<Expr> {
    on.to_expr(parent_alias, child_alias).ok_or_else(|| {
        EngineError::InvalidSchema("direct join has no usable condition".to_string())
    })
}

/// A junction relation bound to concrete aliases.
#[derive(Debug, Clone)]
pub struct JunctionLegs {
    /// Parent columns whose values form the key set.
    pub parent_columns: Vec<String>,
    /// Junction columns filtered by the key set, in the same order.
    pub junction_columns: Vec<String>,
    /// `junction JOIN child ON ...`
    pub child_on: Expr,
}

pub fn junction_legs(
    parent_leg: &JoinCondition,
    child_leg: &JoinCondition,
    junction_alias: &str,
    child_alias: &str,
) -> EngineResult<JunctionLegs> {
    let pairs = parent_leg.column_pairs().ok_or_else(|| {
        EngineError::InvalidSchema(
            "junction parent leg must be a conjunction of column equalities".to_string(),
        )
    })?;
    let child_on = child_leg
        .to_expr(junction_alias, child_alias)
        .ok_or_else(|| EngineError::InvalidSchema("junction child leg is empty".to_string()))?;

    let (parent_columns, junction_columns) = pairs
        .into_iter()
        .map(|(p, j)| (p.to_string(), j.to_string()))
        .unzip();

    Ok(JunctionLegs {
        parent_columns,
        junction_columns,
        child_on,
    })
}

// =============================================================================
// Key Sets
// =============================================================================

/// Distinct non-null keys read from `slots` of each row, in first-seen order.
pub fn collect_keys<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    slots: &[usize],
    kinds: &[Option<ScalarKind>],
) -> Vec<Key> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        if let Some(key) = key_at(row, slots, kinds) {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    keys
}

/// The key held in `slots` of `row`, or `None` if any component is null.
///
/// `kinds[i]` is the declared kind of component `i`, when known.
pub fn key_at(row: &Row, slots: &[usize], kinds: &[Option<ScalarKind>]) -> Option<Key> {
    slots
        .iter()
        .enumerate()
        .map(|(i, &slot)| row.get(slot)?.key_part_as(kinds.get(i).copied().flatten()))
        .collect()
}

/// Row indices grouped by the key in `slots`. Rows with a null key are dropped.
pub fn group_rows(
    rows: &[Row],
    slots: &[usize],
    kinds: &[Option<ScalarKind>],
) -> HashMap<Key, Vec<usize>> {
    let mut groups: HashMap<Key, Vec<usize>> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if let Some(key) = key_at(row, slots, kinds) {
            groups.entry(key).or_default().push(idx);
        }
    }
    groups
}

/// Membership filter of `columns` over `keys`. `None` when there are no keys.
pub fn key_filter(
    columns: &[ColumnSlot],
    kinds: &[Option<ScalarKind>],
    keys: &[Key],
) -> Option<Expr> {
    if keys.is_empty() || columns.is_empty() {
        return None;
    }
    Some(in_key_set(columns, kinds, keys))
}

/// The same filter over an empty key set, for displaying a level's
/// statement without concrete keys.
pub fn key_filter_template(columns: &[ColumnSlot], kinds: &[Option<ScalarKind>]) -> Option<Expr> {
    if columns.is_empty() {
        return None;
    }
    Some(in_key_set(columns, kinds, &[]))
}

fn in_key_set(columns: &[ColumnSlot], kinds: &[Option<ScalarKind>], keys: &[Key]) -> Expr {
    Expr::InKeySet {
        columns: columns
            .iter()
            .map(|c| table_col(&c.alias, &c.column))
            .collect(),
        kinds: (0..columns.len())
            .map(|i| kinds.get(i).copied().flatten())
            .collect(),
        keys: encode_key_set(keys),
    }
}
