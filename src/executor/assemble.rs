//! Result tree assembly.
//!
//! Assembly walks the plan top-down from the root rows. Deferred relations
//! look up their members by the parent row's key in the child level's
//! grouping index; direct joins read their cells from the same row.

use std::collections::HashMap;

use tracing::warn;

use crate::planner::join_resolver::key_at;
use crate::planner::{PlanField, PlanNode, QueryPlan};
use crate::result::{ResultObject, ResultValue};
use crate::schema::Cardinality;
use crate::value::{Key, Row, ScalarKind, Value};

/// Fetched rows of one level and their grouping index.
#[derive(Debug, Clone, Default)]
pub struct LevelRows {
    pub rows: Vec<Row>,
    /// Row indices by group key, in fetch order.
    pub groups: HashMap<Key, Vec<usize>>,
}

/// Build the result tree. `levels` is indexed by level id.
pub fn assemble(plan: &QueryPlan, levels: &[LevelRows]) -> ResultValue {
    let root = plan.root();
    let rows = levels
        .get(root.id)
        .map(|l| l.rows.as_slice())
        .unwrap_or_default();

    if plan.single_root() {
        rows.first()
            .map(|row| ResultValue::Object(object(plan, levels, &root.node, row)))
            .unwrap_or(ResultValue::Null)
    } else {
        ResultValue::List(
            rows.iter()
                .map(|row| ResultValue::Object(object(plan, levels, &root.node, row)))
                .collect(),
        )
    }
}

fn object(plan: &QueryPlan, levels: &[LevelRows], node: &PlanNode, row: &Row) -> ResultObject {
    let mut obj = ResultObject::with_capacity(node.fields.len());

    for field in &node.fields {
        let value = match field {
            PlanField::Scalar { slot, kind, key } => {
                ResultValue::Scalar(scalar(row.get(*slot).cloned(), *kind, key))
            }

            // A LEFT JOIN miss leaves every key column null.
            PlanField::Joined { node, .. } => {
                let absent = node
                    .key_slots
                    .iter()
                    .all(|&s| row.get(s).map_or(true, Value::is_null));
                if absent {
                    ResultValue::Null
                } else {
                    ResultValue::Object(object(plan, levels, node, row))
                }
            }

            PlanField::Deferred {
                level,
                cardinality,
                parent_slots,
                ..
            } => {
                let child = plan.level(*level);
                let fetched = levels.get(*level);
                let members = fetched.and_then(|f| {
                    key_at(row, parent_slots, &child.key_kinds)
                        .and_then(|k| f.groups.get(&k))
                        .map(|idx| (f, idx))
                });
                let mut objects = members.into_iter().flat_map(move |(f, idx)| {
                    idx.iter().filter_map(move |&i| f.rows.get(i)).map(move |child_row| {
                        ResultValue::Object(object(plan, levels, &child.node, child_row))
                    })
                });
                match cardinality {
                    Cardinality::Many => ResultValue::List(objects.collect()),
                    Cardinality::One => objects.next().unwrap_or(ResultValue::Null),
                }
            }
        };
        obj.insert(field.key(), value);
    }

    obj
}

/// Normalize a fetched cell to its declared kind, keeping it as fetched when
/// it does not convert.
fn scalar(cell: Option<Value>, kind: ScalarKind, key: &str) -> Value {
    let cell = cell.unwrap_or(Value::Null);
    match cell.clone().coerce(kind) {
        Ok(v) => v,
        Err(message) => {
            warn!(field = key, %kind, %message, "returning unconverted value");
            cell
        }
    }
}
