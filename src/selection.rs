//! Client selection trees.
//!
//! A request names a root entity, its arguments and a tree of [`QueryNode`]s.
//! The wire format is the transport's business; these types deserialize from
//! a plain JSON tree:
//!
//! ```json
//! {
//!   "entity": "Case",
//!   "arguments": {"id": 1},
//!   "selections": [
//!     {"name": "case_name"},
//!     {"name": "citations", "selections": [{"name": "citation"}]}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Named argument values.
pub type Arguments = BTreeMap<String, ArgValue>;

/// An argument value: a scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    List(Vec<Value>),
    Scalar(Value),
}

impl ArgValue {
    /// The values as a list; a scalar becomes a one-element list.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            ArgValue::List(values) => values,
            ArgValue::Scalar(v) => vec![v],
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ArgValue::Scalar(v) => Some(v),
            ArgValue::List(_) => None,
        }
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Scalar(v)
    }
}

impl From<Vec<Value>> for ArgValue {
    fn from(values: Vec<Value>) -> Self {
        ArgValue::List(values)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Scalar(Value::Int(n))
    }
}

impl From<i32> for ArgValue {
    fn from(n: i32) -> Self {
        ArgValue::Scalar(Value::from(n))
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Scalar(Value::from(s))
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Scalar(Value::Text(s))
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Scalar(Value::Bool(b))
    }
}

/// One requested field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub name: String,
    /// Response key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<QueryNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
}

impl QueryNode {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn select(mut self, selections: Vec<QueryNode>) -> Self {
        self.selections = selections;
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Key of this field in the response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A complete selection request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub entity: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,
    #[serde(default)]
    pub selections: Vec<QueryNode>,
}

impl Request {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn select(mut self, selections: Vec<QueryNode>) -> Self {
        self.selections = selections;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
