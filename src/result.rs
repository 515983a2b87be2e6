//! Result trees and the response envelope.
//!
//! A result tree mirrors the selection tree: objects keep their fields in
//! selection order, relations hold an object, `null` or a list.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::value::Value;

/// A node of the result tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ResultValue {
    Null,
    Scalar(Value),
    Object(ResultObject),
    List(Vec<ResultValue>),
}

impl ResultValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ResultValue::Null | ResultValue::Scalar(Value::Null))
    }

    pub fn as_object(&self) -> Option<&ResultObject> {
        match self {
            ResultValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ResultValue]> {
        match self {
            ResultValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ResultValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Field `key` of an object; `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.as_object()?.get(key)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// An object with fields in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultObject {
    fields: Vec<(String, ResultValue)>,
}

impl ResultObject {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ResultValue) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ResultObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Either `{"data": ...}` or `{"error": {"kind", "message"}}`, never both.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Response {
    Data { data: ResultValue },
    Error { error: ErrorBody },
}

impl Response {
    pub fn from_result(result: EngineResult<ResultValue>) -> Self {
        match result {
            Ok(data) => Response::Data { data },
            Err(err) => err.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<EngineError> for Response {
    fn from(err: EngineError) -> Self {
        Response::Error {
            error: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
