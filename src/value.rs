//! Scalar values flowing through the engine.
//!
//! The same [`Value`] type is used for argument values supplied by the
//! client, for bound statement parameters, and for cells of fetched rows.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single row returned by a statement, positionally matching its select list.
pub type Row = Vec<Value>;

/// Scalar kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Integer,
    String,
    Date,
    Float,
    Boolean,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Integer => "integer",
            ScalarKind::String => "string",
            ScalarKind::Date => "date",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A scalar value.
///
/// Dates serialize as `YYYY-MM-DD`. Incoming dates arrive as text and are
/// coerced with [`Value::coerce`] once the target column kind is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    #[serde(skip_deserializing)]
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert this value to the given scalar kind.
    ///
    /// `Null` passes through unchanged. Returns a description of the mismatch
    /// when the value cannot represent the kind.
    pub fn coerce(self, kind: ScalarKind) -> Result<Value, String> {
        match (kind, self) {
            (_, Value::Null) => Ok(Value::Null),

            (ScalarKind::Integer, Value::Int(n)) => Ok(Value::Int(n)),
            (ScalarKind::Integer, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            (ScalarKind::Integer, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
            (ScalarKind::Integer, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{}' is not an integer", s)),

            (ScalarKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (ScalarKind::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
            (ScalarKind::Float, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("'{}' is not a number", s)),

            (ScalarKind::String, Value::Text(s)) => Ok(Value::Text(s)),
            (ScalarKind::String, Value::Int(n)) => Ok(Value::Text(n.to_string())),
            (ScalarKind::String, Value::Float(f)) => Ok(Value::Text(f.to_string())),
            (ScalarKind::String, Value::Date(d)) => Ok(Value::Text(d.to_string())),
            (ScalarKind::String, Value::Bool(b)) => Ok(Value::Text(b.to_string())),

            (ScalarKind::Date, Value::Date(d)) => Ok(Value::Date(d)),
            // Timestamps stored as text keep their date prefix.
            (ScalarKind::Date, Value::Text(s)) => s
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
                .map(Value::Date)
                .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", s)),

            (ScalarKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ScalarKind::Boolean, Value::Int(0)) => Ok(Value::Bool(false)),
            (ScalarKind::Boolean, Value::Int(1)) => Ok(Value::Bool(true)),
            (ScalarKind::Boolean, Value::Text(s)) => match s.as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", s)),
            },

            (kind, other) => Err(format!("{} is not a valid {}", other, kind)),
        }
    }

    /// The hashable grouping form of this value. `Null` never matches a key.
    pub fn key_part(&self) -> Option<KeyPart> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::Int(n) => Some(KeyPart::Int(*n)),
            Value::Float(f) => Some(KeyPart::Float(f.to_bits())),
            Value::Text(s) => Some(KeyPart::Text(s.clone())),
            Value::Date(d) => Some(KeyPart::Date(*d)),
        }
    }

    /// The grouping form of this value after conversion to `kind`.
    ///
    /// Both sides of a relation must hash the same way even when the
    /// database hands back different storage classes for them (an INTEGER
    /// parent key against a TEXT foreign key). A value that does not convert
    /// keeps its fetched form.
    pub fn key_part_as(&self, kind: Option<ScalarKind>) -> Option<KeyPart> {
        match kind {
            Some(kind) if !self.is_null() => match self.clone().coerce(kind) {
                Ok(v) => v.key_part(),
                Err(_) => self.key_part(),
            },
            _ => self.key_part(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// One component of a grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Date(NaiveDate),
}

impl KeyPart {
    fn to_json(&self) -> serde_json::Value {
        match self {
            KeyPart::Bool(b) => serde_json::Value::Bool(*b),
            KeyPart::Int(n) => serde_json::Value::from(*n),
            KeyPart::Float(bits) => serde_json::Value::from(f64::from_bits(*bits)),
            KeyPart::Text(s) => serde_json::Value::String(s.clone()),
            KeyPart::Date(d) => serde_json::Value::String(d.to_string()),
        }
    }
}

/// A full (possibly composite) grouping key.
pub type Key = Vec<KeyPart>;

/// Encode a key set as one bindable value: a JSON array with one array of
/// components per key, e.g. `[[1,"x"],[2,"y"]]`.
pub fn encode_key_set(keys: &[Key]) -> Value {
    let rows: Vec<serde_json::Value> = keys
        .iter()
        .map(|key| serde_json::Value::Array(key.iter().map(KeyPart::to_json).collect()))
        .collect();
    Value::Text(serde_json::Value::Array(rows).to_string())
}
