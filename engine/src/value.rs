//! Field values.
//!
//! A record field is a closed tagged value: [`FieldValue::Null`], a
//! [`Scalar`], a nested object, or a list. Validation produces these from raw
//! JSON, the update engine merges them, and the query evaluator compares them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Field map of a record or nested object, ordered by key.
pub type Fields = BTreeMap<String, FieldValue>;

/// A scalar leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Numeric view of the scalar, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Name of the scalar's runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "Boolean",
            Scalar::Int(_) => "Int",
            Scalar::Float(_) => "Float",
            Scalar::String(_) => "String",
        }
    }

    /// Value-based comparison.
    ///
    /// Integers and floats compare by numeric value, so `Int(1)` equals
    /// `Float(1.0)`. Scalars of unrelated kinds are incomparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Rank used to order scalars of different kinds: booleans, numbers, strings.
    pub(crate) fn kind_rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::String(_) => 3,
        }
    }
}

/// A field value of any shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum FieldValue {
    Null,
    Scalar(Scalar),
    Object(Fields),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Shorthand for a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::String(s.into()))
    }

    /// Shorthand for an integer scalar.
    pub fn int(i: i64) -> Self {
        FieldValue::Scalar(Scalar::Int(i))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            FieldValue::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Name of the value's runtime shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "Null",
            FieldValue::Scalar(s) => s.kind_name(),
            FieldValue::Object(_) => "Object",
            FieldValue::List(_) => "List",
        }
    }

    /// Convert into the JSON representation.
    ///
    /// Non-finite floats have no JSON form and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            FieldValue::Scalar(Scalar::Int(i)) => Value::from(*i),
            FieldValue::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            FieldValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FieldValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
        }
    }
}

impl From<&serde_json::Value> for FieldValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Scalar(Scalar::Int(i)),
                None => FieldValue::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => FieldValue::Scalar(Scalar::String(s.clone())),
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::from(&value)
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        value.to_json()
    }
}

/// Convert a field map into a JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Map<String, serde_json::Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}
