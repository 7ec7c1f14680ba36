// ── Typed field values ──
//
// Every normalized record stores one of four scalar shapes. Raw JSON
// values are folded into these at the engine boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single typed value inside a [`Record`](super::Record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Fold a raw JSON value into a field value.
    ///
    /// `null` has no representation and yields `None`. Arrays and objects
    /// are kept as their compact JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(
                n.as_i64()
                    .map(Self::Int)
                    .unwrap_or_else(|| Self::Float(n.as_f64().unwrap_or_default())),
            ),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Some(Self::Text(value.to_string())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats truncate toward zero; text must parse.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view. Text must parse as a number.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_json_folds_scalars() {
        assert_eq!(FieldValue::from_json(&json!(null)), None);
        assert_eq!(FieldValue::from_json(&json!(true)), Some(FieldValue::Bool(true)));
        assert_eq!(FieldValue::from_json(&json!(42)), Some(FieldValue::Int(42)));
        assert_eq!(FieldValue::from_json(&json!(2.5)), Some(FieldValue::Float(2.5)));
        assert_eq!(
            FieldValue::from_json(&json!("sda")),
            Some(FieldValue::Text("sda".into()))
        );
        assert_eq!(
            FieldValue::from_json(&json!([1, 2])),
            Some(FieldValue::Text("[1,2]".into()))
        );
    }

    #[test]
    fn numeric_views_parse_text() {
        assert_eq!(FieldValue::from("4000787030016").as_i64(), Some(4_000_787_030_016));
        assert_eq!(FieldValue::from(" 12.5 ").as_f64(), Some(12.5));
        assert_eq!(FieldValue::from("unknown").as_f64(), None);
        assert_eq!(FieldValue::Float(-3.9).as_i64(), Some(-3));
        assert_eq!(FieldValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn serializes_untagged() {
        let encoded = serde_json::to_value(FieldValue::Float(25.0)).expect("serializable");
        assert_eq!(encoded, json!(25.0));
        let encoded = serde_json::to_value(FieldValue::from("ext4")).expect("serializable");
        assert_eq!(encoded, json!("ext4"));
    }
}
