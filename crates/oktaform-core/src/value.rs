//! Dynamic custom profile attributes and write-only values.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ReconcileError, ReconcileResult};

/// Placeholder stored in state instead of a write-only value.
pub const REDACTED: &str = "REDACTED";

/// Value of a custom profile attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValue {
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<CustomValue>),
    Map(BTreeMap<String, CustomValue>),
}

/// Custom attributes keyed by attribute name, in sorted order.
pub type CustomAttributes = BTreeMap<String, CustomValue>;

impl CustomValue {
    /// Convert a JSON value. `null`, including nested nulls, is dropped.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => Some(Self::List(items.iter().filter_map(Self::from_json).collect())),
            Value::Object(map) => Some(Self::Map(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Compact JSON with sorted keys, the stored form of custom attributes.
#[must_use]
pub fn canonical_json(attributes: &CustomAttributes) -> String {
    let value = Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    );
    canonical_value(&value)
}

/// Serialize any JSON value with object keys sorted at every depth.
#[must_use]
pub fn canonical_value(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sort(v))).collect();
                Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Parse the declared custom attribute JSON object.
pub fn parse_custom_json(raw: &str) -> ReconcileResult<CustomAttributes> {
    if raw.trim().is_empty() {
        return Ok(CustomAttributes::new());
    }
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        ReconcileError::validation(
            "custom_profile_attributes",
            format!("not valid JSON: {e}"),
        )
    })?;
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(k, v)| CustomValue::from_json(v).map(|v| (k.clone(), v)))
            .collect()),
        other => Err(ReconcileError::validation(
            "custom_profile_attributes",
            format!("expected a JSON object, got {other}"),
        )),
    }
}

/// Whether two custom attribute documents are equal after normalising
/// whitespace and key order. Unparseable input falls back to string equality.
#[must_use]
pub fn semantically_equal(a: &str, b: &str) -> bool {
    match (parse_custom_json(a), parse_custom_json(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// A write-only input such as a password. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether this is the placeholder read back from state.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.0 == REDACTED
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}
