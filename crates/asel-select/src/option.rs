//! Canonical option model and value identity.

use std::borrow::Borrow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical string identity of a selectable value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionKey(String);

impl OptionKey {
    /// Keys are never empty; `None` for blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        (!key.is_empty()).then_some(Self(key))
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        RawValue::from_json(value).and_then(|raw| raw.key())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for OptionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A selected or selectable value as supplied by the caller.
///
/// Stored as given so that a programmatic `42` stays numeric in [`crate::AsyncSelect::value`],
/// while identity is always decided through [`RawValue::key`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl RawValue {
    /// Scalars only; null, arrays and objects have no identity.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RawValue::Text(s.clone())),
            Value::Bool(b) => Some(RawValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(RawValue::Int(i)),
                None => match n.as_u64() {
                    Some(u) => Some(RawValue::Text(u.to_string())),
                    None => n.as_f64().map(RawValue::Float),
                },
            },
            _ => None,
        }
    }

    pub fn key(&self) -> Option<OptionKey> {
        match self {
            RawValue::Int(i) => OptionKey::new(i.to_string()),
            RawValue::Float(f) if f.is_finite() => OptionKey::new(f.to_string()),
            RawValue::Float(_) => None,
            RawValue::Bool(b) => OptionKey::new(b.to_string()),
            RawValue::Text(s) => OptionKey::new(s.as_str()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Int(i) => Value::from(*i),
            RawValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<&OptionKey> for RawValue {
    fn from(value: &OptionKey) -> Self {
        RawValue::Text(value.as_str().to_string())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(value.into())
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// A displayable, selectable entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl SelectOption {
    pub fn new(key: &OptionKey, label: impl Into<String>) -> Self {
        Self {
            value: key.as_str().to_string(),
            label: label.into(),
            image: None,
            group: None,
            disabled: false,
        }
    }

    /// Stand-in for a value nobody has labelled: the value is its own label.
    pub fn synthetic(key: &OptionKey) -> Self {
        Self::new(key, key.as_str())
    }

    pub fn key(&self) -> OptionKey {
        OptionKey(self.value.clone())
    }
}

/// Options keyed by identity, in first-seen order.
pub type OptionMap = IndexMap<OptionKey, SelectOption>;
