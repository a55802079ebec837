use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

/// Values tree fed to the renderer and shown in values dumps.
///
/// Decoded YAML may carry non-string mapping keys; they are stringified on
/// conversion so every mapping here is keyed by `String`. Mappings are kept
/// sorted, which is also the order a values dump prints them in.
///
/// # Examples
///
/// ```rust
/// use chartcheck::value::Value;
/// let v = Value::from_yaml_str("replicas: 2\n1: one").unwrap();
/// assert_eq!(v.get("1"), Some(&Value::String("one".to_string())));
/// assert_eq!(v.type_name(), "Mapping");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// An empty mapping.
    pub fn mapping() -> Self {
        Value::Mapping(BTreeMap::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Sequence(_) => "Sequence",
            Value::Mapping(_) => "Mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Parses a single YAML document. An empty document is `Null`.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        let raw: serde_yaml::Value = serde_yaml::from_str(text)?;
        Ok(Value::from(raw))
    }

    /// Serializes as block-style YAML without surrounding whitespace.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        Ok(serde_yaml::to_string(self)?.trim().to_string())
    }

    /// Merges `overrides` on top of `self` the way Helm coalesces user values
    /// over chart defaults: nested mappings merge key by key, an explicit null
    /// removes the key, and anything else replaces the default.
    pub fn coalesce(&self, overrides: &Value) -> Value {
        match (self, overrides) {
            (Value::Mapping(defaults), Value::Mapping(overrides)) => {
                let mut merged = defaults.clone();
                for (key, value) in overrides {
                    match (merged.get(key), value) {
                        (_, Value::Null) => {
                            merged.remove(key);
                        }
                        (Some(default @ Value::Mapping(_)), Value::Mapping(_)) => {
                            let value = default.coalesce(value);
                            merged.insert(key.clone(), value);
                        }
                        (Some(Value::Mapping(_)), other) => {
                            warn!(key = %key, found = other.type_name(), "overwriting table with non-table value");
                            merged.insert(key.clone(), value.clone());
                        }
                        _ => {
                            merged.insert(key.clone(), value.clone());
                        }
                    }
                }
                Value::Mapping(merged)
            }
            (defaults, Value::Null) => defaults.clone(),
            (_, overrides) => overrides.clone(),
        }
    }
}

/// Renders a YAML key as the string Helm would see.
fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => key_to_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(raw: serde_yaml::Value) -> Self {
        match raw {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => Value::Number(n),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(i.into())
                } else if let Some(u) = n.as_u64() {
                    Value::Number(u.into())
                } else {
                    Value::Number(n.as_f64().unwrap_or(f64::NAN).into())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}
