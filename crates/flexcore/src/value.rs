use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dynamic value carried on task inputs and outputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    /// Opaque id of a run-scoped resource such as an open browser page.
    Handle(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&str> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Null and blank strings are what the editor leaves behind for an
    /// input the user never filled in.
    pub fn is_unset(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Handle(_) => "handle",
        }
    }

    /// Plain JSON view of the value, used when a task hands data to an
    /// external service.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Handle(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Json(j) => j.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Inverse of [`Value::to_json`] for untagged JSON coming from the
    /// editor or the command line.
    pub fn from_plain_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_plain_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_plain_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_strings_are_unset() {
        assert!(Value::Null.is_unset());
        assert!(Value::from("   ").is_unset());
        assert!(!Value::from("SELECT 1").is_unset());
        assert!(!Value::Number(0.0).is_unset());
    }

    #[test]
    fn plain_json_conversion_keeps_structure() {
        let value = Value::from_plain_json(json!({"name": "a", "tags": [1, true]}));
        match &value {
            Value::Object(map) => {
                assert_eq!(map.get("name"), Some(&Value::from("a")));
                assert_eq!(
                    map.get("tags"),
                    Some(&Value::Array(vec![Value::Number(1.0), Value::Bool(true)]))
                );
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(value.to_json(), json!({"name": "a", "tags": [1.0, true]}));
    }
}
