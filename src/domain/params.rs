//! Nested execution parameters.
//!
//! Parameters are a JSON object tree. Paths use `.` as separator, so
//! `solver.tolerance` addresses `{"solver": {"tolerance": ...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReplicatorError, Result};

/// A nested parameter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value, which must be an object (or null for empty).
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ReplicatorError::Plan(format!(
                "parameters must be a mapping, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Look up the value at a dotted path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set the value at a dotted path, creating intermediate objects.
    ///
    /// A non-object value sitting on an intermediate segment is replaced.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.0;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value);
    }

    /// Top-level keys and values.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Mutable access to the top-level map.
    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Compact JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_object() {
        let params = Params::from_value(json!({"a": 1})).unwrap();
        assert_eq!(params.get_path("a"), Some(&json!(1)));
    }

    #[test]
    fn test_from_value_null_is_empty() {
        let params = Params::from_value(Value::Null).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_from_value_rejects_scalar() {
        let err = Params::from_value(json!(3)).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_get_nested_path() {
        let params = Params::from_value(json!({"solver": {"tol": 0.1, "name": "cg"}})).unwrap();
        assert_eq!(params.get_path("solver.tol"), Some(&json!(0.1)));
        assert_eq!(params.get_path("solver.name"), Some(&json!("cg")));
        assert_eq!(params.get_path("solver.missing"), None);
        assert_eq!(params.get_path("solver.tol.deeper"), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut params = Params::new();
        params.set_path("a.b.c", json!(true));
        assert_eq!(params.clone().into_value(), json!({"a": {"b": {"c": true}}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut params = Params::from_value(json!({"a": 5})).unwrap();
        params.set_path("a.b", json!("x"));
        assert_eq!(params.get_path("a.b"), Some(&json!("x")));
    }

    #[test]
    fn test_serde_is_transparent() {
        let params = Params::from_value(json!({"k": [1, 2]})).unwrap();
        assert_eq!(params.to_json().unwrap(), r#"{"k":[1,2]}"#);
        let back: Params = serde_json::from_str(r#"{"k":[1,2]}"#).unwrap();
        assert_eq!(back, params);
    }
}
