//! The data bag handed to a component.

use anyhow::bail;
use serde_json::{Map, Value};

/// Named values a component was created with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentData {
    values: Map<String, Value>,
}

impl ComponentData {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Build from any JSON value; non-objects give an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.values.get(key).cloned().unwrap_or_else(|| default.into())
    }

    /// String value of `key`, if it holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// The value of `key`, or an error naming the missing key.
    pub fn require(&self, key: &str) -> anyhow::Result<&Value> {
        match self.values.get(key) {
            Some(value) => Ok(value),
            None => bail!("missing required data '{}'", key),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> ComponentData {
        ComponentData::from_value(json!({"title": "Hello", "count": 3}))
    }

    #[test]
    fn typed_accessors() {
        let data = data();
        assert_eq!(data.get("count"), Some(&json!(3)));
        assert_eq!(data.get_str("title"), Some("Hello"));
        assert_eq!(data.get_str("count"), None);
        assert_eq!(data.get_or("kind", "info"), json!("info"));
        assert!(data.has("title"));
        assert!(!data.has("kind"));
    }

    #[test]
    fn require_names_missing_key() {
        let err = data().require("kind").unwrap_err();
        assert_eq!(err.to_string(), "missing required data 'kind'");
        assert!(data().require("title").is_ok());
    }

    #[test]
    fn set_and_remove() {
        let mut data = data();
        data.set("kind", "warning");
        assert_eq!(data.get_str("kind"), Some("warning"));
        assert_eq!(data.remove("kind"), Some(json!("warning")));
        assert!(!data.has("kind"));
    }

    #[test]
    fn non_object_is_empty() {
        assert_eq!(ComponentData::from_value(json!([1, 2])), ComponentData::default());
    }
}
