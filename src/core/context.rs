use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value checkpoint state persisted with a job or step execution.
///
/// The engine saves and restores the context around chunk commits but never
/// interprets its entries; each reader owns the keys it needs to make its
/// position resumable. Values are JSON values so any serializable checkpoint
/// token fits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    entries: BTreeMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionContext;

    #[test]
    fn typed_accessors_return_what_was_put() {
        let mut ctx = ExecutionContext::new();
        ctx.put("position", 42);
        ctx.put("file", "input.csv");
        ctx.put("headers_seen", true);

        assert_eq!(ctx.get_u64("position"), Some(42));
        assert_eq!(ctx.get_i64("position"), Some(42));
        assert_eq!(ctx.get_str("file"), Some("input.csv"));
        assert_eq!(ctx.get_bool("headers_seen"), Some(true));
        assert_eq!(ctx.get_u64("missing"), None);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn survives_a_serde_round_trip() {
        let mut ctx = ExecutionContext::new();
        ctx.put("offset", 1280);
        ctx.put("segment", "2024-q3");

        let blob = serde_json::to_string(&ctx).unwrap();
        let restored: ExecutionContext = serde_json::from_str(&blob).unwrap();
        assert_eq!(restored, ctx);
    }
}
