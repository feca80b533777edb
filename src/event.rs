// src/event.rs - Field store that flows through a filter chain
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding the raw input line
pub const MESSAGE_FIELD: &str = "message";

/// Field collecting failure markers
pub const TAGS_FIELD: &str = "tags";

/// How a write treats a field that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Later writes replace earlier values
    #[default]
    Allow,
    /// The first value written wins
    KeepFirst,
}

/// One record: an ordered map of field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: IndexMap<String, Value>,
}

impl Event {
    pub fn new(initial_fields: IndexMap<String, Value>) -> Self {
        Event {
            fields: initial_fields,
        }
    }

    /// Event seeded with the raw line under `message`
    pub fn from_message(line: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(MESSAGE_FIELD.to_string(), Value::String(line.into()));
        Event { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String value of a field, if it holds one
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Unconditional write
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Write honoring `policy`. Returns whether the value was stored.
    pub fn insert_with_policy(
        &mut self,
        field: impl Into<String>,
        value: Value,
        policy: OverwritePolicy,
    ) -> bool {
        let field = field.into();
        if policy == OverwritePolicy::KeepFirst && self.fields.contains_key(&field) {
            return false;
        }
        self.fields.insert(field, value);
        true
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Append `tag` to the `tags` array unless it is already there.
    /// A scalar `tags` value is turned into an array first.
    pub fn add_tag(&mut self, tag: &str) {
        let tags = self
            .fields
            .entry(TAGS_FIELD.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        if !tags.is_array() {
            let previous = tags.take();
            *tags = Value::Array(vec![previous]);
        }

        if let Value::Array(items) = tags {
            if !items.iter().any(|item| item.as_str() == Some(tag)) {
                items.push(Value::String(tag.to_string()));
            }
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        match self.fields.get(TAGS_FIELD) {
            Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(tag)),
            Some(Value::String(single)) => single == tag,
            _ => false,
        }
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Event as a JSON object, fields in insertion order
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_message() {
        let event = Event::from_message("hello");
        assert_eq!(event.get_str(MESSAGE_FIELD), Some("hello"));
        assert_eq!(event.len(), 1);
    }

    #[test]
    fn test_insert_with_policy() {
        let mut event = Event::default();
        assert!(event.insert_with_policy("a", json!(1), OverwritePolicy::Allow));
        assert!(event.insert_with_policy("a", json!(2), OverwritePolicy::Allow));
        assert_eq!(event.get("a"), Some(&json!(2)));

        assert!(!event.insert_with_policy("a", json!(3), OverwritePolicy::KeepFirst));
        assert_eq!(event.get("a"), Some(&json!(2)));

        assert!(event.insert_with_policy("b", json!(4), OverwritePolicy::KeepFirst));
        assert_eq!(event.get("b"), Some(&json!(4)));
    }

    #[test]
    fn test_add_tag() {
        let mut event = Event::default();
        event.add_tag("_grokparsefailure");
        event.add_tag("_grokparsefailure");
        event.add_tag("other");

        assert_eq!(event.get(TAGS_FIELD), Some(&json!(["_grokparsefailure", "other"])));
        assert!(event.has_tag("other"));
    }

    #[test]
    fn test_add_tag_to_scalar_tags() {
        let mut event = Event::default();
        event.set(TAGS_FIELD, json!("existing"));
        event.add_tag("new");
        assert_eq!(event.get(TAGS_FIELD), Some(&json!(["existing", "new"])));
    }

    #[test]
    fn test_to_json_preserves_order() {
        let mut event = Event::from_message("line");
        event.set("z", json!(1));
        event.set("a", json!(2));

        let text = serde_json::to_string(&event.to_json()).unwrap();
        assert_eq!(text, r#"{"message":"line","z":1,"a":2}"#);
    }
}
