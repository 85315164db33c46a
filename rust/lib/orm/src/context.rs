use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-call settings such as `lang`, `tz` or `active_test`.
///
/// Record sets carry a context; deriving a record set with a modified
/// context never affects the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Context(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Truthiness of a key: missing, `false`, `null`, `0` and `""` are false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(hexya_core::cast_to_integer)
    }

    pub fn with_key(&self, key: &str, value: impl Into<Value>) -> Context {
        let mut map = self.0.clone();
        map.insert(key.to_string(), value.into());
        Context(map)
    }

    pub fn without_key(&self, key: &str) -> Context {
        let mut map = self.0.clone();
        map.remove(key);
        Context(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_and_truthiness() {
        let ctx: Context = serde_json::from_value(json!({
            "lang": "en_US",
            "active_test": false,
            "uid": 1,
            "tz": "",
        }))
        .unwrap();
        assert_eq!(ctx.get_str("lang"), "en_US");
        assert_eq!(ctx.get_str("missing"), "");
        assert!(!ctx.get_bool("active_test"));
        assert!(!ctx.get_bool("tz"));
        assert!(ctx.get_bool("uid"));
        assert_eq!(ctx.get_i64("uid"), Some(1));
    }

    #[test]
    fn derived_contexts_are_independent() {
        let base = Context::new().with_key("lang", "fr_FR");
        let derived = base.with_key("skip_check_constraints", true);
        assert!(!base.get_bool("skip_check_constraints"));
        assert!(derived.get_bool("skip_check_constraints"));
        assert!(!derived.without_key("skip_check_constraints").get_bool("skip_check_constraints"));
        assert_eq!(derived.get_str("lang"), "fr_FR");
    }
}
