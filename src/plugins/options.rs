use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form per-scan options as received from the API layer. Adapters read
/// the keys they understand and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanOptions(Map<String, Value>);

impl ScanOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builds options from `key=value` pairs. Values that parse as JSON
    /// (`true`, `42`, `["a","b"]`) keep their type, anything else is a string.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Map::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("empty option name in '{}'", pair));
            }
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            map.insert(key.to_string(), value);
        }
        Ok(Self(map))
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn merge(&mut self, other: ScanOptions) {
        self.0.extend(other.0);
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Option rendered as a flag argument. Numbers are accepted where a tool
    /// expects text (`ports = 443`).
    pub fn text(&self, key: &str) -> Option<String> {
        match self.raw(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                Some(joined)
            }
            Value::Object(_) | Value::Null => None,
        }
    }

    /// Non-empty text option.
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.raw(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map_or(default, |n| n != 0),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => true,
                "false" | "no" | "off" | "0" | "" => false,
                _ => default,
            },
            _ => default,
        }
    }

    pub fn number(&self, key: &str) -> Option<u64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn number_or(&self, key: &str, default: u64) -> u64 {
        self.number(key).unwrap_or(default)
    }

    /// List option from a JSON array or a comma separated string.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.raw(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The 1-5 speed scale, clamped.
    pub fn speed(&self) -> Option<u64> {
        self.number("speed").map(|s| s.clamp(1, 5))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_pairs_keeps_json_types() {
        let options = ScanOptions::from_pairs(["ports=1-100", "rate=500", "passive=false", "templates=[\"a\",\"b\"]"]).unwrap();
        assert_eq!(options.text("ports").as_deref(), Some("1-100"));
        assert_eq!(options.number("rate"), Some(500));
        assert!(!options.flag("passive", true));
        assert_eq!(options.list("templates"), vec!["a", "b"]);
    }

    #[test]
    fn test_from_pairs_rejects_missing_equals() {
        assert!(ScanOptions::from_pairs(["ports"]).is_err());
        assert!(ScanOptions::from_pairs(["=1"]).is_err());
    }

    #[test]
    fn test_flag_defaults_when_absent_or_null() {
        let options = ScanOptions::new().with("cdn", Value::Null);
        assert!(options.flag("cdn", true));
        assert!(!options.flag("missing", false));
    }

    #[test]
    fn test_number_accepts_numeric_strings() {
        let options = ScanOptions::new().with("threads", "64").with("bad", "sixty");
        assert_eq!(options.number("threads"), Some(64));
        assert_eq!(options.number("bad"), None);
    }

    #[test]
    fn test_speed_is_clamped() {
        assert_eq!(ScanOptions::new().with("speed", 9).speed(), Some(5));
        assert_eq!(ScanOptions::new().with("speed", 0).speed(), Some(1));
        assert_eq!(ScanOptions::new().speed(), None);
    }

    #[test]
    fn test_text_joins_arrays() {
        let options = ScanOptions::new().with("ports", json!([80, 443]));
        assert_eq!(options.text("ports").as_deref(), Some("80,443"));
    }
}
