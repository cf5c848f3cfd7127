//! Tolerant accessors for irregular tool output.
//!
//! Tools disagree on types (a status code may arrive as `200` or `"200"`), so
//! every accessor falls back to a default instead of failing.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Non-empty, trimmed lines of `text`.
pub fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Each non-empty line that parses as a JSON value, in order. Lines that do
/// not parse are handed to `on_reject` and otherwise skipped.
pub fn json_lines<'a, F>(text: &'a str, mut on_reject: F) -> Vec<Value>
where
    F: FnMut(&'a str),
{
    let mut values = Vec::new();
    for line in lines(text) {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(_) => on_reject(line),
        }
    }
    values
}

/// Removes a comma that directly precedes a closing bracket, which some
/// tools emit when streaming a JSON array.
pub fn strip_trailing_commas(text: &str) -> String {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING.get_or_init(|| Regex::new(r",\s*\]").expect("static regex"));
    re.replace_all(text, "]").into_owned()
}

pub fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn str_field_or(value: &Value, key: &str, default: &str) -> String {
    let found = str_field(value, key);
    if found.is_empty() {
        default.to_string()
    } else {
        found
    }
}

pub fn u64_field(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub fn u32_field(value: &Value, key: &str) -> u32 {
    u32::try_from(u64_field(value, key)).unwrap_or(0)
}

pub fn bool_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
        _ => false,
    }
}

/// A list of strings from either a JSON array or a comma separated string.
pub fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
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

/// Drops repeated entries, keeping the first occurrence of each.
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_lines_skips_garbage() {
        let text = "{\"a\":1}\nnot json\n\n  {\"a\":2}  \n{broken";
        let mut rejected = Vec::new();
        let values = json_lines(text, |line| rejected.push(line));
        assert_eq!(values, vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(rejected, vec!["not json", "{broken"]);
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("[{\"a\":1},\n]"), "[{\"a\":1}]");
        assert_eq!(strip_trailing_commas("{\"a\":[1,2, ]}"), "{\"a\":[1,2]}");
    }

    #[test]
    fn test_numeric_fields_accept_strings() {
        let value = json!({"code": "200", "len": 12, "neg": -3, "float": 4.0});
        assert_eq!(u32_field(&value, "code"), 200);
        assert_eq!(u64_field(&value, "len"), 12);
        assert_eq!(u64_field(&value, "neg"), 0);
        assert_eq!(u64_field(&value, "float"), 4);
        assert_eq!(u64_field(&value, "missing"), 0);
    }

    #[test]
    fn test_string_list_from_array_or_csv() {
        let value = json!({"arr": ["a", "b", 3], "csv": "x, y,,z", "none": null});
        assert_eq!(string_list(&value, "arr"), vec!["a", "b", "3"]);
        assert_eq!(string_list(&value, "csv"), vec!["x", "y", "z"]);
        assert!(string_list(&value, "none").is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let items = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_preserving_order(items), vec!["b", "a", "c"]);
    }
}
