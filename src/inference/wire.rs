//! Converts the cascade's camelCase resolved-config document into the
//! snake_case wire shape the model provider expects ("Model
//! provider": "in snake_case on the wire").

use serde_json::{Map, Value};

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Recursively convert every object key in `value` from camelCase to
/// snake_case (applies to the top-level bundle and nested objects like
/// `reasoning`).
#[must_use]
pub fn to_snake_case_document(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                out.insert(camel_to_snake(key), to_snake_case_document(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_snake_case_document).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_top_level_keys() {
        let doc = json!({ "topP": 0.9, "maxTokens": 2000 });
        let out = to_snake_case_document(&doc);
        assert_eq!(out["top_p"], json!(0.9));
        assert_eq!(out["max_tokens"], json!(2000));
    }

    #[test]
    fn converts_nested_reasoning_object() {
        let doc = json!({ "reasoning": { "maxTokens": 1500, "effort": "high" } });
        let out = to_snake_case_document(&doc);
        assert_eq!(out["reasoning"]["max_tokens"], json!(1500));
        assert_eq!(out["reasoning"]["effort"], json!("high"));
    }

    #[test]
    fn leaves_already_snake_case_keys_unchanged() {
        let doc = json!({ "model": "gpt-5", "seed": 42 });
        let out = to_snake_case_document(&doc);
        assert_eq!(out["model"], json!("gpt-5"));
        assert_eq!(out["seed"], json!(42));
    }

    #[test]
    fn consecutive_uppercase_does_not_double_underscore() {
        assert_eq!(camel_to_snake("topA"), "top_a");
        assert_eq!(camel_to_snake("visionModel"), "vision_model");
    }
}
