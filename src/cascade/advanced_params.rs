use crate::error::CascadeError;
use serde_json::{Map, Value};

/// Declarative range for one numeric leaf of `advanced_parameters` /
/// `config_overrides` ("Advanced-params schema validation").
struct Range {
    field: &'static str,
    min: f64,
    max: f64,
}

const RANGES: &[Range] = &[
    Range { field: "temperature", min: 0.0, max: 2.0 },
    Range { field: "topP", min: 0.0, max: 1.0 },
    Range { field: "topK", min: 0.0, max: f64::MAX },
    Range { field: "frequencyPenalty", min: -2.0, max: 2.0 },
    Range { field: "presencePenalty", min: -2.0, max: 2.0 },
    Range { field: "repetitionPenalty", min: 0.0, max: 2.0 },
    Range { field: "minP", min: 0.0, max: 1.0 },
    Range { field: "topA", min: 0.0, max: 1.0 },
];

const REASONING_MAX_TOKENS_MIN: f64 = 1024.0;
const REASONING_MAX_TOKENS_MAX: f64 = 32000.0;

const VALID_EFFORTS: &[&str] = &["xhigh", "high", "medium", "low", "minimal", "none"];

/// Validate a single `advanced_parameters` / `config_overrides` document.
///
/// Malformed documents are never rejected outright — "Malformed
/// documents are treated as empty, logged at debug" — so this returns the
/// subset of the document that passed validation, dropping only the leaves
/// that failed their range check (and logging each drop at `debug!`).
#[must_use]
pub fn validate_advanced_params(doc: &Value) -> Value {
    let Some(obj) = doc.as_object() else {
        tracing::debug!("advanced_parameters document is not an object, treating as empty");
        return Value::Object(Map::new());
    };

    let mut out = Map::new();
    for (key, value) in obj {
        if key == "reasoning" {
            if let Some(validated) = validate_reasoning(value) {
                out.insert(key.clone(), validated);
            } else {
                tracing::debug!(field = "reasoning", "dropped invalid reasoning leaf");
            }
            continue;
        }

        if let Some(range) = RANGES.iter().find(|r| r.field == key) {
            match value.as_f64() {
                Some(n) if n >= range.min && n <= range.max => {
                    out.insert(key.clone(), value.clone());
                }
                _ => {
                    tracing::debug!(field = %key, "dropped out-of-range advanced_parameters leaf");
                }
            }
            continue;
        }

        // Unknown leaves pass through opaquely ("unknown leaves are
        // preserved opaquely to allow pass-through to evolving provider
        // APIs").
        out.insert(key.clone(), value.clone());
    }

    Value::Object(out)
}

fn validate_reasoning(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    let mut out = Map::new();

    if let Some(effort) = obj.get("effort") {
        let s = effort.as_str()?;
        if !VALID_EFFORTS.contains(&s) {
            return None;
        }
        out.insert("effort".to_string(), effort.clone());
    }

    if let Some(max_tokens) = obj.get("maxTokens") {
        let n = max_tokens.as_f64()?;
        if n < REASONING_MAX_TOKENS_MIN || n > REASONING_MAX_TOKENS_MAX {
            return None;
        }
        out.insert("maxTokens".to_string(), max_tokens.clone());
    }

    if let Some(exclude) = obj.get("exclude") {
        out.insert("exclude".to_string(), exclude.clone());
    }
    if let Some(enabled) = obj.get("enabled") {
        out.insert("enabled".to_string(), enabled.clone());
    }

    Some(Value::Object(out))
}

/// Cross-field check (): `reasoning.maxTokens` must be strictly
/// less than the top-level `maxTokens`, when both are present.
pub fn check_reasoning_budget(resolved: &Value) -> Result<(), CascadeError> {
    let Some(max_tokens) = resolved.get("maxTokens").and_then(Value::as_u64) else {
        return Ok(());
    };
    let Some(reasoning_max) = resolved
        .get("reasoning")
        .and_then(|r| r.get("maxTokens"))
        .and_then(Value::as_u64)
    else {
        return Ok(());
    };

    #[allow(clippy::cast_possible_truncation)]
    if reasoning_max >= max_tokens {
        return Err(CascadeError::ReasoningBudgetExceedsTotal {
            reasoning_max: reasoning_max as u32,
            max_tokens: max_tokens as u32,
        });
    }
    Ok(())
}

/// `reasoning.effort` and top-level `maxTokens` are mutually exclusive at
/// the wire; effort wins when both are present. Returns the
/// document with `maxTokens` stripped when `reasoning.effort` is set.
#[must_use]
pub fn apply_effort_precedence(mut resolved: Value) -> Value {
    let has_effort = resolved
        .get("reasoning")
        .and_then(|r| r.get("effort"))
        .is_some();

    if has_effort {
        if let Some(obj) = resolved.as_object_mut() {
            obj.remove("maxTokens");
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_in_range_scalars() {
        let doc = json!({ "temperature": 0.9, "topP": 1.0 });
        let out = validate_advanced_params(&doc);
        assert_eq!(out["temperature"], json!(0.9));
        assert_eq!(out["topP"], json!(1.0));
    }

    #[test]
    fn drops_out_of_range_scalar() {
        let doc = json!({ "temperature": 3.5 });
        let out = validate_advanced_params(&doc);
        assert!(out.get("temperature").is_none());
    }

    #[test]
    fn non_object_document_becomes_empty() {
        let doc = json!("not an object");
        let out = validate_advanced_params(&doc);
        assert_eq!(out, json!({}));
    }

    #[test]
    fn unknown_leaf_passes_through_opaquely() {
        let doc = json!({ "focusModeEnabled": true });
        let out = validate_advanced_params(&doc);
        assert_eq!(out["focusModeEnabled"], json!(true));
    }

    #[test]
    fn reasoning_effort_must_be_known_value() {
        let doc = json!({ "reasoning": { "effort": "ludicrous" } });
        let out = validate_advanced_params(&doc);
        assert!(out.get("reasoning").is_none());
    }

    #[test]
    fn reasoning_max_tokens_boundaries() {
        let ok = json!({ "reasoning": { "maxTokens": 1024 } });
        assert!(validate_advanced_params(&ok).get("reasoning").is_some());

        let too_low = json!({ "reasoning": { "maxTokens": 1023 } });
        assert!(validate_advanced_params(&too_low).get("reasoning").is_none());

        let too_high = json!({ "reasoning": { "maxTokens": 32001 } });
        assert!(validate_advanced_params(&too_high).get("reasoning").is_none());
    }

    #[test]
    fn reasoning_budget_boundary_passes_one_under() {
        let doc = json!({ "maxTokens": 2000, "reasoning": { "maxTokens": 1999 } });
        assert!(check_reasoning_budget(&doc).is_ok());
    }

    #[test]
    fn reasoning_budget_equal_to_max_tokens_fails() {
        let doc = json!({ "maxTokens": 2000, "reasoning": { "maxTokens": 2000 } });
        assert!(check_reasoning_budget(&doc).is_err());
    }

    #[test]
    fn effort_precedence_strips_max_tokens() {
        let doc = json!({ "maxTokens": 4096, "reasoning": { "effort": "high" } });
        let out = apply_effort_precedence(doc);
        assert!(out.get("maxTokens").is_none());
        assert_eq!(out["reasoning"]["effort"], json!("high"));
    }

    #[test]
    fn effort_precedence_leaves_max_tokens_when_no_effort() {
        let doc = json!({ "maxTokens": 4096, "reasoning": { "maxTokens": 2000 } });
        let out = apply_effort_precedence(doc.clone());
        assert_eq!(out, doc);
    }
}
