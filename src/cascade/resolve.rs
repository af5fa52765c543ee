use crate::cascade::advanced_params::{
    apply_effort_precedence, check_reasoning_budget, validate_advanced_params,
};
use crate::db::models::{LlmConfig, SystemPrompt};
use crate::error::CascadeError;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Everything needed to resolve one (user, personality, channel) tuple's
/// effective LLM configuration ("Config resolution cascade").
/// Each optional layer is `None` when that row doesn't exist; a missing
/// layer simply contributes nothing to the fold.
pub struct CascadeInput {
    pub global_llm_config: LlmConfig,
    pub global_system_prompt: SystemPrompt,
    pub personality_llm_config: Option<LlmConfig>,
    pub personality_system_prompt: Option<SystemPrompt>,
    pub user_llm_config_override: Option<LlmConfig>,
    pub user_persona_override: Option<Uuid>,
    pub config_overrides: Option<Value>,
    pub channel_overrides: Option<Value>,
}

/// The resolved, validated bundle handed to C3/C4.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub document: Value,
    pub system_prompt: String,
    pub persona_override: Option<Uuid>,
}

impl ResolvedConfig {
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.document.get("model").and_then(Value::as_str)
    }

    #[must_use]
    pub fn show_thinking(&self) -> bool {
        self.document
            .get("showThinking")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn llm_config_to_doc(cfg: &LlmConfig) -> Value {
    let mut doc = match cfg.advanced_parameters.clone() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    doc.insert("model".to_string(), Value::String(cfg.model.clone()));
    if let Some(vision) = &cfg.vision_model {
        doc.insert("visionModel".to_string(), Value::String(vision.clone()));
    }
    Value::Object(doc)
}

/// Shallow-merge objects, deep-merge the `reasoning` leaf only: highest
/// precedence layer wins on every other key, but its `reasoning` object is
/// folded onto the lower layers' rather than replacing them outright — in
/// practice the one nested object this crate ever carries is `reasoning`.
fn merge_layer(base: &mut Map<String, Value>, layer: &Value) {
    let Some(layer_obj) = layer.as_object() else {
        return;
    };

    for (key, value) in layer_obj {
        if key == "reasoning" {
            let merged = match (base.get("reasoning"), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    let mut merged = existing.clone();
                    for (k, v) in incoming {
                        merged.insert(k.clone(), v.clone());
                    }
                    Value::Object(merged)
                }
                _ => value.clone(),
            };
            base.insert(key.clone(), merged);
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}

/// Fold the five cascade layers (steps 1-5) into one resolved,
/// schema-validated document.
pub fn resolve_cascade(input: &CascadeInput) -> Result<ResolvedConfig, CascadeError> {
    let mut doc = Map::new();

    // 1. Global defaults.
    merge_layer(&mut doc, &llm_config_to_doc(&input.global_llm_config));
    let mut system_prompt = input.global_system_prompt.content.clone();
    let mut persona_override = None;

    // 2. Personality's declared default LlmConfig and SystemPrompt.
    if let Some(cfg) = &input.personality_llm_config {
        merge_layer(&mut doc, &llm_config_to_doc(cfg));
    }
    if let Some(prompt) = &input.personality_system_prompt {
        system_prompt = prompt.content.clone();
    }

    // 3. UserPersonalityConfig row: llm_config_override, persona_override.
    if let Some(cfg) = &input.user_llm_config_override {
        merge_layer(&mut doc, &llm_config_to_doc(cfg));
    }
    if let Some(persona_id) = input.user_persona_override {
        persona_override = Some(persona_id);
    }

    // 4. UserPersonalityConfig.config_overrides JSON document.
    if let Some(overrides) = &input.config_overrides {
        let validated = validate_advanced_params(overrides);
        merge_layer(&mut doc, &validated);
    }

    // 5. Channel-settings overrides.
    if let Some(overrides) = &input.channel_overrides {
        let validated = validate_advanced_params(overrides);
        merge_layer(&mut doc, &validated);
    }

    let mut document = validate_advanced_params(&Value::Object(doc));
    document = apply_effort_precedence(document);
    check_reasoning_budget(&document)?;

    Ok(ResolvedConfig {
        document,
        system_prompt,
        persona_override,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn llm_config(model: &str, advanced: Value) -> LlmConfig {
        LlmConfig {
            id: Uuid::new_v4(),
            name: model.to_string(),
            model: model.to_string(),
            vision_model: None,
            owner_user_id: Uuid::new_v4(),
            is_global: true,
            is_default: true,
            advanced_parameters: advanced,
        }
    }

    fn system_prompt(content: &str) -> SystemPrompt {
        SystemPrompt {
            id: Uuid::new_v4(),
            name: content.to_string(),
            content: content.to_string(),
            is_default: true,
        }
    }

    fn base_input() -> CascadeInput {
        CascadeInput {
            global_llm_config: llm_config("gpt-base", json!({ "temperature": 0.7 })),
            global_system_prompt: system_prompt("You are a helpful assistant."),
            personality_llm_config: None,
            personality_system_prompt: None,
            user_llm_config_override: None,
            user_persona_override: None,
            config_overrides: None,
            channel_overrides: None,
        }
    }

    #[test]
    fn global_only_resolves_to_global_values() {
        let input = base_input();
        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.model(), Some("gpt-base"));
        assert_eq!(resolved.document["temperature"], json!(0.7));
    }

    /// example 4: global temperature=0.7, personality default=0.5,
    /// user config_overrides={"temperature": 0.9} -> resolved 0.9.
    #[test]
    fn later_layers_override_temperature() {
        let mut input = base_input();
        input.personality_llm_config =
            Some(llm_config("gpt-personality", json!({ "temperature": 0.5 })));
        input.config_overrides = Some(json!({ "temperature": 0.9 }));

        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.document["temperature"], json!(0.9));
        assert_eq!(resolved.model(), Some("gpt-personality"));
    }

    #[test]
    fn personality_system_prompt_overrides_global() {
        let mut input = base_input();
        input.personality_system_prompt = Some(system_prompt("You are Luna."));

        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.system_prompt, "You are Luna.");
    }

    #[test]
    fn reasoning_object_deep_merges_across_layers() {
        let mut input = base_input();
        input.global_llm_config = llm_config(
            "gpt-base",
            json!({ "reasoning": { "maxTokens": 2000, "enabled": true } }),
        );
        input.config_overrides = Some(json!({ "reasoning": { "enabled": false } }));

        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.document["reasoning"]["maxTokens"], json!(2000));
        assert_eq!(resolved.document["reasoning"]["enabled"], json!(false));
    }

    #[test]
    fn user_persona_override_carried_through() {
        let mut input = base_input();
        let persona_id = Uuid::new_v4();
        input.user_persona_override = Some(persona_id);

        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.persona_override, Some(persona_id));
    }

    #[test]
    fn reasoning_budget_violation_is_rejected() {
        let mut input = base_input();
        input.global_llm_config = llm_config(
            "gpt-base",
            json!({ "maxTokens": 1500, "reasoning": { "maxTokens": 1500 } }),
        );

        assert!(resolve_cascade(&input).is_err());
    }

    #[test]
    fn channel_overrides_apply_last() {
        let mut input = base_input();
        input.config_overrides = Some(json!({ "temperature": 0.9 }));
        input.channel_overrides = Some(json!({ "temperature": 1.2 }));

        let resolved = resolve_cascade(&input).unwrap();
        assert_eq!(resolved.document["temperature"], json!(1.2));
    }
}
