//! C5 distillation: turns a (user turn, assistant turn) pair into a short
//! first-person memory from the persona's perspective (
//! "Distillation").

use crate::context::compose::{Message, Role};
use crate::inference::provider::{InferenceProvider, InvokeError};
use serde_json::json;

/// Below this many non-whitespace characters a distillation is considered
/// trivial and skipped ("If the distilled text is empty or
/// trivial, skip").
const TRIVIAL_CHAR_FLOOR: usize = 12;

const DISTILLATION_SYSTEM_PROMPT: &str = "You write a single short first-person memory note capturing any salient, \
lasting fact from the exchange below (names, preferences, commitments, \
emotional context). Write as the persona, in first person. If nothing in \
the exchange is worth remembering, reply with exactly: NOTHING.";

/// Ask the model to distill one turn pair. Returns `None` when the model
/// says there's nothing worth keeping, or the result is trivially short.
pub async fn distill(
    provider: &InferenceProvider,
    model: &str,
    user_turn: &str,
    assistant_turn: &str,
) -> Result<Option<String>, InvokeError> {
    let messages = vec![
        Message {
            role: Role::System,
            content: DISTILLATION_SYSTEM_PROMPT.to_string(),
        },
        Message {
            role: Role::User,
            content: format!("User said: {user_turn}\n\nYou replied: {assistant_turn}"),
        },
    ];

    let resolved = json!({ "model": model, "temperature": 0.2, "maxTokens": 300 });
    let result = provider.invoke(&resolved, &messages).await?;
    Ok(normalize(&result.extracted.cleaned_content))
}

fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.eq_ignore_ascii_case("nothing") {
        return None;
    }
    if trimmed.chars().filter(|c| !c.is_whitespace()).count() < TRIVIAL_CHAR_FLOOR {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_nothing_marker() {
        assert_eq!(normalize("NOTHING"), None);
        assert_eq!(normalize("  nothing  "), None);
    }

    #[test]
    fn normalize_drops_empty_and_trivial() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("ok"), None);
    }

    #[test]
    fn normalize_keeps_substantial_text() {
        let text = "The user mentioned they just adopted a cat named Pepper.";
        assert_eq!(normalize(text), Some(text.to_string()));
    }
}
