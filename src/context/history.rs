use crate::db::models::ConversationTurn;

/// Crude token estimator used only as a fallback for rows without a cached
/// `token_count` (step 1: "rows lacking a cache are measured on
/// the fly"). Four characters per token is the same rough ratio the
/// teacher's history budgeting uses for uncached entries.
#[must_use]
pub fn estimate_tokens(text: &str) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let estimate = (text.chars().count() as f64 / 4.0).ceil() as i32;
    estimate.max(1)
}

/// Resolve the effective history depth: channel-override beats
/// personality-override beats the admin default (step 1).
#[must_use]
pub fn resolve_history_limit(
    channel_override: Option<u32>,
    personality_override: Option<u32>,
    admin_default: u32,
) -> u32 {
    channel_override
        .or(personality_override)
        .unwrap_or(admin_default)
}

/// Reverse the newest-first rows returned by the repository into
/// chronological order for prompt assembly.
#[must_use]
pub fn reverse_chronological(mut turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    turns.reverse();
    turns
}

/// Token count for a turn, using the cached value when present and falling
/// back to estimation otherwise.
#[must_use]
pub fn turn_token_count(turn: &ConversationTurn) -> i32 {
    turn.token_count.unwrap_or_else(|| estimate_tokens(&turn.content))
}

#[must_use]
pub fn sum_token_counts(turns: &[ConversationTurn]) -> i32 {
    turns.iter().map(turn_token_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TurnRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn turn(content: &str, token_count: Option<i32>) -> ConversationTurn {
        ConversationTurn {
            id: Uuid::new_v4(),
            channel_id: "c1".to_string(),
            guild_id: None,
            personality_id: Uuid::new_v4(),
            persona_id: Uuid::new_v4(),
            role: TurnRole::User,
            content: content.to_string(),
            token_count,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn channel_override_wins() {
        assert_eq!(resolve_history_limit(Some(5), Some(10), 20), 5);
    }

    #[test]
    fn personality_override_used_when_no_channel_override() {
        assert_eq!(resolve_history_limit(None, Some(10), 20), 10);
    }

    #[test]
    fn falls_back_to_admin_default() {
        assert_eq!(resolve_history_limit(None, None, 20), 20);
    }

    #[test]
    fn cached_token_count_preferred_over_estimate() {
        let t = turn("hello world", Some(3));
        assert_eq!(turn_token_count(&t), 3);
    }

    #[test]
    fn missing_token_count_is_estimated() {
        let t = turn("a".repeat(40).as_str(), None);
        assert_eq!(turn_token_count(&t), 10);
    }

    #[test]
    fn estimate_is_never_zero_for_nonempty_text() {
        assert_eq!(estimate_tokens("a"), 1);
    }

    #[test]
    fn reverse_chronological_flips_order() {
        let turns = vec![turn("second", None), turn("first", None)];
        let reversed = reverse_chronological(turns);
        assert_eq!(reversed[0].content, "first");
        assert_eq!(reversed[1].content, "second");
    }

    #[test]
    fn sum_token_counts_mixes_cached_and_estimated() {
        let turns = vec![turn("xxxx", Some(5)), turn("xxxxxxxx", None)];
        assert_eq!(sum_token_counts(&turns), 5 + 2);
    }
}
