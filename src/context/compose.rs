use crate::context::retrieval::ReassembledMemory;
use crate::error::ContextError;
use chrono::{DateTime, Utc};

/// Reject a turn before any trimming happens when the fixed cost alone
/// (system content plus the current turn) already exceeds the window —
/// dropping every bit of history and every memory still wouldn't bring
/// an over-budget prompt back under it.
pub fn check_overflow(fixed_tokens: i32, budget: i32) -> Result<(), ContextError> {
    if fixed_tokens > budget {
        #[allow(clippy::cast_sign_loss)]
        return Err(ContextError::Overflow {
            tokens: fixed_tokens as u32,
            budget: budget as u32,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// One-line Discord context header (step 7):
/// `[Discord: Server > #channel | ISO-timestamp]`. `guild_name` is `None`
/// for DMs, where the header is suppressed by the caller instead.
#[must_use]
pub fn format_context_header(guild_name: &str, channel_name: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "[Discord: {guild_name} > #{channel_name} | {}]",
        timestamp.to_rfc3339()
    )
}

/// Assemble the system message content: persona block, then a stable
/// "Background Knowledge" section, then a timestamped "Relevant Memories"
/// section (step 4). Sections with no content are omitted
/// entirely rather than emitted empty.
#[must_use]
pub fn build_system_content(
    persona_block: &str,
    background_knowledge: &[String],
    memories: &[ReassembledMemory],
) -> String {
    let mut sections = vec![persona_block.trim_end().to_string()];

    if !background_knowledge.is_empty() {
        let mut block = String::from("Background Knowledge:\n");
        for entry in background_knowledge {
            block.push_str("- ");
            block.push_str(entry);
            block.push('\n');
        }
        sections.push(block.trim_end().to_string());
    }

    if !memories.is_empty() {
        let mut block = String::from("Relevant Memories:\n");
        for memory in memories {
            block.push_str(&format!(
                "- [{}] {}\n",
                memory.created_at.to_rfc3339(),
                memory.content
            ));
        }
        sections.push(block.trim_end().to_string());
    }

    sections.join("\n\n")
}

/// Enforce `contextWindowTokens` (step 5): drop oldest history
/// first, then drop lowest-similarity memories, never the system prompt or
/// the current turn. `history` must be chronological (oldest first);
/// `memories` must be sorted by ascending distance (closest first).
#[must_use]
pub fn trim_to_budget(
    mut history: Vec<(Message, i32)>,
    mut memories: Vec<(ReassembledMemory, i32)>,
    budget: i32,
    fixed_tokens: i32,
) -> (Vec<Message>, Vec<ReassembledMemory>) {
    let mut total = fixed_tokens
        + history.iter().map(|(_, t)| t).sum::<i32>()
        + memories.iter().map(|(_, t)| t).sum::<i32>();

    while total > budget && !history.is_empty() {
        let (_, dropped_tokens) = history.remove(0);
        total -= dropped_tokens;
    }

    while total > budget && !memories.is_empty() {
        let (_, dropped_tokens) = memories.pop().expect("checked non-empty above");
        total -= dropped_tokens;
    }

    (
        history.into_iter().map(|(m, _)| m).collect(),
        memories.into_iter().map(|(m, _)| m).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn check_overflow_ok_when_fixed_tokens_fit() {
        assert!(check_overflow(500, 8000).is_ok());
    }

    #[test]
    fn check_overflow_errors_when_fixed_tokens_alone_exceed_budget() {
        let err = check_overflow(9000, 8000).unwrap_err();
        assert!(matches!(err, ContextError::Overflow { tokens: 9000, budget: 8000 }));
    }

    fn memory(content: &str, distance: f32) -> ReassembledMemory {
        ReassembledMemory {
            content: content.to_string(),
            distance,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn msg(content: &str) -> Message {
        Message {
            role: Role::User,
            content: content.to_string(),
        }
    }

    #[test]
    fn header_formats_guild_and_channel() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let header = format_context_header("My Server", "general", ts);
        assert!(header.starts_with("[Discord: My Server > #general |"));
    }

    #[test]
    fn system_content_omits_empty_sections() {
        let content = build_system_content("You are Luna.", &[], &[]);
        assert_eq!(content, "You are Luna.");
    }

    #[test]
    fn system_content_includes_background_and_memories() {
        let content = build_system_content(
            "You are Luna.",
            &["Likes the color blue.".to_string()],
            &[memory("Told me about their dog.", 0.2)],
        );
        assert!(content.contains("Background Knowledge:"));
        assert!(content.contains("Likes the color blue."));
        assert!(content.contains("Relevant Memories:"));
        assert!(content.contains("Told me about their dog."));
    }

    #[test]
    fn trim_keeps_everything_under_budget() {
        let history = vec![(msg("hi"), 5), (msg("there"), 5)];
        let memories = vec![(memory("m1", 0.1), 5)];
        let (h, m) = trim_to_budget(history, memories, 100, 10);
        assert_eq!(h.len(), 2);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn trim_drops_oldest_history_before_touching_memories() {
        let history = vec![(msg("oldest"), 20), (msg("newest"), 20)];
        let memories = vec![(memory("m1", 0.1), 10)];
        // fixed=10, budget=45: total=10+40+10=60, need to drop 15+
        let (h, m) = trim_to_budget(history, memories, 45, 10);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].content, "newest");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn trim_drops_lowest_similarity_memory_after_history_exhausted() {
        let history = vec![(msg("only"), 5)];
        let memories = vec![(memory("close", 0.1), 10), (memory("far", 0.9), 10)];
        // fixed=5, budget=20: total=5+5+20=30, must drop history then one memory
        let (h, m) = trim_to_budget(history, memories, 20, 5);
        assert!(h.is_empty());
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].content, "close");
    }

    #[test]
    fn never_drops_below_budget_floor_of_fixed_tokens() {
        let history = vec![(msg("a"), 100)];
        let memories = vec![(memory("b", 0.1), 100)];
        let (h, m) = trim_to_budget(history, memories, 1, 1);
        assert!(h.is_empty());
        assert!(m.is_empty());
    }
}
