//! Splits generated content at paragraph/sentence/word boundaries so no
//! chunk exceeds the chat platform's message length, then assembles the
//! resulting chunks into a delivery plan. Falls through paragraph -> line
//! -> sentence -> word -> hard character split, only dropping to a coarser
//! level when a whole segment still doesn't fit.

use crate::gateway::envelope::DeliveryPlan;

/// Discord's own message body limit; the default `max_chars` a caller
/// passes to [`build_delivery_plan`] when it has no per-personality or
/// per-channel override to apply.
pub const PLATFORM_MESSAGE_CHAR_LIMIT: usize = 2000;

fn char_count(text: &str) -> usize {
    text.chars().count()
}

fn split_keep_delimiter(text: &str, delimiter: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;

    while let Some(relative_pos) = text[start..].find(delimiter) {
        let end = start + relative_pos + delimiter.len();
        parts.push(text[start..end].to_string());
        start = end;
    }

    if start < text.len() {
        parts.push(text[start..].to_string());
    }

    parts
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            if let Some((next_index, next_char)) = chars.peek().copied() {
                if next_char == ' ' {
                    let end = next_index + next_char.len_utf8();
                    parts.push(text[start..end].to_string());
                    start = end;
                }
            }
        }
    }

    if start < text.len() {
        parts.push(text[start..].to_string());
    }

    parts
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for ch in text.chars() {
        if current_len == max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push(ch);
        current_len += 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[derive(Clone, Copy)]
enum SplitLevel {
    Paragraph,
    Line,
    Sentence,
    Word,
    Hard,
}

impl SplitLevel {
    fn next(self) -> Self {
        match self {
            Self::Paragraph => Self::Line,
            Self::Line => Self::Sentence,
            Self::Sentence => Self::Word,
            Self::Word | Self::Hard => Self::Hard,
        }
    }

    fn split(self, text: &str) -> Vec<String> {
        match self {
            Self::Paragraph => split_keep_delimiter(text, "\n\n"),
            Self::Line => split_keep_delimiter(text, "\n"),
            Self::Sentence => split_sentences(text),
            Self::Word => split_keep_delimiter(text, " "),
            Self::Hard => hard_split(text, 1),
        }
    }
}

fn chunk_segment(text: &str, max_chars: usize, level: SplitLevel, out: &mut Vec<String>) {
    if text.is_empty() {
        return;
    }

    if char_count(text) <= max_chars {
        out.push(text.to_string());
        return;
    }

    if matches!(level, SplitLevel::Hard) {
        out.extend(hard_split(text, max_chars));
        return;
    }

    let parts = level.split(text);
    if parts.len() <= 1 {
        chunk_segment(text, max_chars, level.next(), out);
        return;
    }

    let mut current = String::new();

    for part in parts {
        if char_count(&part) > max_chars {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            chunk_segment(&part, max_chars, level.next(), out);
            continue;
        }

        if current.is_empty() {
            current = part;
            continue;
        }

        let combined_len = char_count(&current) + char_count(&part);
        if combined_len <= max_chars {
            current.push_str(&part);
        } else {
            out.push(std::mem::take(&mut current));
            current = part;
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// paragraph, then line, then sentence, then word boundaries before
/// falling back to a hard character split.
#[must_use]
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    if char_count(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    chunk_segment(text, max_chars, SplitLevel::Paragraph, &mut chunks);
    chunks
}

/// Chunk `content` and assemble the resulting delivery plan, attaching
/// `files`/`embeds` to the last chunk only: posting them earlier would put
/// generated attachments ahead of the text that introduces them.
#[must_use]
pub fn build_delivery_plan(
    content: &str,
    max_chars: usize,
    files: Vec<String>,
    embeds: Vec<serde_json::Value>,
    thinking_content: Option<String>,
) -> DeliveryPlan {
    DeliveryPlan {
        chunks: chunk_message(content, max_chars),
        files,
        embeds,
        thinking_content,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_delivery_plan, chunk_message};

    #[test]
    fn delivery_plan_attaches_files_and_embeds_regardless_of_chunk_count() {
        let text = "word ".repeat(1000);
        let plan = build_delivery_plan(
            &text,
            2000,
            vec!["sketch.png".to_string()],
            vec![serde_json::json!({ "title": "a card" })],
            Some("weighing a few options".to_string()),
        );
        assert!(plan.chunks.len() > 1);
        assert_eq!(plan.files, vec!["sketch.png".to_string()]);
        assert_eq!(plan.embeds.len(), 1);
        assert_eq!(plan.thinking_content, Some("weighing a few options".to_string()));
    }

    #[test]
    fn chunk_empty_message() {
        assert!(chunk_message("", 10).is_empty());
    }

    #[test]
    fn chunk_short_message() {
        assert_eq!(chunk_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn chunk_long_url_with_hard_split() {
        let text = "https://example.com/".repeat(20);
        let chunks = chunk_message(&text, 30);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 30));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunk_respects_discord_message_cap() {
        let text = "word ".repeat(1000);
        let chunks = chunk_message(&text, 2000);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 2000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunk_with_paragraph_sentence_word_fallback() {
        let text = "Paragraph one has several words. Another sentence!\n\nParagraph two has averyveryverylongwordwithoutspaces";
        let chunks = chunk_message(text, 25);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 25));
        assert_eq!(chunks.concat(), text);
    }
}
