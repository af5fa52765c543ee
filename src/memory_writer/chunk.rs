//! Splits an oversize distilled memory into embeddable chunks (
//! "Chunking"). Reuses the same paragraph/sentence/word splitter C4 uses
//! for outbound message chunking — both are "split on semantic boundaries,
//! never mid-word" problems, just with a different size budget.

use crate::context::history::estimate_tokens;
use crate::inference::chunker::chunk_message;
use uuid::Uuid;

/// One chunk ready for embedding and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChunk {
    pub content: String,
    pub chunk_group_id: Option<Uuid>,
    pub chunk_index: Option<i32>,
    pub total_chunks: Option<i32>,
}

/// Leave headroom under the embedding model's hard ceiling (
/// "8191 for 1536-dim model") rather than cutting exactly at it.
const SAFE_TOKEN_BUDGET: usize = 6000;
/// `estimate_tokens` is a chars/4 heuristic; invert it to get a char budget.
const CHARS_PER_CHUNK: usize = SAFE_TOKEN_BUDGET * 4;

/// Split `text` into one or more chunks. A single chunk carries no
/// `chunk_group_id` (it isn't a group); two or more share a freshly minted
/// group id with `chunk_index` in `[0, N)`.
#[must_use]
pub fn chunk_memory(text: &str) -> Vec<MemoryChunk> {
    if i64::from(estimate_tokens(text)) <= SAFE_TOKEN_BUDGET as i64 {
        return vec![MemoryChunk {
            content: text.to_string(),
            chunk_group_id: None,
            chunk_index: None,
            total_chunks: None,
        }];
    }

    let parts = chunk_message(text, CHARS_PER_CHUNK);
    let total = parts.len();
    if total <= 1 {
        return vec![MemoryChunk {
            content: text.to_string(),
            chunk_group_id: None,
            chunk_index: None,
            total_chunks: None,
        }];
    }

    let group = Uuid::new_v4();
    #[allow(clippy::cast_possible_truncation)]
    parts
        .into_iter()
        .enumerate()
        .map(|(i, content)| MemoryChunk {
            content,
            chunk_group_id: Some(group),
            chunk_index: Some(i as i32),
            total_chunks: Some(total as i32),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_ungrouped_chunk() {
        let chunks = chunk_memory("a short memory");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_group_id, None);
        assert_eq!(chunks[0].total_chunks, None);
    }

    #[test]
    fn oversize_text_splits_into_a_shared_group() {
        let text = "word ".repeat(40_000);
        let chunks = chunk_memory(&text);
        assert!(chunks.len() >= 3);
        let group = chunks[0].chunk_group_id;
        assert!(group.is_some());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_group_id, group);
            assert_eq!(c.chunk_index, Some(i as i32));
            assert_eq!(c.total_chunks, Some(chunks.len() as i32));
        }
    }

    #[test]
    fn chunks_concatenate_back_to_the_original() {
        let text = "word ".repeat(40_000);
        let chunks = chunk_memory(&text);
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rebuilt, text);
    }
}
