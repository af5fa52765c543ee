//! Extracts visible reasoning from a model's response (
//! "Reasoning capture" and "Inline-tag extraction").
//!
//! Providers expose reasoning two ways: a `message.reasoning` string, or a
//! `message.reasoning_details` array of typed segments
//! (`reasoning.text` / `reasoning.summary` / `reasoning.encrypted`).
//! Models also sometimes emit the same content inline as tags in the
//! message body. Both paths are merged and deduplicated here.

use serde::Deserialize;
use serde_json::Value;

const INLINE_TAGS: &[&str] = &[
    "think",
    "thinking",
    "ant_thinking",
    "reasoning",
    "thought",
    "reflection",
    "scratchpad",
];

/// One entry of a provider's `message.reasoning_details` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningDetail {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Result of merging API-level and inline reasoning with the cleaned
/// message body ("Return `{cleanedContent, thinkingContent}`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReasoning {
    pub cleaned_content: String,
    pub thinking_content: Option<String>,
}

/// Pull text out of a provider's `reasoning_details` array, concatenating
/// `reasoning.text` and `reasoning.summary` segments in order. Encrypted
/// segments (`reasoning.encrypted`) carry no visible text and are skipped.
#[must_use]
pub fn extract_api_reasoning(reasoning: Option<&str>, details: &[ReasoningDetail]) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(r) = reasoning {
        if !r.trim().is_empty() {
            parts.push(r.trim().to_string());
        }
    }

    for detail in details {
        match detail.kind.as_str() {
            "reasoning.text" | "reasoning.summary" => {
                if let Some(text) = detail.text.as_ref().or(detail.summary.as_ref()) {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Remove every recognized inline reasoning tag from `content`, returning
/// the cleaned body plus the concatenated tag contents (case-insensitive).
/// Orphan closing tags (a `</think>` with no matching opener — some models
/// emit these) are treated as marking everything before them as reasoning.
fn extract_inline_tags(content: &str) -> (String, Option<String>) {
    let mut cleaned = String::with_capacity(content.len());
    let mut extracted: Vec<String> = Vec::new();
    // ASCII-only lowercasing keeps byte offsets aligned with `content` —
    // Unicode-aware `to_lowercase` can change a character's byte length
    // (e.g. 'İ') and desync the indices used to slice the original string.
    let lower = content.to_ascii_lowercase();
    let mut cursor = 0usize;

    while cursor < content.len() {
        match find_next_open_tag(&lower, cursor) {
            Some((tag, open_start, open_end)) => {
                cleaned.push_str(&content[cursor..open_start]);
                let close_tag = format!("</{tag}>");
                if let Some(close_start) = lower[open_end..].find(&close_tag) {
                    let close_start = open_end + close_start;
                    let close_end = close_start + close_tag.len();
                    extracted.push(content[open_end..close_start].trim().to_string());
                    cursor = close_end;
                } else {
                    // Unclosed opener: treat the remainder as reasoning.
                    extracted.push(content[open_end..].trim().to_string());
                    cursor = content.len();
                }
            }
            None => {
                if let Some((orphan_end, orphan_close_len)) = find_orphan_close_tag(&lower, cursor) {
                    extracted.push(content[cursor..orphan_end].trim().to_string());
                    cursor = orphan_end + orphan_close_len;
                } else {
                    cleaned.push_str(&content[cursor..]);
                    cursor = content.len();
                }
            }
        }
    }

    let thinking = extracted.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
    let thinking_content = if thinking.is_empty() {
        None
    } else {
        Some(thinking.join("\n\n"))
    };

    (cleaned.trim().to_string(), thinking_content)
}

fn find_next_open_tag(lower: &str, from: usize) -> Option<(&'static str, usize, usize)> {
    INLINE_TAGS
        .iter()
        .filter_map(|&tag| {
            let open = format!("<{tag}>");
            lower[from..].find(&open).map(|pos| (tag, from + pos, from + pos + open.len()))
        })
        .min_by_key(|&(_, start, _)| start)
}

fn find_orphan_close_tag(lower: &str, from: usize) -> Option<(usize, usize)> {
    INLINE_TAGS
        .iter()
        .filter_map(|&tag| {
            let close = format!("</{tag}>");
            lower[from..].find(&close).map(|pos| (from + pos, close.len()))
        })
        .min_by_key(|&(start, _)| start)
}

/// Merge API-level reasoning with inline-tag reasoning and deduplicate
/// ("Merge extracted inline reasoning with API-level reasoning,
/// deduplicating").
#[must_use]
pub fn extract(content: &str, api_reasoning: Option<&str>) -> ExtractedReasoning {
    let (cleaned_content, inline_thinking) = extract_inline_tags(content);

    let thinking_content = match (api_reasoning, inline_thinking) {
        (Some(api), Some(inline)) if api.trim() == inline.trim() => Some(api.trim().to_string()),
        (Some(api), Some(inline)) => Some(format!("{}\n\n{}", api.trim(), inline.trim())),
        (Some(api), None) => Some(api.trim().to_string()),
        (None, Some(inline)) => Some(inline),
        (None, None) => None,
    };

    ExtractedReasoning {
        cleaned_content,
        thinking_content,
    }
}

/// True when the model consumed its entire budget on reasoning and left no
/// visible content ("All-reasoning responses"): caller should
/// emit an observability warning and let the caller decide the
/// user-visible outcome.
#[must_use]
pub fn is_all_reasoning_response(extracted: &ExtractedReasoning) -> bool {
    extracted.cleaned_content.trim().is_empty() && extracted.thinking_content.is_some()
}

/// Parse a raw `message.reasoning_details` JSON array into typed segments,
/// tolerating malformed entries by dropping them.
#[must_use]
pub fn parse_reasoning_details(value: Option<&Value>) -> Vec<ReasoningDetail> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_think_tag() {
        let extracted = extract("<think>pondering</think>Hello there!", None);
        assert_eq!(extracted.cleaned_content, "Hello there!");
        assert_eq!(extracted.thinking_content, Some("pondering".to_string()));
    }

    #[test]
    fn is_case_insensitive() {
        let extracted = extract("<THINKING>deep thoughts</THINKING>Reply.", None);
        assert_eq!(extracted.cleaned_content, "Reply.");
        assert_eq!(extracted.thinking_content, Some("deep thoughts".to_string()));
    }

    #[test]
    fn handles_orphan_closing_tag() {
        let extracted = extract("some reasoning here</thinking>the actual reply", None);
        assert_eq!(extracted.cleaned_content, "the actual reply");
        assert_eq!(extracted.thinking_content, Some("some reasoning here".to_string()));
    }

    #[test]
    fn handles_unclosed_opener() {
        let extracted = extract("<scratchpad>never closes", None);
        assert_eq!(extracted.cleaned_content, "");
        assert!(extracted.thinking_content.is_some());
    }

    #[test]
    fn merges_api_and_inline_reasoning_without_duplication() {
        let extracted = extract("<think>local thought</think>Done.", Some("local thought"));
        assert_eq!(extracted.thinking_content, Some("local thought".to_string()));
    }

    #[test]
    fn merges_distinct_api_and_inline_reasoning() {
        let extracted = extract("<think>inline thought</think>Done.", Some("api thought"));
        assert_eq!(
            extracted.thinking_content,
            Some("api thought\n\ninline thought".to_string())
        );
    }

    #[test]
    fn no_tags_no_api_reasoning_passes_through() {
        let extracted = extract("Just a normal reply.", None);
        assert_eq!(extracted.cleaned_content, "Just a normal reply.");
        assert_eq!(extracted.thinking_content, None);
    }

    #[test]
    fn all_reasoning_response_is_detected() {
        let extracted = extract("<think>only thoughts, nothing else</think>", None);
        assert!(is_all_reasoning_response(&extracted));
    }

    #[test]
    fn api_reasoning_text_and_summary_details_concatenate() {
        let details = vec![
            ReasoningDetail {
                kind: "reasoning.text".to_string(),
                text: Some("first part".to_string()),
                summary: None,
            },
            ReasoningDetail {
                kind: "reasoning.encrypted".to_string(),
                text: None,
                summary: None,
            },
            ReasoningDetail {
                kind: "reasoning.summary".to_string(),
                text: None,
                summary: Some("second part".to_string()),
            },
        ];
        let merged = extract_api_reasoning(None, &details).unwrap();
        assert_eq!(merged, "first part\n\nsecond part");
    }

    #[test]
    fn parse_reasoning_details_drops_malformed_entries() {
        let raw = serde_json::json!([
            { "type": "reasoning.text", "text": "ok" },
            { "notType": true },
        ]);
        let parsed = parse_reasoning_details(Some(&raw));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text.as_deref(), Some("ok"));
    }
}
