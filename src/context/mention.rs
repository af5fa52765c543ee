/// Strip leading personality-mention tokens from user text so the model
/// never sees an echoed "@name" (step 6). Applied idempotently:
/// running it twice on its own output is a no-op.
///
/// `aliases` may contain single- or multi-word aliases (e.g. "luna",
/// "luna the moon goddess"); the longest matching alias wins so a
/// multi-word alias isn't shadowed by a single-word prefix of itself.
#[must_use]
pub fn strip_leading_mentions(text: &str, aliases: &[String], max_alias_words: usize) -> String {
    let mut remaining = text.trim_start().to_string();

    while let Some(next) = strip_one_mention(&remaining, aliases, max_alias_words) {
        remaining = next.trim_start().to_string();
    }

    remaining
}

fn strip_one_mention(text: &str, aliases: &[String], max_alias_words: usize) -> Option<String> {
    let at_stripped = text.strip_prefix('@').unwrap_or(text);
    let words: Vec<&str> = at_stripped.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let mut best_match_len_words = 0;
    let max_words = max_alias_words.min(words.len()).max(1);

    for n in (1..=max_words).rev() {
        let candidate = words[..n].join(" ");
        let candidate_norm = normalize(&candidate);
        if aliases.iter().any(|a| normalize(a) == candidate_norm) {
            best_match_len_words = n;
            break;
        }
    }

    if best_match_len_words == 0 {
        return None;
    }

    let consumed_chars: usize = words[..best_match_len_words]
        .iter()
        .map(|w| w.len())
        .sum::<usize>()
        + (best_match_len_words.saturating_sub(1));

    let had_at_prefix = text.starts_with('@');
    let offset = if had_at_prefix { 1 } else { 0 };
    let rest = &text[offset + consumed_chars..];
    Some(rest.trim_start_matches([':', ',']).to_string())
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> Vec<String> {
        vec!["luna".to_string(), "luna the moon goddess".to_string()]
    }

    #[test]
    fn strips_single_word_alias() {
        let out = strip_leading_mentions("@luna how are you?", &aliases(), 4);
        assert_eq!(out, "how are you?");
    }

    #[test]
    fn strips_multi_word_alias_preferring_longest_match() {
        let out = strip_leading_mentions("@luna the moon goddess what's up", &aliases(), 4);
        assert_eq!(out, "what's up");
    }

    #[test]
    fn is_case_insensitive() {
        let out = strip_leading_mentions("@LUNA hello", &aliases(), 4);
        assert_eq!(out, "hello");
    }

    #[test]
    fn is_idempotent() {
        let once = strip_leading_mentions("@luna hello there", &aliases(), 4);
        let twice = strip_leading_mentions(&once, &aliases(), 4);
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_non_matching_text_untouched() {
        let out = strip_leading_mentions("hey there friend", &aliases(), 4);
        assert_eq!(out, "hey there friend");
    }

    #[test]
    fn strips_without_at_prefix_too() {
        let out = strip_leading_mentions("luna, what's the weather", &aliases(), 4);
        assert_eq!(out, "what's the weather");
    }

    #[test]
    fn empty_text_returns_empty() {
        assert_eq!(strip_leading_mentions("", &aliases(), 4), "");
    }
}
