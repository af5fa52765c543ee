//! Send-side dedup ("Dedup-at-send"): suppress near-duplicate
//! chunks posted in quick succession under the same (channel, username).

use std::collections::{HashMap, VecDeque};

/// How many recent chunks to remember per (channel, username) pair before
/// the oldest falls out of consideration.
const HISTORY_DEPTH: usize = 5;

fn word_set(text: &str) -> std::collections::HashSet<&str> {
    text.split_whitespace().collect()
}

/// Jaccard similarity over the whitespace-tokenized word sets of `a` and
/// `b`: `|intersection| / |union|`, in `[0.0, 1.0]`. Two empty strings are
/// defined as identical (similarity 1.0).
#[must_use]
pub fn content_similarity(a: &str, b: &str) -> f32 {
    let set_a = word_set(a);
    let set_b = word_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Tracks recent outbound chunk text per (channel, username) so a near-
/// repeat can be suppressed before it's posted.
#[derive(Default)]
pub struct SendDedupTracker {
    recent: HashMap<(String, String), VecDeque<String>>,
}

impl SendDedupTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `content` is similar enough to something recently sent on
    /// this (channel, username) to be suppressed as a duplicate.
    pub fn is_duplicate(&self, channel_id: &str, username: &str, content: &str, threshold: f32) -> bool {
        let key = (channel_id.to_string(), username.to_string());
        self.recent
            .get(&key)
            .into_iter()
            .flatten()
            .any(|prior| content_similarity(prior, content) >= threshold)
    }

    /// Record `content` as sent, regardless of whether it was a duplicate —
    /// callers decide whether to actually post it.
    pub fn record(&mut self, channel_id: &str, username: &str, content: &str) {
        let key = (channel_id.to_string(), username.to_string());
        let entry = self.recent.entry(key).or_default();
        entry.push_back(content.to_string());
        while entry.len() > HISTORY_DEPTH {
            entry.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        assert_eq!(content_similarity("hello world", "hello world"), 1.0);
    }

    #[test]
    fn disjoint_text_has_similarity_zero() {
        assert_eq!(content_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_bounds() {
        let sim = content_similarity("the cat sat", "the cat ran");
        assert!(sim > 0.0 && sim < 1.0);
    }

    #[test]
    fn tracker_suppresses_near_repeat() {
        let mut tracker = SendDedupTracker::new();
        tracker.record("chan1", "Aria", "Hello there, how are you?");
        assert!(tracker.is_duplicate("chan1", "Aria", "Hello there, how are you?", 0.9));
    }

    #[test]
    fn tracker_allows_distinct_content() {
        let mut tracker = SendDedupTracker::new();
        tracker.record("chan1", "Aria", "Hello there, how are you?");
        assert!(!tracker.is_duplicate("chan1", "Aria", "Completely different reply here.", 0.9));
    }

    #[test]
    fn tracker_scopes_by_channel_and_username() {
        let mut tracker = SendDedupTracker::new();
        tracker.record("chan1", "Aria", "Hello there");
        assert!(!tracker.is_duplicate("chan2", "Aria", "Hello there", 0.9));
        assert!(!tracker.is_duplicate("chan1", "Kai", "Hello there", 0.9));
    }

    #[test]
    fn tracker_evicts_beyond_history_depth() {
        let mut tracker = SendDedupTracker::new();
        for i in 0..10 {
            tracker.record("chan1", "Aria", &format!("message number {i}"));
        }
        assert!(!tracker.is_duplicate("chan1", "Aria", "message number 0", 0.9));
        assert!(tracker.is_duplicate("chan1", "Aria", "message number 9", 0.9));
    }
}
