//! Inbound-event deduplication ("Inbound classification" (b)):
//! fingerprint each event and reject anything already seen in a bounded
//! recent-history window.

use lru::LruCache;
use std::num::NonZeroUsize;

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xCBF2_9CE4_8422_2325_u64;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
    hash
}

fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute a fingerprint from message id, an optional client nonce, the
/// normalized content, and the channel id ("message id ⊕ nonce
/// if present ⊕ hash(normalized-content) ⊕ channel id").
#[must_use]
pub fn compute_fingerprint(message_id: &str, nonce: Option<&str>, content: &str, channel_id: &str) -> u64 {
    let mut hash = fnv1a64(message_id.as_bytes());
    if let Some(n) = nonce {
        hash ^= fnv1a64(n.as_bytes());
    }
    hash ^= fnv1a64(normalize_content(content).as_bytes());
    hash ^= fnv1a64(channel_id.as_bytes());
    hash
}

/// Bounded LRU of recently processed fingerprints ("≈1000
/// entries"). Not thread-safe on its own — callers hold it behind a mutex.
pub struct FingerprintCache {
    seen: LruCache<u64, ()>,
}

impl FingerprintCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// Record a fingerprint and report whether it had already been seen.
    /// True means the caller should drop this event as a duplicate.
    pub fn observe(&mut self, fingerprint: u64) -> bool {
        if self.seen.contains(&fingerprint) {
            self.seen.promote(&fingerprint);
            true
        } else {
            self.seen.put(fingerprint, ());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_events_produce_identical_fingerprints() {
        let a = compute_fingerprint("msg1", None, "hello world", "chan1");
        let b = compute_fingerprint("msg1", None, "hello world", "chan1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_channels_produce_different_fingerprints() {
        let a = compute_fingerprint("msg1", None, "hello", "chan1");
        let b = compute_fingerprint("msg1", None, "hello", "chan2");
        assert_ne!(a, b);
    }

    #[test]
    fn whitespace_normalization_collapses_equivalent_content() {
        let a = compute_fingerprint("msg1", None, "hello   world", "chan1");
        let b = compute_fingerprint("msg1", None, "hello world", "chan1");
        assert_eq!(a, b);
    }

    #[test]
    fn nonce_changes_fingerprint() {
        let a = compute_fingerprint("msg1", Some("n1"), "hello", "chan1");
        let b = compute_fingerprint("msg1", Some("n2"), "hello", "chan1");
        assert_ne!(a, b);
    }

    #[test]
    fn cache_rejects_repeat_observation() {
        let mut cache = FingerprintCache::new(4);
        let fp = compute_fingerprint("msg1", None, "hi", "chan1");
        assert!(!cache.observe(fp));
        assert!(cache.observe(fp));
    }

    #[test]
    fn cache_evicts_oldest_beyond_capacity() {
        let mut cache = FingerprintCache::new(2);
        assert!(!cache.observe(1));
        assert!(!cache.observe(2));
        assert!(!cache.observe(3)); // evicts 1
        assert!(!cache.observe(1)); // 1 was evicted, looks new again
    }
}
