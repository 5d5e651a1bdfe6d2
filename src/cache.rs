//! In-memory response cache
//!
//! Maps a conversation fingerprint to a generated reply. Entries expire
//! after a configurable TTL and are never mutated in place; a `put` for an
//! existing fingerprint replaces the entry wholesale. Capacity is otherwise
//! unbounded, matching the single-instance deployment model.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

/// Deterministic cache key over a chat, the system prompt and the trailing
/// conversation window.
///
/// Components are length-prefixed before hashing so that shifting text
/// between adjacent messages cannot produce the same key.
#[must_use]
pub fn fingerprint(chat_id: &str, prompt: &str, last_texts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for part in [chat_id, prompt] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    for text in last_texts {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Entry count and approximate serialized size of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub approx_bytes: u64,
}

/// TTL-bounded cache of generated replies keyed by fingerprint
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, String>,
}

impl ResponseCache {
    /// Creates a cache whose entries expire after `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Returns the cached reply for a fingerprint, or `None` if absent or
    /// older than the TTL
    pub async fn get(&self, fingerprint: &str) -> Option<String> {
        self.cache.get(fingerprint).await
    }

    /// Stores a reply, overwriting any prior entry for the fingerprint
    pub async fn put(&self, fingerprint: String, reply: String) {
        debug!(fingerprint = %fingerprint, "Caching generated reply");
        self.cache.insert(fingerprint, reply).await;
    }

    /// Removes all entries unconditionally
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Reports entry count and approximate serialized size
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        let approx_bytes = self
            .cache
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        CacheStats {
            entries: self.cache.entry_count(),
            approx_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let texts = vec!["Hi".to_string(), "Hello".to_string()];
        let a = fingerprint("chat1", "prompt", &texts);
        let b = fingerprint("chat1", "prompt", &texts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_sensitive_to_each_input() {
        let texts = vec!["Hi".to_string(), "Hello".to_string()];
        let base = fingerprint("chat1", "prompt", &texts);

        assert_ne!(base, fingerprint("chat2", "prompt", &texts));
        assert_ne!(base, fingerprint("chat1", "other prompt", &texts));

        for i in 0..texts.len() {
            let mut changed = texts.clone();
            changed[i].push('!');
            assert_ne!(base, fingerprint("chat1", "prompt", &changed));
        }
    }

    #[test]
    fn test_fingerprint_boundary_shift() {
        // Moving a character across a message boundary must change the key
        let a = fingerprint("c", "p", &["ab".to_string(), "c".to_string()]);
        let b = fingerprint("c", "p", &["a".to_string(), "bc".to_string()]);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_fingerprint_deterministic(
            chat_id in ".{0,16}",
            prompt in ".{0,64}",
            texts in prop::collection::vec(".{0,32}", 0..6),
        ) {
            let a = fingerprint(&chat_id, &prompt, &texts);
            let b = fingerprint(&chat_id, &prompt, &texts);
            prop_assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = ResponseCache::new(Duration::from_millis(100));
        cache.put("fp".to_string(), "reply".to_string()).await;

        // Well before the TTL the entry is present
        assert_eq!(cache.get("fp").await.as_deref(), Some("reply"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Past the TTL the entry is treated as absent
        assert_eq!(cache.get("fp").await, None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("fp".to_string(), "first".to_string()).await;
        cache.put("fp".to_string(), "second".to_string()).await;
        assert_eq!(cache.get("fp").await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("aa".to_string(), "1234".to_string()).await;
        cache.put("bb".to_string(), "56".to_string()).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.approx_bytes, (2 + 4 + 2 + 2) as u64);

        cache.clear();
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.approx_bytes, 0);
    }
}
