//! Extraction Cache
//!
//! Time-bounded, content-addressed cache for values derived from expensive
//! model calls. Keys hash the normalized input, so the same question asked
//! with different casing or spacing hits the same entry.
//!
//! Expired entries behave exactly like misses: they are dropped on lookup
//! and by [`ExtractionCache::purge_expired`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Content-addressed cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `kind` applied to `input`
    pub fn new(kind: &str, input: &str) -> Self {
        Self::digest(kind, input, None)
    }

    /// Key that also covers the context window the extraction depended on
    pub fn with_context(kind: &str, input: &str, context: &[String]) -> Self {
        if context.is_empty() {
            return Self::new(kind, input);
        }
        let mut hasher = Sha256::new();
        for entry in context {
            hasher.update(normalize_text(entry).as_bytes());
            hasher.update([0u8]);
        }
        let context_hash = hex::encode(hasher.finalize());
        Self::digest(kind, input, Some(&context_hash))
    }

    fn digest(kind: &str, input: &str, context_hash: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(normalize_text(input).as_bytes());
        if let Some(context_hash) = context_hash {
            hasher.update([0u8]);
            hasher.update(context_hash.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // short form is enough for logs
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Lower-case, trim and collapse internal whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Mutex-guarded TTL cache
///
/// Entries are replaced on write, never mutated in place.
pub struct ExtractionCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> ExtractionCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        // a panic mid-insert cannot leave a half-written entry behind
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::trace!(key = %key, "Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store a value for `ttl`
    pub fn put(&self, key: CacheKey, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries().insert(key, entry);
    }

    /// Store a value for the default TTL
    pub fn insert(&self, key: CacheKey, value: V) {
        self.put(key, value, self.default_ttl);
    }

    /// Drop all expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries (expired ones included until purged)
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

impl<V: Clone + Send + 'static> ExtractionCache<V> {
    /// Periodically purge expired entries on the current runtime
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        let a = CacheKey::new("search", "Tìm  laptop DELL ");
        let b = CacheKey::new("search", "tìm laptop dell");
        let c = CacheKey::new("compare", "tìm laptop dell");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_context() {
        let plain = CacheKey::new("compare", "so sánh");
        let empty_ctx = CacheKey::with_context("compare", "so sánh", &[]);
        let ctx_a = CacheKey::with_context("compare", "so sánh", &["Dell XPS 13".into()]);
        let ctx_b = CacheKey::with_context("compare", "so sánh", &["MacBook Air M2".into()]);
        assert_eq!(plain, empty_ctx);
        assert_ne!(plain, ctx_a);
        assert_ne!(ctx_a, ctx_b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_ttl() {
        let cache = ExtractionCache::new(Duration::from_secs(60));
        let key = CacheKey::new("search", "laptop");
        cache.insert(key.clone(), 42u32);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key), Some(42));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key), None);
        // expired lookup removed the entry
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_and_purge() {
        let cache = ExtractionCache::new(Duration::from_secs(10));
        let short = CacheKey::new("review", "a");
        let long = CacheKey::new("review", "b");
        cache.put(short.clone(), "v1".to_string(), Duration::from_secs(1));
        cache.put(short.clone(), "v2".to_string(), Duration::from_secs(1));
        cache.insert(long.clone(), "v3".to_string());
        assert_eq!(cache.get(&short).as_deref(), Some("v2"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&long).as_deref(), Some("v3"));
    }
}
