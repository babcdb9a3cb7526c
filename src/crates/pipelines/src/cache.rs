//! Key-value cache interface
//!
//! The production cache is an external collaborator; the core depends on
//! this trait and treats cache unavailability as a non-event. [`NoopCache`]
//! is the stand-in when no cache is configured, [`MemoryCache`] a simple
//! in-process implementation for tests and development.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache key for a primary search call
pub fn search_key(query: &str, max_results: usize) -> String {
    format!("brave_search:{:016x}:{}", stable_hash(query), max_results)
}

/// Cache key for a research workflow
pub fn research_key(question: &str) -> String {
    format!("research:{:016x}", stable_hash(question))
}

/// Cache key for a session's conversation history
pub fn conversation_key(session_id: &str) -> String {
    format!("conversation_history:{}", session_id)
}

fn stable_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Key-value cache collaborator
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a value; None on miss or any cache fault
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value with a TTL; faults are swallowed
    async fn set(&self, key: &str, value: Value, ttl: Duration);
}

/// Cache stand-in that stores nothing
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl KvCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}
}

/// In-process cache with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires)| *expires > Instant::now());
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_formats() {
        let key = search_key("rust news", 10);
        assert!(key.starts_with("brave_search:"));
        assert!(key.ends_with(":10"));

        assert!(research_key("q").starts_with("research:"));
        assert_eq!(
            conversation_key("sess-1"),
            "conversation_history:sess-1"
        );
    }

    #[test]
    fn test_keys_are_stable_and_distinct() {
        assert_eq!(search_key("same", 5), search_key("same", 5));
        assert_ne!(search_key("one", 5), search_key("two", 5));
        assert_ne!(search_key("same", 5), search_key("same", 6));
    }

    #[tokio::test]
    async fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        cache.set("k", json!(1), Duration::from_secs(60)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        cache.set("k", json!({"v": 1}), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await, Some(json!({"v": 1})));
        assert!(cache.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.is_none());
    }
}
