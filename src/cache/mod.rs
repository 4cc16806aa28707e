use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{DomainError, DomainResult};

pub mod invalidation;
pub mod keys;

pub use invalidation::{CacheNamespace, InvalidationRouter};

/// Key/value memoization in front of expensive aggregate queries.
///
/// A hit returns the stored JSON value as-is, including cached nulls,
/// zeros and empty lists, which stay distinguishable from a miss because
/// entries are kept in an envelope with an explicit presence flag rather
/// than probed by truthiness.
///
/// Cache failures are never fatal; implementations log and degrade to a
/// miss so the caller recomputes.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn delete(&self, key: &str);

    /// Evict every key starting with `prefix`, returning how many went.
    async fn flush_pattern(&self, prefix: &str) -> usize;
}

/// Read-through helper: return the cached value under `key`, or run
/// `compute`, store its result with `ttl`, and return it.
///
/// An undecodable cached value is dropped and recomputed; compute errors
/// propagate without touching the cache.
pub async fn remember<T, F, Fut>(
    cache: &dyn Cache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> DomainResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = DomainResult<T>> + Send,
{
    if let Some(cached) = cache.get(key).await {
        match serde_json::from_value(cached) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => {
                log::warn!("Dropping undecodable cache entry '{}': {}", key, e);
                cache.delete(key).await;
            }
        }
    }

    let computed = compute().await?;
    let value = serde_json::to_value(&computed)
        .map_err(|e| DomainError::Internal(format!("Cache encode failed for '{}': {}", key, e)))?;
    cache.set(key, value, ttl).await;
    Ok(computed)
}

/// Stored envelope: the value plus its expiry instant.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process cache with TTL and prefix eviction.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn flush_pattern(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_cached_falsy_values_are_hits() {
        let cache = MemoryCache::new();
        cache.set("count", json!(0), TTL).await;
        cache.set("flag", json!(false), TTL).await;
        cache.set("nothing", Value::Null, TTL).await;

        assert_eq!(cache.get("count").await, Some(json!(0)));
        assert_eq!(cache.get("flag").await, Some(json!(false)));
        assert_eq!(cache.get("nothing").await, Some(Value::Null));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_flush_pattern_counts_evictions() {
        let cache = MemoryCache::new();
        cache.set("project_hours_1", json!(1), TTL).await;
        cache.set("project_hours_2", json!(2), TTL).await;
        cache.set("report_summary_1", json!(3), TTL).await;

        assert_eq!(cache.flush_pattern("project_hours_").await, 2);
        assert_eq!(cache.get("project_hours_1").await, None);
        assert_eq!(cache.get("report_summary_1").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_remember_computes_once() {
        let cache = MemoryCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: i64 = remember(&cache, "answer", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();
            assert_eq!(value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.flush_pattern("answer").await;
        let value: i64 = remember(&cache, "answer", TTL, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
