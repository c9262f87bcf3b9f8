//! Fail-open key-value cache with pattern invalidation.
//!
//! The teacher repo has no remote cache of its own; this module is built
//! directly from the cache contract the pipeline depends on (see
//! `original_source/backend/src/core/cache.py`): every operation degrades to
//! a no-op when the backend is unreachable, instead of propagating an error.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// Storage contract a cache backend must satisfy. Production code talks to
/// an in-process store guarded behind `connect()`; tests exercise fail-open
/// behavior by substituting a backend whose methods always error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn delete_pattern(&self, pattern: &str) -> anyhow::Result<u64>;
}

/// In-process backend: a mutex-guarded map. Stands in for a real remote
/// cache (Redis et al.) behind the same trait boundary.
#[derive(Default)]
pub struct InMemoryBackend {
    store: Mutex<HashMap<String, Entry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut store = self.store.lock().await;
        if let Some(entry) = store.get(key) {
            if entry.expires_at.map(|t| t <= Instant::now()).unwrap_or(false) {
                store.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()> {
        let mut store = self.store.lock().await;
        store.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.store.lock().await.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> anyhow::Result<u64> {
        let prefix = pattern.trim_end_matches('*');
        let mut store = self.store.lock().await;
        let to_remove: Vec<String> = store
            .keys()
            .filter(|k| {
                if pattern.ends_with('*') {
                    k.starts_with(prefix)
                } else {
                    k.as_str() == pattern
                }
            })
            .cloned()
            .collect();
        let n = to_remove.len() as u64;
        for k in to_remove {
            store.remove(&k);
        }
        Ok(n)
    }
}

/// A backend that always errors — used to test fail-open behavior without
/// a real network dependency.
pub struct AlwaysFailBackend;

#[async_trait]
impl CacheBackend for AlwaysFailBackend {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("cache backend unreachable")
    }
    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> anyhow::Result<()> {
        anyhow::bail!("cache backend unreachable")
    }
    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("cache backend unreachable")
    }
    async fn delete_pattern(&self, _pattern: &str) -> anyhow::Result<u64> {
        anyhow::bail!("cache backend unreachable")
    }
}

/// Default TTLs (`original_source/backend/src/core/config.py`).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const WORKSPACE_STATS_TTL: Duration = Duration::from_secs(60);
pub const VECTOR_SEARCH_TTL: Duration = Duration::from_secs(3600);
pub const EMBEDDING_TTL: Duration = Duration::from_secs(604_800);

/// Typed façade over a [`CacheBackend`]. Every method fails open: backend
/// errors are swallowed and treated as a cache miss / no-op.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get(key).await.ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if let Ok(raw) = serde_json::to_string(value) {
            let _ = self.backend.set(key, raw, Some(ttl)).await;
        }
    }

    pub async fn delete(&self, key: &str) {
        let _ = self.backend.delete(key).await;
    }

    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        self.backend.delete_pattern(pattern).await.unwrap_or(0)
    }

    /// Fetch-or-compute with no cross-caller coordination; racing computes
    /// are acceptable (matches the source contract).
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl: Duration, f: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if let Some(v) = self.get::<T>(key).await {
            return Ok(v);
        }
        let v = f().await?;
        self.set(key, &v, ttl).await;
        Ok(v)
    }

    /// Purge every cache class scoped to a workspace.
    pub async fn invalidate_workspace(&self, workspace_id: &str) {
        for pattern in [
            format!("workspace:{}:*", workspace_id),
            format!("workspace:{}:stats", workspace_id),
            format!("workspace:{}:documents", workspace_id),
            format!("workspace:{}:metadata", workspace_id),
            format!("vector_search:{}:*", workspace_id),
            format!("document:*:workspace:{}", workspace_id),
        ] {
            self.delete_pattern(&pattern).await;
        }
    }

    /// Purge per-document keys plus the workspace aggregates that depend on them.
    pub async fn invalidate_document(&self, document_id: &str, workspace_id: &str) {
        for pattern in [
            format!("document:{}:*", document_id),
            format!("workspace:{}:documents", workspace_id),
            format!("workspace:{}:stats", workspace_id),
            format!("vector_search:{}:*", workspace_id),
        ] {
            self.delete_pattern(&pattern).await;
        }
    }
}

/// `sha256(text)` truncated to 16 hex characters — cache-key fingerprint
/// used by the embedding and vector-search key schemes.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_set_roundtrip() {
        let cache = Cache::in_memory();
        cache.set("k", &42u32, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<u32>("k").await, Some(42));
    }

    #[tokio::test]
    async fn fails_open_on_unreachable_backend() {
        let cache = Cache::new(Arc::new(AlwaysFailBackend));
        cache.set("k", &42u32, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<u32>("k").await, None);
        assert_eq!(cache.delete_pattern("k*").await, 0);
    }

    #[tokio::test]
    async fn invalidate_workspace_clears_scoped_keys() {
        let cache = Cache::in_memory();
        cache
            .set("workspace:w1:documents", &vec![1, 2, 3], Duration::from_secs(60))
            .await;
        cache
            .set(
                "vector_search:w1:abc",
                &"cached".to_string(),
                Duration::from_secs(60),
            )
            .await;
        cache.invalidate_workspace("w1").await;
        assert_eq!(cache.get::<Vec<u32>>("workspace:w1:documents").await, None);
        assert_eq!(cache.get::<String>("vector_search:w1:abc").await, None);
    }

    #[test]
    fn hash_text_is_16_hex_chars() {
        let h = hash_text("hello world");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
