//! Key-value store contract and the in-process implementation.

use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// An async string key-value store with per-entry expiry.
///
/// Single-key `get`/`set` are the only atomicity guarantees callers may rely
/// on. Expired entries are never returned.
pub trait KvStore: Send + Sync {
    /// Fetch a live value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store a value that expires after `ttl`. Overwrites any existing entry.
    fn set(&self, key: &str, value: &str, ttl: Duration)
    -> impl Future<Output = Result<()>> + Send;

    /// Remove an entry, returning whether a live one existed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl<S: KvStore> KvStore for Arc<S> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        (**self).delete(key)
    }
}

/// Expiry cap for TTLs too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Minimum time between sweeps of expired entries triggered by `set`.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: Instant,
}

impl Entries {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.next_sweep = now + SWEEP_INTERVAL;
        before - self.map.len()
    }
}

/// In-process store. Expiry follows the tokio clock.
///
/// Expired entries are dropped when read, and swept from `set` at most once
/// per minute.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.entries.lock().await.purge(Instant::now())
    }

    /// Number of stored entries, live or not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.map.is_empty()
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.map.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        entries.map.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE),
        };
        let mut entries = self.entries.lock().await;
        if now >= entries.next_sweep {
            let purged = entries.purge(now);
            if purged > 0 {
                tracing::debug!(purged, "dropped expired entries");
            }
        }
        entries.map.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.entries.lock().await.map.remove(key);
        Ok(removed.is_some_and(|entry| entry.expires_at > now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_is_capped() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::MAX).await.unwrap();
        store
            .set("j", "v", Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("j").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_refreshes_ttl() {
        let store = MemoryStore::new();
        store.set("k", "old", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        store.set("k", "new", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_reports_live_entries_only() {
        let store = MemoryStore::new();
        store.set("live", "1", Duration::from_secs(5)).await.unwrap();
        store.set("stale", "1", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(store.delete("live").await.unwrap());
        assert!(!store.delete("stale").await.unwrap());
        assert!(!store.delete("missing").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("a", "1", Duration::from_secs(1)).await.unwrap();
        store.set("b", "1", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_sweeps_expired_entries() {
        let store = MemoryStore::new();
        for i in 0..100 {
            store
                .set(&format!("stale-{i}"), "v", Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 100);

        tokio::time::advance(SWEEP_INTERVAL).await;
        store.set("live", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_shared_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let other = Arc::clone(&store);
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
