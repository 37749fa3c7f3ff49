use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::LockStore;
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Single-process store with Redis-like TTL semantics, for tests and local
/// development. Expiry uses tokio's clock so paused test time applies.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expiry(ttl_secs: Option<u64>) -> Option<Instant> {
    ttl_secs.map(|ttl| Instant::now() + Duration::from_secs(ttl))
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: expiry(Some(ttl_secs)) },
        );
        Ok(true)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: expiry(ttl_secs) },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.entries.lock().await.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(Instant::now())))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));
        let mut keys: Vec<String> = entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_only_creates_once() {
        let store = MemoryLockStore::new();
        assert!(store.set_if_absent("k", "1", 60).await.unwrap());
        assert!(!store.set_if_absent("k", "2", 60).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.set_if_absent("k", "3", 60).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let store = MemoryLockStore::new();
        store.set_if_absent("k", "1", 60).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.set_if_absent("k", "2", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MemoryLockStore::new();
        store.set("batch:b", "{}", None).await.unwrap();
        store.set("batch:a", "{}", Some(10)).await.unwrap();
        store.set("other", "{}", None).await.unwrap();

        let keys = store.keys_with_prefix("batch:").await.unwrap();
        assert_eq!(keys, vec!["batch:a".to_string(), "batch:b".to_string()]);
    }
}
