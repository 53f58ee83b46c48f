use chrono::{DateTime, Utc};
use lru::LruCache;
use nt_core::Clock;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct Entry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Bounded LRU cache whose entries expire `ttl` after insertion.
pub struct TtlCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
            ttl,
        }
    }

    fn expired(&self, inserted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - inserted_at).to_std() {
            Ok(age) => age >= self.ttl,
            // clock went backwards
            Err(_) => false,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let inserted_at = entries.peek(key)?.inserted_at;
        if self.expired(inserted_at, now) {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let inserted_at = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.put(key, Entry { value, inserted_at });
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| self.expired(entry.inserted_at, now))
            .map(|(key, _)| key)
            .cloned()
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
