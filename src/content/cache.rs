use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{ Duration, Instant };
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub capacity: NonZeroUsize,
    /// `None` keeps entries until they are evicted for space.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(128, 300)
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Bounded memo table for parsed content. Least recently used entries are
/// evicted when full; entries older than the TTL are dropped on lookup so the
/// next read goes back to disk.
pub struct ContentCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Option<Duration>,
}

impl<V: Clone> ContentCache<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(policy.capacity)),
            ttl: policy.ttl,
        }
    }

    pub async fn check(&self, key: &str) -> Option<V> {
        let mut guard = self.entries.lock().await;
        let expired = match guard.get(key) {
            Some(entry) => self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
            None => {
                return None;
            }
        };
        if expired {
            guard.pop(key);
            return None;
        }
        guard.get(key).map(|entry| entry.value.clone())
    }

    pub async fn update(&self, key: &str, value: V) {
        let mut guard = self.entries.lock().await;
        guard.put(key.to_string(), CacheEntry { value, stored_at: Instant::now() });
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.pop(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
