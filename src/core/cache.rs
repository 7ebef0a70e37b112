use crate::core::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// In-memory cache with a per-instance TTL.
///
/// Expired entries are treated as absent on read and stay in place until
/// overwritten.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    /// Whether something stored at `stored_at` is still within the TTL.
    pub fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        self.clock.now() - stored_at < self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock().await;
        if let Some(entry) = cache.get(key) {
            if !self.is_fresh(entry.stored_at) {
                debug!("Cache entry expired for key: {:?}", key);
                return None;
            }
            debug!("Cache HIT for key: {:?}", key);
            return Some(entry.value.clone());
        }
        debug!("Cache MISS for key: {:?}", key);
        None
    }

    /// Stores a value that was observed at `stored_at`, so it expires relative
    /// to that instant rather than now.
    pub async fn put_at(&self, key: K, value: V, stored_at: DateTime<Utc>) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, CacheValue { value, stored_at });
    }
}
