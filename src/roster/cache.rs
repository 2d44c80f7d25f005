//! Capacity- and TTL-bounded LRU cache.
//!
//! TTL is absolute from insertion: reads refresh recency for LRU purposes but
//! never extend an entry's lifetime. Values are shared out as `Arc` clones
//! and never mutated in place.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Time source, injectable so expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct TtlLruCache<K, V> {
    entries: LruCache<K, (Instant, Arc<V>)>,
    ttl: Duration,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash,
{
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &K, now: Instant) -> Option<Arc<V>> {
        let (inserted_at, _) = self.entries.peek(key)?;
        if now.saturating_duration_since(*inserted_at) >= self.ttl {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|(_, value)| Arc::clone(value))
    }

    /// Insert or replace `key`. At capacity the least recently used entry
    /// is evicted.
    pub fn insert(&mut self, key: K, value: V, now: Instant) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.push(key, (now, Arc::clone(&value)));
        value
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
