//! Process-wide cache of object tag sets.
//!
//! Bounded by an LRU capacity and, optionally, a maximum entry age.
//! Concurrent misses for the same key may both hit the backend; the last
//! writer wins. Nothing here is ever held locked across a fetch.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::error::Result;
use crate::model::tags::TagSet;

/// Used when a capacity of zero is configured.
const MIN_CAPACITY: NonZeroUsize = NonZeroUsize::MIN;

struct Cached {
    tags: TagSet,
    stored_at: Instant,
}

/// Key → [`TagSet`] cache in front of per-object tag fetches.
pub struct MetadataCache {
    entries: Mutex<LruCache<String, Cached>>,
    ttl: Option<Duration>,
}

impl MetadataCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(MIN_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Return the cached tags for `key`, or call `fetch` and remember its result.
    ///
    /// Failed fetches are not cached.
    pub fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<TagSet>
    where
        F: FnOnce(&str) -> Result<TagSet>,
    {
        if let Some(tags) = self.get(key) {
            return Ok(tags);
        }

        debug!(key, "Tag cache miss");
        let tags = fetch(key)?;
        self.lock().put(
            key.to_string(),
            Cached {
                tags: tags.clone(),
                stored_at: Instant::now(),
            },
        );
        Ok(tags)
    }

    /// Cached tags for `key`, if present and fresh.
    pub fn get(&self, key: &str) -> Option<TagSet> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(cached) if !self.is_expired(cached) => return Some(cached.tags.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        if self.lock().pop(key).is_some() {
            debug!(key, "Tag cache entry invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, cached: &Cached) -> bool {
        self.ttl
            .is_some_and(|ttl| cached.stored_at.elapsed() >= ttl)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Cached>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::MailError;

    fn tags(from: &str) -> TagSet {
        [("From", from)].into_iter().collect()
    }

    #[test]
    fn test_second_lookup_is_served_from_cache() {
        let cache = MetadataCache::new(8, None);
        let calls = Cell::new(0);
        let fetch = |_: &str| {
            calls.set(calls.get() + 1);
            Ok(tags("a@x.com"))
        };

        let first = cache.get_or_fetch("email/1", fetch).expect("first");
        let second = cache.get_or_fetch("email/1", fetch).expect("second");
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_fetch_not_cached() {
        let cache = MetadataCache::new(8, None);
        let err = cache
            .get_or_fetch("email/1", |k| Err(MailError::backend("get-tags", k, "boom")))
            .unwrap_err();
        assert!(!err.is_not_found());
        assert!(cache.is_empty());

        let ok = cache.get_or_fetch("email/1", |_| Ok(tags("a@x.com")));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = MetadataCache::new(2, None);
        for key in ["k1", "k2", "k3"] {
            cache.get_or_fetch(key, |_| Ok(tags(key))).expect("fetch");
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn test_zero_ttl_always_refetches() {
        let cache = MetadataCache::new(8, Some(Duration::ZERO));
        let calls = Cell::new(0);
        for _ in 0..3 {
            cache
                .get_or_fetch("k", |_| {
                    calls.set(calls.get() + 1);
                    Ok(TagSet::new())
                })
                .expect("fetch");
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_invalidate() {
        let cache = MetadataCache::new(8, None);
        cache.get_or_fetch("k", |_| Ok(tags("a@x.com"))).expect("fetch");
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = MetadataCache::new(0, None);
        cache.get_or_fetch("k", |_| Ok(TagSet::new())).expect("fetch");
        assert_eq!(cache.len(), 1);
    }
}
