//! Lazily filled cache of filter results
//!
//! A filter name resolves to the set of entity keys it selects. The first
//! lookup of a name computes the set and stores it; later lookups are plain
//! reads. Concurrent first lookups of the same name are serialized on the
//! map shard, so the set is computed once.

use std::sync::Arc;

use ahash::AHashSet;
use cellcount_types::EntityKey;
use dashmap::DashMap;
use tracing::debug;

/// Entity keys selected by a filter
pub type FilterSet = Arc<AHashSet<EntityKey>>;

#[derive(Debug, Default)]
pub struct FilterCache {
    entries: DashMap<String, FilterSet>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached set for `filter`, computing it with `fetch` on first use.
    /// A failed fetch caches nothing.
    pub fn get_or_try_insert<E, F, I>(&self, filter: &str, fetch: F) -> Result<FilterSet, E>
    where
        F: FnOnce() -> Result<I, E>,
        I: IntoIterator<Item = EntityKey>,
    {
        if let Some(cached) = self.entries.get(filter) {
            return Ok(Arc::clone(cached.value()));
        }

        let entry = self.entries.entry(filter.to_string()).or_try_insert_with(|| {
            let keys: AHashSet<EntityKey> = fetch()?.into_iter().collect();
            debug!(filter = %filter, entities = keys.len(), "Cached filter result");
            Ok(Arc::new(keys))
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Whether a filter has been resolved already
    pub fn contains(&self, filter: &str) -> bool {
        self.entries.contains_key(filter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fetches_once_per_filter() {
        let cache = FilterCache::new();
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(vec![EntityKey::from([0, 1]), EntityKey::from([0, 2])])
        };

        let first = cache.get_or_try_insert("bright", fetch).unwrap();
        let second = cache.get_or_try_insert("bright", fetch).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = FilterCache::new();
        let err = cache
            .get_or_try_insert("broken", || Err::<Vec<EntityKey>, _>("offline".to_string()))
            .unwrap_err();
        assert_eq!(err, "offline");
        assert!(!cache.contains("broken"));
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_first_access_computes_once() {
        let cache = Arc::new(FilterCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_try_insert("shared", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, String>(vec![EntityKey::from([1, 1])])
                        })
                        .unwrap()
                        .len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
