use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::CacheError;
use super::key::CacheKey;
use super::store::{CacheEntry, CacheStats, CacheStore};
use crate::geometry::Bbox;

#[derive(Debug)]
struct StoredEntry {
    layer_id: String,
    entry: CacheEntry,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, StoredEntry>,
    clock: u64,
    stats: CacheStats,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_least_recently_used(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, stored)| stored.last_used)
            .map(|(digest, _)| digest.clone());
        if let Some(digest) = oldest {
            self.entries.remove(&digest);
            self.stats.evictions += 1;
        }
    }
}

/// Process-local cache bounded by entry count, evicting the least recently used entry
#[derive(Debug)]
pub struct InMemoryCacheStore {
    inner: Mutex<Inner>,
    max_entries: usize,
}

impl InMemoryCacheStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, digest: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut inner = self.inner.lock().map_err(|_| CacheError::Poisoned)?;
        let now = inner.tick();
        let found = inner.entries.get_mut(digest).map(|stored| {
            stored.last_used = now;
            stored.entry.clone()
        });
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        Ok(found)
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().map_err(|_| CacheError::Poisoned)?;
        let digest = key.digest();
        if !inner.entries.contains_key(&digest) && inner.entries.len() >= self.max_entries {
            inner.evict_least_recently_used();
        }
        let now = inner.tick();
        inner.entries.insert(
            digest,
            StoredEntry {
                layer_id: key.layer_id().to_string(),
                entry,
                last_used: now,
            },
        );
        inner.stats.stores += 1;
        Ok(())
    }

    async fn invalidate(&self, layer_id: &str, bounds: Option<&Bbox>) -> Result<usize, CacheError> {
        let mut inner = self.inner.lock().map_err(|_| CacheError::Poisoned)?;
        let before = inner.entries.len();
        inner.entries.retain(|_, stored| {
            let hit = stored.layer_id == layer_id
                && match (bounds, &stored.entry.bounds) {
                    (None, _) => true,
                    (Some(area), Some(tile)) => area.intersects(tile),
                    // Entries without bounds cannot be placed, so drop them
                    (Some(_), None) => true,
                };
            !hit
        });
        let removed = before - inner.entries.len();
        inner.stats.invalidations += removed as u64;
        tracing::info!("Invalidated {} cache entries for layer '{}'", removed, layer_id);
        Ok(removed)
    }

    fn stats(&self) -> CacheStats {
        match self.inner.lock() {
            Ok(inner) => CacheStats {
                entries: inner.entries.len(),
                ..inner.stats
            },
            Err(_) => CacheStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheCategory;

    fn key(layer: &str, tile: &str) -> CacheKey {
        CacheKey::new(CacheCategory::Raster, layer).with_part(tile)
    }

    fn digest(layer: &str, tile: &str) -> String {
        key(layer, tile).digest()
    }

    #[tokio::test]
    async fn test_get_put_and_stats() {
        let store = InMemoryCacheStore::new(10);
        assert_eq!(store.get(&digest("roads", "1")).await.unwrap(), None);
        store
            .put(&key("roads", "1"), CacheEntry::new(vec![1, 2, 3], None))
            .await
            .unwrap();
        let entry = store.get(&digest("roads", "1")).await.unwrap().unwrap();
        assert_eq!(entry.data, vec![1, 2, 3]);

        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores, stats.entries), (1, 1, 1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let store = InMemoryCacheStore::new(2);
        store.put(&key("roads", "a"), CacheEntry::new(vec![1], None)).await.unwrap();
        store.put(&key("roads", "b"), CacheEntry::new(vec![2], None)).await.unwrap();
        // touch "a" so "b" becomes the oldest
        store.get(&digest("roads", "a")).await.unwrap();
        store.put(&key("roads", "c"), CacheEntry::new(vec![3], None)).await.unwrap();

        assert!(store.get(&digest("roads", "a")).await.unwrap().is_some());
        assert!(store.get(&digest("roads", "b")).await.unwrap().is_none());
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_invalidate_by_layer_and_bounds() {
        let store = InMemoryCacheStore::new(10);
        let west = Some(Bbox::new(0.0, 0.0, 10.0, 10.0));
        let east = Some(Bbox::new(20.0, 0.0, 30.0, 10.0));
        store.put(&key("roads", "w"), CacheEntry::new(vec![1], west)).await.unwrap();
        store.put(&key("roads", "e"), CacheEntry::new(vec![2], east)).await.unwrap();
        store.put(&key("rivers", "w"), CacheEntry::new(vec![3], west)).await.unwrap();

        let removed = store
            .invalidate("roads", Some(&Bbox::new(5.0, 5.0, 6.0, 6.0)))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&digest("roads", "e")).await.unwrap().is_some());
        assert!(store.get(&digest("rivers", "w")).await.unwrap().is_some());

        assert_eq!(store.invalidate("roads", None).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
