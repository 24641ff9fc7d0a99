use async_trait::async_trait;
use serde::Serialize;

use super::error::CacheError;
use super::key::CacheKey;
use crate::geometry::Bbox;

/// One cached artifact with the tile bounds it covers
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub bounds: Option<Bbox>,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, bounds: Option<Bbox>) -> Self {
        Self { data, bounds }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Storage backend shared by all requests
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry by its key digest
    async fn get(&self, digest: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Drop every entry of the layer, or only those whose bounds intersect `bounds`.
    /// Returns the number of entries removed.
    async fn invalidate(&self, layer_id: &str, bounds: Option<&Bbox>) -> Result<usize, CacheError>;

    fn stats(&self) -> CacheStats;
}

/// Store used when caching is disabled: every lookup misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCacheStore;

#[async_trait]
impl CacheStore for NoOpCacheStore {
    async fn get(&self, _digest: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<(), CacheError> {
        Ok(())
    }

    async fn invalidate(&self, _layer_id: &str, _bounds: Option<&Bbox>) -> Result<usize, CacheError> {
        Ok(0)
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
