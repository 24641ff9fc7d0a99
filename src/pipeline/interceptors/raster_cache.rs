use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheCategory, CacheEntry, CacheKey, CacheStore};
use crate::pipeline::containers::RasterizingContainer;
use crate::pipeline::context::{ContextKey, PipelineContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::{ExecutionMode, PipelineInterceptor};

/// Set when the image came from the cache, so nothing is stored afterwards
const RASTER_CACHE_HIT: ContextKey<bool> = ContextKey::new("rasterCacheHit");
const RASTER_CACHE_KEY: ContextKey<CacheKey> = ContextKey::new("rasterCacheKey");

/// Serves rendered tiles from the cache; on a miss stores what the wrapped
/// steps rendered. Keys include the security id, so callers with different
/// permissions never share an image.
pub struct RasterCacheInterceptor {
    store: Arc<dyn CacheStore>,
}

impl RasterCacheInterceptor {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PipelineInterceptor<RasterizingContainer> for RasterCacheInterceptor {
    fn name(&self) -> &'static str {
        "raster_cache"
    }

    async fn before_steps(
        &self,
        ctx: &mut PipelineContext,
        response: &mut RasterizingContainer,
    ) -> Result<ExecutionMode, PipelineError> {
        let layer_id = ctx.require(keys::LAYER_ID)?;
        let metadata = ctx.require(keys::TILE_METADATA)?;
        let key = CacheKey::new(CacheCategory::Raster, layer_id.clone())
            .with_part(metadata.identity())
            .with_part(ctx.security().id());
        let tile_id = metadata.tile_id();

        let cached = match self.store.get(&key.digest()).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Raster cache lookup failed for {}: {}", tile_id, e);
                None
            }
        };
        ctx.put(RASTER_CACHE_KEY, key);

        match cached {
            Some(entry) => {
                tracing::debug!("Raster cache hit for {}", tile_id);
                response.image = entry.data;
                response.tile_id = tile_id;
                ctx.put(RASTER_CACHE_HIT, true);
                Ok(ExecutionMode::ExecuteNone)
            }
            None => {
                ctx.put(RASTER_CACHE_HIT, false);
                Ok(ExecutionMode::ExecuteAll)
            }
        }
    }

    async fn after_steps(
        &self,
        ctx: &mut PipelineContext,
        response: &mut RasterizingContainer,
    ) -> Result<(), PipelineError> {
        if ctx.get_or(RASTER_CACHE_HIT, false) {
            return Ok(());
        }
        let Some(key) = ctx.remove(RASTER_CACHE_KEY) else {
            return Ok(());
        };
        let bounds = ctx.get(keys::BOUNDS).copied();
        let entry = CacheEntry::new(response.image.clone(), bounds);
        if let Err(e) = self.store.put(&key, entry).await {
            tracing::warn!("Raster cache store failed for {}: {}", response.tile_id, e);
        }
        Ok(())
    }
}
