use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{CacheCategory, CacheEntry, CacheKey, CacheStore};
use crate::datastore::LayerRegistry;
use crate::filter::FilterWhere;
use crate::geometry::CrsTransform;
use crate::pipeline::containers::{RasterizingContainer, RebuildCacheContainer, TileContainer, TileMetadata};
use crate::pipeline::context::{ContextKey, PipelineContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::{ExecutionMode, PipelineInterceptor};
use crate::security::SecurityManager;

const REBUILD_RECORD_EXISTS: ContextKey<bool> = ContextKey::new("rebuildRecordExists");

/// Key of the rebuild record for a tile as seen by one security context.
/// The digest is served on a public route, so it is keyed with a server secret.
pub fn rebuild_key(layer_id: &str, metadata: &TileMetadata, security_id: &str, secret: &str) -> CacheKey {
    CacheKey::new(CacheCategory::Rebuild, layer_id)
        .with_part(metadata.identity())
        .with_part(security_id)
        .keyed(secret)
}

/// Records how a vector tile was requested so its raster can be rebuilt
/// later from the key alone, and points the response at that raster
pub struct RebuildCacheInterceptor {
    store: Arc<dyn CacheStore>,
    secret: String,
}

impl RebuildCacheInterceptor {
    pub fn new(store: Arc<dyn CacheStore>, secret: impl Into<String>) -> Self {
        Self {
            store,
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl PipelineInterceptor<TileContainer> for RebuildCacheInterceptor {
    fn name(&self) -> &'static str {
        "rebuild_cache"
    }

    async fn before_steps(&self, ctx: &mut PipelineContext, _response: &mut TileContainer) -> Result<ExecutionMode, PipelineError> {
        let layer_id = ctx.require(keys::LAYER_ID)?;
        let metadata = ctx.require(keys::TILE_METADATA)?;
        let digest = rebuild_key(layer_id, metadata, ctx.security().id(), &self.secret).digest();

        let exists = match self.store.get(&digest).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!("Rebuild cache lookup failed: {}", e);
                false
            }
        };
        ctx.put(keys::REBUILD_KEY, digest);
        ctx.put(REBUILD_RECORD_EXISTS, exists);
        Ok(ExecutionMode::ExecuteAll)
    }

    async fn after_steps(&self, ctx: &mut PipelineContext, response: &mut TileContainer) -> Result<(), PipelineError> {
        let layer_id = ctx.require(keys::LAYER_ID)?.clone();
        let digest = ctx.require(keys::REBUILD_KEY)?.clone();

        if !ctx.get_or(REBUILD_RECORD_EXISTS, false) {
            let metadata = ctx.require(keys::TILE_METADATA)?.clone();
            let security = match ctx.security().save() {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!("Security context of tile {} cannot be saved: {}", metadata.tile_id(), e);
                    return Ok(());
                }
            };
            let record = RebuildCacheContainer { metadata, security };
            let data = match serde_json::to_vec(&record) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Rebuild record encoding failed: {}", e);
                    return Ok(());
                }
            };
            let key = rebuild_key(&layer_id, &record.metadata, ctx.security().id(), &self.secret);
            let bounds = ctx.get(keys::BOUNDS).copied();
            if let Err(e) = self.store.put(&key, CacheEntry::new(data, bounds)).await {
                tracing::warn!("Rebuild cache store failed: {}", e);
                return Ok(());
            }
            tracing::debug!("Stored rebuild record {} for tile {}", digest, record.metadata.tile_id());
        }

        response.raster_url = Some(format!("/api/rasterize/{}/{}", layer_id, digest));
        Ok(())
    }
}

/// Replays a tile request from its rebuild record: restores the layer, tile
/// parameters and the saved security context into a fresh pipeline context
pub struct RebuildRestoreInterceptor {
    store: Arc<dyn CacheStore>,
    security: Arc<SecurityManager>,
    layers: Arc<LayerRegistry>,
}

impl RebuildRestoreInterceptor {
    pub fn new(store: Arc<dyn CacheStore>, security: Arc<SecurityManager>, layers: Arc<LayerRegistry>) -> Self {
        Self { store, security, layers }
    }

    async fn load(&self, layer_id: &str, digest: &str) -> Result<(RebuildCacheContainer, CacheEntry), PipelineError> {
        let not_found = || PipelineError::RebuildNotFound(digest.to_string());
        let entry = match self.store.get(digest).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(not_found()),
            Err(e) => {
                tracing::warn!("Rebuild cache lookup failed: {}", e);
                return Err(not_found());
            }
        };
        let record: RebuildCacheContainer = serde_json::from_slice(&entry.data).map_err(|e| {
            tracing::warn!("Corrupt rebuild record {}: {}", digest, e);
            not_found()
        })?;
        if record.metadata.layer_id != layer_id {
            return Err(not_found());
        }
        Ok((record, entry))
    }
}

#[async_trait]
impl PipelineInterceptor<RasterizingContainer> for RebuildRestoreInterceptor {
    fn name(&self) -> &'static str {
        "rebuild_restore"
    }

    async fn before_steps(
        &self,
        ctx: &mut PipelineContext,
        _response: &mut RasterizingContainer,
    ) -> Result<ExecutionMode, PipelineError> {
        let layer_id = ctx.require(keys::LAYER_ID)?.clone();
        let digest = ctx.require(keys::REBUILD_KEY)?.clone();
        let (record, entry) = self.load(&layer_id, &digest).await?;
        let metadata = record.metadata;

        let security = self.security.restore(&record.security)?;
        ctx.set_security(Arc::new(security));

        let layer = self
            .layers
            .get(&layer_id)
            .ok_or_else(|| PipelineError::LayerNotFound(layer_id.clone()))?;
        let crs = CrsTransform::normalize(&metadata.crs)?;
        let transform = CrsTransform::between(layer.crs(), &crs)?;
        let bounds = entry
            .bounds
            .unwrap_or_else(|| metadata.code.bounds(layer.max_extent()));
        if let Some(expr) = &metadata.filter {
            ctx.put(keys::FILTER, FilterWhere::parse(expr)?);
        }
        let style = layer.style(metadata.style_id.as_deref()).cloned();
        match (style, &metadata.style_id) {
            (Some(style), _) => ctx.put(keys::STYLE, style),
            (None, Some(style_id)) => {
                return Err(PipelineError::InvalidArgument(format!("unknown style '{}'", style_id)));
            }
            (None, None) => {}
        }

        tracing::debug!(
            "Restored tile {} for security context '{}'",
            metadata.tile_id(),
            ctx.security().id()
        );
        ctx.put(keys::FEATURE_INCLUDES, metadata.feature_includes);
        ctx.put(keys::CRS, crs);
        ctx.put(keys::CRS_TRANSFORM, transform);
        ctx.put(keys::BOUNDS, bounds);
        ctx.put(keys::LAYER, layer);
        ctx.put(keys::TILE_METADATA, metadata);
        Ok(ExecutionMode::ExecuteAll)
    }

    async fn after_steps(&self, _ctx: &mut PipelineContext, _response: &mut RasterizingContainer) -> Result<(), PipelineError> {
        Ok(())
    }
}
