use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::state::AppState;
use crate::filter::FilterWhere;
use crate::geometry::CrsTransform;
use crate::pipeline::config::{GET_RASTER, GET_TILE, RASTERIZE};
use crate::pipeline::{
    keys, FeatureIncludes, PipelineContext, PipelineError, RasterizingContainer, TileCode, TileContainer,
    TileMetadata,
};
use crate::security::SecurityContext;

/// Query string of the tile endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TileQuery {
    /// JSON filter expression, URL-encoded
    pub filter: Option<String>,
    pub style: Option<String>,
    pub crs: Option<String>,
    pub feature_includes: Option<u8>,
}

pub struct TileService;

impl TileService {
    /// Vector tile with a `raster_url` for the matching rebuildable raster
    pub async fn tile(
        state: &AppState,
        security: Arc<SecurityContext>,
        layer_id: &str,
        code: TileCode,
        query: TileQuery,
    ) -> Result<TileContainer, PipelineError> {
        let mut ctx = Self::tile_context(state, security, layer_id, code, query)?;
        let mut response = TileContainer::default();
        state
            .pipelines
            .tiles
            .execute(GET_TILE, Some(layer_id), &mut ctx, &mut response)
            .await?;
        Ok(response)
    }

    /// Raster tile rendered with the caller's own security context
    pub async fn raster(
        state: &AppState,
        security: Arc<SecurityContext>,
        layer_id: &str,
        code: TileCode,
        query: TileQuery,
    ) -> Result<RasterizingContainer, PipelineError> {
        let mut ctx = Self::tile_context(state, security, layer_id, code, query)?;
        let mut response = RasterizingContainer::default();
        state
            .pipelines
            .raster
            .execute(GET_RASTER, Some(layer_id), &mut ctx, &mut response)
            .await?;
        Ok(response)
    }

    /// Raster tile rebuilt from a rebuild record; the caller is not authenticated,
    /// the security context saved with the record applies
    pub async fn rasterize(state: &AppState, layer_id: &str, key: &str) -> Result<RasterizingContainer, PipelineError> {
        let mut ctx = PipelineContext::new(Arc::new(SecurityContext::anonymous()))
            .with(keys::LAYER_ID, layer_id.to_string())
            .with(keys::REBUILD_KEY, key.to_string());
        let mut response = RasterizingContainer::default();
        state
            .pipelines
            .raster
            .execute(RASTERIZE, Some(layer_id), &mut ctx, &mut response)
            .await?;
        Ok(response)
    }

    fn tile_context(
        state: &AppState,
        security: Arc<SecurityContext>,
        layer_id: &str,
        code: TileCode,
        query: TileQuery,
    ) -> Result<PipelineContext, PipelineError> {
        let layer = state
            .layers
            .get(layer_id)
            .ok_or_else(|| PipelineError::LayerNotFound(layer_id.to_string()))?;

        let filter_expr: Option<Value> = match &query.filter {
            Some(text) => Some(
                serde_json::from_str(text)
                    .map_err(|e| PipelineError::InvalidArgument(format!("filter is not valid JSON: {}", e)))?,
            ),
            None => None,
        };
        let includes = match query.feature_includes {
            Some(bits) => FeatureIncludes::from_bits(bits)?,
            None => FeatureIncludes::default(),
        };
        let crs = CrsTransform::normalize(query.crs.as_deref().unwrap_or(layer.crs()))?;
        let bounds = code.bounds(layer.max_extent());

        let metadata = TileMetadata {
            layer_id: layer_id.to_string(),
            code,
            // Map units per pixel
            scale: bounds.width() / f64::from(state.config.render.tile_size.max(1)),
            filter: filter_expr.clone(),
            style_id: query.style.clone(),
            feature_includes: includes,
            crs: crs.clone(),
        };

        let mut ctx = PipelineContext::new(security)
            .with(keys::LAYER_ID, layer_id.to_string())
            .with(keys::TILE_METADATA, metadata)
            .with(keys::FEATURE_INCLUDES, includes)
            .with(keys::CRS, crs);
        if let Some(expr) = &filter_expr {
            ctx.put(keys::FILTER, FilterWhere::parse(expr)?);
        }
        if let Some(style) = query.style {
            ctx.put(keys::STYLE_ID, style);
        }
        Ok(ctx)
    }
}
