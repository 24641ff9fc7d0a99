use async_trait::async_trait;

use super::feature_each::{admit_features, decorate};
use crate::geometry::CrsTransform;
use crate::pipeline::containers::TileContainer;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::PipelineStep;

/// Derives the tile bounds from the tile code; keeps bounds restored from a rebuild record
pub struct PrepareTileStep;

#[async_trait]
impl<R: Send + 'static> PipelineStep<R> for PrepareTileStep {
    fn name(&self) -> &'static str {
        "prepare_tile"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _response: &mut R) -> Result<(), PipelineError> {
        if ctx.contains(keys::BOUNDS) {
            tracing::debug!("Tile bounds already present, skipping");
            return Ok(());
        }
        let layer = ctx.require(keys::LAYER)?;
        let metadata = ctx.require(keys::TILE_METADATA)?;
        let bounds = metadata.code.bounds(layer.max_extent());
        ctx.put(keys::BOUNDS, bounds);
        Ok(())
    }
}

/// Collects every admitted feature of the tile
pub struct TileFeaturesStep;

#[async_trait]
impl<R: Send + 'static> PipelineStep<R> for TileFeaturesStep {
    fn name(&self) -> &'static str {
        "tile_features"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _response: &mut R) -> Result<(), PipelineError> {
        let layer = ctx.require(keys::LAYER)?.clone();
        let features = admit_features(ctx, &layer, 0, usize::MAX, false).await?;
        ctx.put(keys::TILE_FEATURES, features);
        Ok(())
    }
}

/// Fills the vector tile response from the collected features
pub struct FillTileStep;

#[async_trait]
impl PipelineStep<TileContainer> for FillTileStep {
    fn name(&self) -> &'static str {
        "fill_tile"
    }

    async fn execute(&self, ctx: &mut PipelineContext, response: &mut TileContainer) -> Result<(), PipelineError> {
        let layer = ctx.require(keys::LAYER)?.clone();
        let metadata = ctx.require(keys::TILE_METADATA)?;
        let bounds = ctx.require(keys::BOUNDS)?;
        let transform = ctx.get_or(keys::CRS_TRANSFORM, CrsTransform::Identity);
        let features = ctx.require(keys::TILE_FEATURES)?;

        response.tile_id = metadata.tile_id();
        response.code = Some(metadata.code);
        response.bounds = Some(transform.apply_bbox(bounds));
        response.features = features.iter().map(|f| decorate(ctx, &layer, f)).collect();
        Ok(())
    }
}
