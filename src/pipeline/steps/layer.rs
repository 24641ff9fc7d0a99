use std::sync::Arc;

use async_trait::async_trait;

use crate::datastore::LayerRegistry;
use crate::geometry::CrsTransform;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::PipelineStep;

/// Resolves the layer and its style from `layerId` and the optional `styleId`
pub struct GetLayerStep {
    layers: Arc<LayerRegistry>,
}

impl GetLayerStep {
    pub fn new(layers: Arc<LayerRegistry>) -> Self {
        Self { layers }
    }
}

#[async_trait]
impl<R: Send + 'static> PipelineStep<R> for GetLayerStep {
    fn name(&self) -> &'static str {
        "get_layer"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _response: &mut R) -> Result<(), PipelineError> {
        let layer_id = ctx.require(keys::LAYER_ID)?;
        let layer = self
            .layers
            .get(layer_id)
            .ok_or_else(|| PipelineError::LayerNotFound(layer_id.clone()))?;

        let style = match ctx.get(keys::STYLE_ID) {
            Some(style_id) => Some(layer.style(Some(style_id)).cloned().ok_or_else(|| {
                PipelineError::InvalidArgument(format!("unknown style '{}' for layer {}", style_id, layer.id()))
            })?),
            None => layer.style(None).cloned(),
        };
        if let Some(style) = style {
            ctx.put(keys::STYLE, style);
        }
        ctx.put(keys::LAYER, layer);
        Ok(())
    }
}

/// Normalizes the requested CRS (default: the layer CRS) and derives the
/// transform from layer coordinates into it
pub struct CrsStep;

#[async_trait]
impl<R: Send + 'static> PipelineStep<R> for CrsStep {
    fn name(&self) -> &'static str {
        "crs"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _response: &mut R) -> Result<(), PipelineError> {
        let layer = ctx.require(keys::LAYER)?.clone();
        let requested = ctx
            .get(keys::CRS)
            .cloned()
            .unwrap_or_else(|| layer.crs().to_string());
        let crs = CrsTransform::normalize(&requested)?;
        let transform = CrsTransform::between(layer.crs(), &crs)?;
        ctx.put(keys::CRS, crs);
        ctx.put(keys::CRS_TRANSFORM, transform);
        Ok(())
    }
}
