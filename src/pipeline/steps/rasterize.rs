use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::datastore::Feature;
use crate::geometry::CrsTransform;
use crate::pipeline::containers::RasterizingContainer;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::PipelineStep;
use crate::render::{RenderRequest, Renderer};

/// Paints the tile features. A rendering failure yields an empty image
/// rather than failing the request.
pub struct RasterizeStep {
    renderer: Arc<dyn Renderer>,
    tile_size: u32,
    failures: AtomicU64,
}

impl RasterizeStep {
    pub fn new(renderer: Arc<dyn Renderer>, tile_size: u32) -> Self {
        Self {
            renderer,
            tile_size,
            failures: AtomicU64::new(0),
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PipelineStep<RasterizingContainer> for RasterizeStep {
    fn name(&self) -> &'static str {
        "rasterize"
    }

    async fn execute(&self, ctx: &mut PipelineContext, response: &mut RasterizingContainer) -> Result<(), PipelineError> {
        let metadata = ctx.require(keys::TILE_METADATA)?;
        let bounds = ctx.require(keys::BOUNDS)?;
        let features = ctx.require(keys::TILE_FEATURES)?;
        let transform = ctx.get_or(keys::CRS_TRANSFORM, CrsTransform::Identity);

        let projected: Vec<Feature> = features
            .iter()
            .map(|f| Feature {
                geometry: f.geometry.as_ref().map(|g| transform.apply(g)),
                ..f.clone()
            })
            .collect();

        let request = RenderRequest {
            features: &projected,
            bounds: transform.apply_bbox(bounds),
            style: ctx.get(keys::STYLE),
            width: self.tile_size,
            height: self.tile_size,
        };

        response.tile_id = metadata.tile_id();
        response.image = match self.renderer.render(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "Rendering tile {} failed ({} failures so far): {}",
                    response.tile_id,
                    failures,
                    e
                );
                Vec::new()
            }
        };
        Ok(())
    }
}
