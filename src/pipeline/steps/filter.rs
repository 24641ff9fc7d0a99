use async_trait::async_trait;

use crate::filter::{Filter, SpatialOp};
use crate::geometry::CrsTransform;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::PipelineStep;

/// Combines the layer default filter, the request filter and location, the
/// tile bounds and the security select filter into the query filter
pub struct FilterStep;

#[async_trait]
impl<R: Send + 'static> PipelineStep<R> for FilterStep {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn execute(&self, ctx: &mut PipelineContext, _response: &mut R) -> Result<(), PipelineError> {
        let layer = ctx.require(keys::LAYER)?.clone();
        let mut filter = layer.default_filter().clone();

        if let Some(requested) = ctx.remove(keys::FILTER) {
            filter = filter.and(requested);
        }

        if let Some((geometry, op)) = ctx.get(keys::LOCATION) {
            // Location arrives in the request CRS
            let to_layer = ctx
                .get(keys::CRS_TRANSFORM)
                .map(CrsTransform::inverse)
                .unwrap_or(CrsTransform::Identity);
            filter = filter.and(Filter::Spatial {
                op: *op,
                geometry: to_layer.apply(geometry),
            });
        }

        if let Some(bounds) = ctx.get(keys::BOUNDS) {
            filter = filter.and(Filter::Spatial {
                op: SpatialOp::Intersects,
                geometry: bounds.to_geometry(),
            });
        }

        if let Some(security_filter) = ctx.security().feature_filter(layer.id()) {
            filter = filter.and(security_filter);
        }

        tracing::debug!("Filter for layer '{}': {}", layer.id(), filter.to_key_string());
        ctx.put(keys::FILTER, filter);
        Ok(())
    }
}
