use async_trait::async_trait;

use crate::datastore::{Feature, FeatureQuery, VectorLayer, Window};
use crate::geometry::CrsTransform;
use crate::pipeline::containers::{FeatureIncludes, GetFeaturesContainer, ResultFeature};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::keys;
use crate::pipeline::traits::PipelineStep;
use crate::security::{AccessKind, SecurityContext};

/// Queries the layer and keeps the features the caller may see, paged.
///
/// Default paging counts only admitted features: offset 5 skips the first five
/// visible features. Forced paging hands the window to the datastore, so the
/// offset counts raw filtered rows and a page may come back short.
pub struct FeatureEachStep;

#[async_trait]
impl PipelineStep<GetFeaturesContainer> for FeatureEachStep {
    fn name(&self) -> &'static str {
        "feature_each"
    }

    async fn execute(&self, ctx: &mut PipelineContext, response: &mut GetFeaturesContainer) -> Result<(), PipelineError> {
        let layer = ctx.require(keys::LAYER)?.clone();
        let offset = ctx.get_or(keys::OFFSET, 0);
        let limit = ctx.get_or(keys::MAX_RESULT_SIZE, usize::MAX);
        let force_paging = ctx.get_or(keys::FORCE_PAGING, false);

        let features = admit_features(ctx, &layer, offset, limit, force_paging).await?;
        response.features = features.iter().map(|f| decorate(ctx, &layer, f)).collect();

        tracing::debug!(
            "Layer '{}': {} features returned (offset={}, force_paging={})",
            layer.id(),
            response.features.len(),
            offset,
            force_paging
        );
        Ok(())
    }
}

fn is_admitted(security: &SecurityContext, layer_id: &str, feature: &Feature) -> bool {
    security.is_feature_visible(layer_id, feature)
        && security.is_feature_in_area(layer_id, feature, AccessKind::Visible)
}

/// Features passing the query filter and per-feature security, windowed per paging mode
pub(crate) async fn admit_features(
    ctx: &PipelineContext,
    layer: &VectorLayer,
    offset: usize,
    limit: usize,
    force_paging: bool,
) -> Result<Vec<Feature>, PipelineError> {
    let filter = ctx.require(keys::FILTER)?.clone();
    let security = ctx.security();

    if force_paging {
        let query = FeatureQuery {
            filter,
            window: Some(Window { offset, limit }),
        };
        let candidates = layer.source().query(&query).await?;
        return Ok(candidates
            .into_iter()
            .filter(|f| is_admitted(security, layer.id(), f))
            .collect());
    }

    let query = FeatureQuery { filter, window: None };
    let candidates = layer.source().query(&query).await?;
    Ok(candidates
        .into_iter()
        .filter(|f| is_admitted(security, layer.id(), f))
        .skip(offset)
        .take(limit)
        .collect())
}

/// Shapes an admitted feature for output according to the include flags
pub(crate) fn decorate(ctx: &PipelineContext, layer: &VectorLayer, feature: &Feature) -> ResultFeature {
    let security = ctx.security();
    let layer_id = layer.id();
    let includes = ctx.get_or(keys::FEATURE_INCLUDES, FeatureIncludes::default());
    let transform = ctx.get_or(keys::CRS_TRANSFORM, CrsTransform::Identity);
    let style = ctx.get(keys::STYLE);

    let readable: Feature = Feature {
        id: feature.id.clone(),
        attributes: feature
            .attributes
            .iter()
            .filter(|(name, _)| security.is_attribute_readable(layer_id, Some(feature), name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        geometry: None,
    };

    let label = if includes.label() {
        style
            .and_then(|s| s.label.as_ref())
            .map(|formula| formula.evaluate(&readable))
    } else {
        None
    };

    ResultFeature {
        id: feature.id.clone(),
        label,
        attributes: includes.attributes().then_some(readable.attributes),
        geometry: if includes.geometry() {
            feature.geometry.as_ref().map(|g| transform.apply(g))
        } else {
            None
        },
        style_id: if includes.style() {
            style.map(|s| s.id.clone())
        } else {
            None
        },
        updatable: security.is_feature_update_authorized(layer_id, feature)
            && security.is_feature_in_area(layer_id, feature, AccessKind::Update),
        deletable: security.is_feature_delete_authorized(layer_id, feature)
            && security.is_feature_in_area(layer_id, feature, AccessKind::Delete),
    }
}
