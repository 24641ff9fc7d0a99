use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::state::AppState;
use crate::filter::{BooleanOperator, FilterWhere, SearchCriterion, SpatialOp};
use crate::geometry::Geometry;
use crate::pipeline::config::GET_FEATURES;
use crate::pipeline::{keys, FeatureIncludes, GetFeaturesContainer, PipelineContext, PipelineError};
use crate::security::SecurityContext;

/// Search-by-location part of a feature search
#[derive(Debug, Clone, Deserialize)]
pub struct LocationQuery {
    pub geometry: Geometry,
    /// 1 intersects, 2 touches, 3 within, 4 contains
    #[serde(default = "default_query_type")]
    pub query_type: u8,
}

fn default_query_type() -> u8 {
    SpatialOp::QUERY_INTERSECTS
}

/// Body of `POST /api/features/:layer`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureSearchRequest {
    /// 0 means no limit
    pub max: usize,
    pub offset: usize,
    pub force_paging: bool,
    pub boolean_operator: Option<String>,
    pub criteria: Vec<SearchCriterion>,
    /// JSON filter expression, ANDed with the criteria
    pub filter: Option<Value>,
    pub location: Option<LocationQuery>,
    pub feature_includes: Option<u8>,
    pub crs: Option<String>,
    pub style: Option<String>,
}

pub struct FeatureService;

impl FeatureService {
    pub async fn search(
        state: &AppState,
        security: Arc<SecurityContext>,
        layer_id: &str,
        request: FeatureSearchRequest,
    ) -> Result<GetFeaturesContainer, PipelineError> {
        let mut ctx = Self::build_context(state, security, layer_id, request)?;
        let mut response = GetFeaturesContainer::default();
        state
            .pipelines
            .features
            .execute(GET_FEATURES, Some(layer_id), &mut ctx, &mut response)
            .await?;
        Ok(response)
    }

    fn build_context(
        state: &AppState,
        security: Arc<SecurityContext>,
        layer_id: &str,
        request: FeatureSearchRequest,
    ) -> Result<PipelineContext, PipelineError> {
        let boolean_operator = match request.boolean_operator.as_deref() {
            Some(op) => BooleanOperator::parse(op)?,
            None => BooleanOperator::default(),
        };
        let mut filter = FilterWhere::from_criteria(&request.criteria, boolean_operator)?;
        if let Some(expr) = &request.filter {
            filter = filter.and(FilterWhere::parse(expr)?);
        }

        let includes = match request.feature_includes {
            Some(bits) => FeatureIncludes::from_bits(bits)?,
            None => FeatureIncludes::default(),
        };

        let mut ctx = PipelineContext::new(security)
            .with(keys::LAYER_ID, layer_id.to_string())
            .with(keys::OFFSET, request.offset)
            .with(keys::MAX_RESULT_SIZE, state.config.result_limit(request.max))
            .with(keys::FORCE_PAGING, request.force_paging)
            .with(keys::FILTER, filter)
            .with(keys::FEATURE_INCLUDES, includes);

        if let Some(location) = request.location {
            let op = SpatialOp::from_code(location.query_type)?;
            ctx.put(keys::LOCATION, (location.geometry, op));
        }
        if let Some(crs) = request.crs {
            ctx.put(keys::CRS, crs);
        }
        if let Some(style) = request.style {
            ctx.put(keys::STYLE_ID, style);
        }
        Ok(ctx)
    }
}
