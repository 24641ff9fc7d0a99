use axum::{
    extract::{Path, State},
    Json,
};

use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::pipeline::GetFeaturesContainer;
use crate::services::{AppState, FeatureSearchRequest, FeatureService};

/// POST /api/features/:layer - feature search filtered by the caller's security
pub async fn features_post(
    State(state): State<AppState>,
    Caller(security): Caller,
    Path(layer): Path<String>,
    Json(request): Json<FeatureSearchRequest>,
) -> ApiResult<GetFeaturesContainer> {
    let features = FeatureService::search(&state, security, &layer, request).await?;
    Ok(ApiResponse::success(features))
}
