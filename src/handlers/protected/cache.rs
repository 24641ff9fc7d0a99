use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::geometry::Bbox;
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::AppState;

pub const INVALIDATE_COMMAND: &str = "cache.invalidate";

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateQuery {
    /// `min_x,min_y,max_x,max_y` in the layer CRS
    pub bbox: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Invalidated {
    pub layer: String,
    pub removed: usize,
}

/// DELETE /api/cache/:layer - drop cached tiles and rebuild records of a layer
pub async fn cache_delete(
    State(state): State<AppState>,
    Caller(security): Caller,
    Path(layer): Path<String>,
    Query(query): Query<InvalidateQuery>,
) -> ApiResult<Invalidated> {
    if !security.is_command_authorized(INVALIDATE_COMMAND) {
        return Err(ApiError::forbidden(format!("'{}' is not authorized", INVALIDATE_COMMAND)));
    }
    if state.layers.get(&layer).is_none() {
        return Err(ApiError::not_found(format!("Layer not found: {}", layer)));
    }
    let bounds = query.bbox.as_deref().map(parse_bbox).transpose()?;
    let removed = state.cache.invalidate(&layer, bounds.as_ref()).await?;
    tracing::info!(
        "Invalidated {} cache entries of layer '{}' for '{}'",
        removed,
        layer,
        security.id()
    );
    Ok(ApiResponse::success(Invalidated { layer, removed }))
}

fn parse_bbox(text: &str) -> Result<Bbox, ApiError> {
    let values = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError::bad_request(format!("Invalid bbox '{}'", text)))?;
    match values.as_slice() {
        [min_x, min_y, max_x, max_y] if min_x <= max_x && min_y <= max_y => {
            Ok(Bbox::new(*min_x, *min_y, *max_x, *max_y))
        }
        _ => Err(ApiError::bad_request(format!("Invalid bbox '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        assert_eq!(parse_bbox("0, 0, 10, 5").unwrap(), Bbox::new(0.0, 0.0, 10.0, 5.0));
        assert!(parse_bbox("0,0,10").is_err());
        assert!(parse_bbox("10,0,0,5").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}
