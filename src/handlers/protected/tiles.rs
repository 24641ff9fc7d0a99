use axum::extract::{Path, Query, State};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Caller, PngResponse};
use crate::pipeline::{TileCode, TileContainer};
use crate::services::{AppState, TileQuery, TileService};

/// GET /api/tiles/:layer/:level/:x/:y - vector tile with its rebuild raster URL
pub async fn tile_get(
    State(state): State<AppState>,
    Caller(security): Caller,
    Path((layer, level, x, y)): Path<(String, u8, u32, u32)>,
    Query(query): Query<TileQuery>,
) -> ApiResult<TileContainer> {
    let code = TileCode::new(level, x, y)?;
    let tile = TileService::tile(&state, security, &layer, code, query).await?;
    Ok(ApiResponse::success(tile))
}

/// GET /api/tiles/:layer/:level/:x/:y/raster - PNG tile
pub async fn raster_get(
    State(state): State<AppState>,
    Caller(security): Caller,
    Path((layer, level, x, y)): Path<(String, u8, u32, u32)>,
    Query(query): Query<TileQuery>,
) -> Result<PngResponse, ApiError> {
    let code = TileCode::new(level, x, y)?;
    let raster = TileService::raster(&state, security, &layer, code, query).await?;
    Ok(PngResponse {
        tile_id: raster.tile_id,
        image: raster.image,
    })
}
