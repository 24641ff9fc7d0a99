use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::middleware::PngResponse;
use crate::services::{AppState, TileService};

/// GET /api/rasterize/:layer/:key - raster tile replayed from a rebuild record.
///
/// The key is handed out as `raster_url` by the vector tile endpoint; the
/// saved security context of the record applies, not the caller's.
pub async fn rasterize_get(
    State(state): State<AppState>,
    Path((layer, key)): Path<(String, String)>,
) -> Result<PngResponse, ApiError> {
    let raster = TileService::rasterize(&state, &layer, &key).await?;
    Ok(PngResponse {
        tile_id: raster.tile_id,
        image: raster.image,
    })
}
