use axum::extract::State;
use serde_json::{json, Value};

use crate::middleware::ApiResponse;
use crate::services::AppState;

/// GET / - service description
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "geo-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "rasterize": "/api/rasterize/:layer/:key (public, rebuilt from cache)",
            "features": "/api/features/:layer (bearer optional)",
            "tiles": "/api/tiles/:layer/:level/:x/:y[/raster] (bearer optional)",
            "whoami": "/api/auth/whoami (bearer optional)",
            "cache": "/api/cache/:layer (requires cache.invalidate)",
        }
    }))
}

/// GET /health - liveness plus cache and render statistics
pub async fn health(State(state): State<AppState>) -> ApiResponse<Value> {
    let stats = state.cache.stats();
    ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "layers": state.layers.ids(),
        "cache": {
            "entries": stats.entries,
            "hits": stats.hits,
            "misses": stats.misses,
            "hit_rate": stats.hit_rate(),
        },
        "render_failures": state.pipelines.render_failures(),
    }))
}
