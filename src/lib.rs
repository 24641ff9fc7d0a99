pub mod cache;
pub mod config;
pub mod datastore;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod render;
pub mod security;
pub mod services;
pub mod style;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::AppState;

/// Application router over the given state
pub fn app(state: AppState) -> Router {
    let cors = if state.config.server.enable_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/api/rasterize/:layer/:key", get(handlers::public::rasterize_get))
        // Bearer token optional; anonymous callers see what zero authentications allow
        .merge(protected_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected_routes() -> Router<AppState> {
    use handlers::protected;

    Router::new()
        .route("/api/features/:layer", post(protected::features_post))
        .route("/api/tiles/:layer/:level/:x/:y", get(protected::tile_get))
        .route("/api/tiles/:layer/:level/:x/:y/raster", get(protected::raster_get))
        .route("/api/auth/whoami", get(protected::whoami_get))
        .route("/api/cache/:layer", delete(protected::cache_delete))
}
