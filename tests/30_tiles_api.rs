mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::{Method, StatusCode};

use geo_pipeline::cache::{CacheStore, InMemoryCacheStore};
use geo_pipeline::pipeline::interceptors::rebuild_key;
use geo_pipeline::pipeline::{PipelineFile, RebuildCacheContainer};
use geo_pipeline::render::{RenderError, RenderRequest, Renderer};
use geo_pipeline::security::{SecurityFile, SecurityManager};
use geo_pipeline::services::AppState;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn tile_uri(level: u8, x: u32, y: u32) -> String {
    format!("/api/tiles/{}/{}/{}/{}", common::LAYER, level, x, y)
}

#[tokio::test]
async fn vector_tile_lists_tile_features() -> Result<()> {
    let (app, _) = common::app()?;
    // Bottom-left quadrant at level 1: x 0..10, y 0..10
    let (status, payload) = common::send_json(&app, Method::GET, &tile_uri(1, 0, 1), Some("viewer-token"), None).await?;

    assert_eq!(status, StatusCode::OK, "payload: {}", payload);
    let data = &payload["data"];
    assert_eq!(data["tile_id"], "parcels.1.0.1");
    assert_eq!(common::ids(&payload), common::id_range(1..=10));
    let raster_url = data["raster_url"].as_str().unwrap_or_default();
    assert!(raster_url.starts_with("/api/rasterize/parcels/"), "raster_url = {}", raster_url);
    Ok(())
}

#[tokio::test]
async fn raster_tile_is_png() -> Result<()> {
    let (app, _) = common::app()?;
    let (status, content_type, body) =
        common::send_bytes(&app, &format!("{}/raster", tile_uri(0, 0, 0)), Some("viewer-token")).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(&body[..8], &PNG_SIGNATURE);
    Ok(())
}

#[tokio::test]
async fn raster_cache_hits_for_identical_requests() -> Result<()> {
    let (app, state) = common::app()?;
    let uri = format!("{}/raster", tile_uri(0, 0, 0));

    let (_, _, first) = common::send_bytes(&app, &uri, Some("viewer-token")).await?;
    let before = state.cache.stats();
    let (_, _, second) = common::send_bytes(&app, &uri, Some("viewer-token")).await?;
    let after = state.cache.stats();

    assert_eq!(first, second);
    assert_eq!(after.hits, before.hits + 1);
    assert_eq!(after.stores, before.stores);
    Ok(())
}

#[tokio::test]
async fn raster_cache_is_isolated_by_security() -> Result<()> {
    let (app, state) = common::app()?;
    let uri = format!("{}/raster", tile_uri(0, 0, 0));

    let (_, _, viewer) = common::send_bytes(&app, &uri, Some("viewer-token")).await?;
    let (_, _, even) = common::send_bytes(&app, &uri, Some("even-token")).await?;

    // Both were misses and stored separately
    let stats = state.cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.stores, 2);
    assert_ne!(viewer, even);
    Ok(())
}

#[tokio::test]
async fn rebuild_url_replays_tile_with_saved_security() -> Result<()> {
    let (app, _) = common::app()?;
    let (_, payload) = common::send_json(&app, Method::GET, &tile_uri(0, 0, 0), Some("even-token"), None).await?;
    let raster_url = payload["data"]["raster_url"].as_str().unwrap_or_default().to_string();

    // No bearer token: the saved context of the record applies
    let (status, content_type, rebuilt) = common::send_bytes(&app, &raster_url, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));

    let (_, _, direct) =
        common::send_bytes(&app, &format!("{}/raster", tile_uri(0, 0, 0)), Some("even-token")).await?;
    let (_, _, viewer) =
        common::send_bytes(&app, &format!("{}/raster", tile_uri(0, 0, 0)), Some("viewer-token")).await?;

    assert_eq!(rebuilt, direct);
    assert_ne!(rebuilt, viewer);
    Ok(())
}

#[tokio::test]
async fn rebuild_url_is_stable_for_same_caller() -> Result<()> {
    let (app, _) = common::app()?;
    let (_, first) = common::send_json(&app, Method::GET, &tile_uri(2, 1, 1), Some("west-token"), None).await?;
    let (_, second) = common::send_json(&app, Method::GET, &tile_uri(2, 1, 1), Some("west-token"), None).await?;
    let (_, other) = common::send_json(&app, Method::GET, &tile_uri(2, 1, 1), Some("viewer-token"), None).await?;

    assert_eq!(first, second);
    assert_ne!(first["data"]["raster_url"], other["data"]["raster_url"]);
    Ok(())
}

#[tokio::test]
async fn unknown_rebuild_key_is_not_found() -> Result<()> {
    let (app, _) = common::app()?;
    let (status, payload) =
        common::send_json(&app, Method::GET, "/api/rasterize/parcels/deadbeef", None, None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "REBUILD_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn rebuild_key_is_bound_to_its_layer() -> Result<()> {
    let (app, _) = common::app()?;
    let (_, payload) = common::send_json(&app, Method::GET, &tile_uri(0, 0, 0), Some("viewer-token"), None).await?;
    let raster_url = payload["data"]["raster_url"].as_str().unwrap_or_default().to_string();
    let key = raster_url.rsplit('/').next().unwrap_or_default();

    let (status, payload) =
        common::send_json(&app, Method::GET, &format!("/api/rasterize/cities/{}", key), None, None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "REBUILD_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn rebuild_key_cannot_be_recomputed_without_server_secret() -> Result<()> {
    let mut config = common::config();
    config.cache.rebuild_secret = Some("server-side".to_string());
    let security = SecurityManager::from_file(SecurityFile::from_yaml_str(common::SECURITY)?, Some(common::JWT_SECRET))?;
    let state = AppState::build(config, common::layers()?, security, &PipelineFile::defaults()?)?;
    let app = geo_pipeline::app(state.clone());

    let (_, payload) = common::send_json(&app, Method::GET, &tile_uri(0, 0, 0), Some("even-token"), None).await?;
    let raster_url = payload["data"]["raster_url"].as_str().unwrap_or_default().to_string();
    let issued = raster_url.rsplit('/').next().unwrap_or_default().to_string();

    let entry = state.cache.get(&issued).await?.ok_or_else(|| anyhow::anyhow!("rebuild record missing"))?;
    let record: RebuildCacheContainer = serde_json::from_slice(&entry.data)?;
    let security_id = "role:even@static";

    // Everything but the secret is public knowledge
    assert_eq!(
        rebuild_key(common::LAYER, &record.metadata, security_id, "server-side").digest(),
        issued
    );
    let guessed = rebuild_key(common::LAYER, &record.metadata, security_id, "").digest();
    assert_ne!(guessed, issued);

    let (status, payload) = common::send_json(
        &app,
        Method::GET,
        &format!("/api/rasterize/{}/{}", common::LAYER, guessed),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["code"], "REBUILD_NOT_FOUND");
    Ok(())
}

struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::InvalidBounds)
    }
}

#[tokio::test]
async fn render_failure_serves_and_caches_empty_image() -> Result<()> {
    let config = common::config();
    let security = SecurityManager::from_file(SecurityFile::from_yaml_str(common::SECURITY)?, Some(common::JWT_SECRET))?;
    let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new(config.cache.max_entries));
    let state = AppState::with_parts(
        config,
        Arc::new(common::layers()?),
        Arc::new(security),
        cache,
        Arc::new(FailingRenderer),
        &PipelineFile::defaults()?,
    )?;
    let app = geo_pipeline::app(state.clone());

    let (status, content_type, body) =
        common::send_bytes(&app, &format!("{}/raster", tile_uri(0, 0, 0)), Some("viewer-token")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert!(body.is_empty());
    assert_eq!(state.cache.stats().stores, 1);
    assert_eq!(state.pipelines.render_failures(), 1);

    let (_, health) = common::send_json(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(health["data"]["render_failures"], 1);
    Ok(())
}

#[tokio::test]
async fn tile_outside_level_grid_is_rejected() -> Result<()> {
    let (app, _) = common::app()?;
    let (status, payload) = common::send_json(&app, Method::GET, &tile_uri(1, 2, 0), Some("viewer-token"), None).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["code"], "INVALID_ARGUMENT");
    Ok(())
}

#[tokio::test]
async fn cache_invalidation_requires_command() -> Result<()> {
    let (app, state) = common::app()?;
    common::send_bytes(&app, &format!("{}/raster", tile_uri(0, 0, 0)), Some("viewer-token")).await?;
    let uri = format!("/api/cache/{}", common::LAYER);

    let (status, payload) = common::send_json(&app, Method::DELETE, &uri, Some("viewer-token"), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["code"], "FORBIDDEN");

    let (status, payload) = common::send_json(&app, Method::DELETE, &uri, Some("admin-token"), None).await?;
    assert_eq!(status, StatusCode::OK, "payload: {}", payload);
    assert_eq!(payload["data"]["removed"], 1);
    assert_eq!(state.cache.stats().entries, 0);
    Ok(())
}

#[tokio::test]
async fn cache_invalidation_by_bounds() -> Result<()> {
    let (app, state) = common::app()?;
    // Level 1 tiles: (0,1) covers x 0..10 y 0..10, (1,0) covers x 10..20 y 10..20
    common::send_bytes(&app, &format!("{}/raster", tile_uri(1, 0, 1)), Some("viewer-token")).await?;
    common::send_bytes(&app, &format!("{}/raster", tile_uri(1, 1, 0)), Some("viewer-token")).await?;
    assert_eq!(state.cache.stats().entries, 2);

    let uri = format!("/api/cache/{}?bbox=12,12,18,18", common::LAYER);
    let (status, payload) = common::send_json(&app, Method::DELETE, &uri, Some("admin-token"), None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["data"]["removed"], 1);
    assert_eq!(state.cache.stats().entries, 1);
    Ok(())
}
