use std::sync::Arc;

use axum::extract::FromRef;
use uuid::Uuid;

use crate::cache::{CacheStore, InMemoryCacheStore, NoOpCacheStore};
use crate::config::AppConfig;
use crate::datastore::LayerRegistry;
use crate::pipeline::{PipelineDependencies, PipelineError, PipelineFile, Pipelines};
use crate::render::{PngRenderer, Renderer};
use crate::security::SecurityManager;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub layers: Arc<LayerRegistry>,
    pub security: Arc<SecurityManager>,
    pub cache: Arc<dyn CacheStore>,
    pub pipelines: Arc<Pipelines>,
}

impl AppState {
    /// Wire the pipelines over the given layers and security providers
    pub fn build(
        config: AppConfig,
        layers: LayerRegistry,
        security: SecurityManager,
        pipelines: &PipelineFile,
    ) -> Result<Self, PipelineError> {
        let cache: Arc<dyn CacheStore> = if config.cache.enabled {
            Arc::new(InMemoryCacheStore::new(config.cache.max_entries))
        } else {
            tracing::info!("Tile cache disabled");
            Arc::new(NoOpCacheStore)
        };
        let renderer: Arc<dyn Renderer> = Arc::new(PngRenderer::new());
        Self::with_parts(config, Arc::new(layers), Arc::new(security), cache, renderer, pipelines)
    }

    pub fn with_parts(
        config: AppConfig,
        layers: Arc<LayerRegistry>,
        security: Arc<SecurityManager>,
        cache: Arc<dyn CacheStore>,
        renderer: Arc<dyn Renderer>,
        pipelines: &PipelineFile,
    ) -> Result<Self, PipelineError> {
        let rebuild_secret = match &config.cache.rebuild_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::info!("No rebuild secret configured, rebuild URLs are valid for this process only");
                Uuid::new_v4().to_string()
            }
        };
        let deps = PipelineDependencies {
            layers: layers.clone(),
            cache: cache.clone(),
            security: security.clone(),
            renderer,
            tile_size: config.render.tile_size,
            rebuild_secret,
        };
        let pipelines = Pipelines::build(pipelines, &deps)?;
        tracing::info!(
            "Application state ready: {} layers, security services {:?}",
            layers.len(),
            security.service_ids()
        );
        Ok(Self {
            config: Arc::new(config),
            layers,
            security,
            cache,
            pipelines: Arc::new(pipelines),
        })
    }
}

impl FromRef<AppState> for Arc<SecurityManager> {
    fn from_ref(state: &AppState) -> Self {
        state.security.clone()
    }
}
