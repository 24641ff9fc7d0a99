use anyhow::Context;
use tracing_subscriber::EnvFilter;

use geo_pipeline::config::AppConfig;
use geo_pipeline::datastore::LayerRegistry;
use geo_pipeline::pipeline::PipelineFile;
use geo_pipeline::security::{SecurityFile, SecurityManager};
use geo_pipeline::services::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so LAYERS_CONFIG, SECURITY_JWT_SECRET, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = geo_pipeline::config::config().clone();
    tracing::info!("Starting geo-pipeline in {:?} mode", config.environment);

    let state = load_state(config)?;
    let port = state.config.server.port;
    let app = geo_pipeline::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("geo-pipeline listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server")?;
    Ok(())
}

fn load_state(config: AppConfig) -> anyhow::Result<AppState> {
    let layers = LayerRegistry::load(&config.sources.layers)
        .with_context(|| format!("loading layers from {}", config.sources.layers))?;

    let security_file = SecurityFile::load(&config.sources.security)
        .with_context(|| format!("loading security from {}", config.sources.security))?;
    let security = SecurityManager::from_file(security_file, config.security.jwt_secret.as_deref())?;

    let mut pipelines = PipelineFile::defaults()?;
    if let Some(path) = &config.sources.pipelines {
        let overrides = PipelineFile::load(path).with_context(|| format!("loading pipelines from {}", path))?;
        pipelines = pipelines.merged(overrides);
    }

    Ok(AppState::build(config, layers, security, &pipelines)?)
}
