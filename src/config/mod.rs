use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub paging: PagingConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
    pub sources: SourcesConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Upper bound for an explicit `max`; `None` leaves requests unclamped
    pub max_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    /// Mixed into rebuild keys; a random one is drawn at startup when unset
    pub rebuild_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HS256 secret; the JWT provider is only configured when set
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: u64,
}

/// YAML files describing layers, roles/users and pipeline overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub layers: String,
    pub security: String,
    pub pipelines: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub tile_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("SERVER_PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        if let Ok(v) = env::var("PAGING_MAX_LIMIT") {
            self.paging.max_limit = v.parse().ok();
        }

        if let Ok(v) = env::var("CACHE_ENABLED") {
            self.cache.enabled = v.parse().unwrap_or(self.cache.enabled);
        }
        if let Ok(v) = env::var("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = v.parse().unwrap_or(self.cache.max_entries);
        }
        if let Ok(v) = env::var("CACHE_REBUILD_SECRET") {
            self.cache.rebuild_secret = Some(v).filter(|s| !s.is_empty());
        }

        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        if let Ok(v) = env::var("LAYERS_CONFIG") {
            self.sources.layers = v;
        }
        if let Ok(v) = env::var("SECURITY_CONFIG") {
            self.sources.security = v;
        }
        if let Ok(v) = env::var("PIPELINES_CONFIG") {
            self.sources.pipelines = Some(v).filter(|s| !s.is_empty());
        }

        if let Ok(v) = env::var("RENDER_TILE_SIZE") {
            self.render.tile_size = v.parse().unwrap_or(self.render.tile_size);
        }

        self
    }

    /// Clamp a requested result size; 0 means unbounded and stays unbounded
    pub fn result_limit(&self, requested: usize) -> usize {
        match (requested, self.paging.max_limit) {
            (0, _) => usize::MAX,
            (n, Some(max)) => n.min(max),
            (n, None) => n,
        }
    }

    fn sources() -> SourcesConfig {
        SourcesConfig {
            layers: "config/layers.yaml".to_string(),
            security: "config/security.yaml".to_string(),
            pipelines: None,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            paging: PagingConfig { max_limit: Some(1000) },
            cache: CacheConfig {
                enabled: true,
                max_entries: 1_000,
                rebuild_secret: None,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 24 * 7,
            },
            sources: Self::sources(),
            render: RenderConfig { tile_size: 256 },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 8080,
                enable_cors: true,
            },
            paging: PagingConfig { max_limit: Some(500) },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10_000,
                rebuild_secret: None,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 24,
            },
            sources: Self::sources(),
            render: RenderConfig { tile_size: 256 },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                enable_cors: false,
            },
            paging: PagingConfig { max_limit: Some(100) },
            cache: CacheConfig {
                enabled: true,
                max_entries: 100_000,
                rebuild_secret: None,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 4,
            },
            sources: Self::sources(),
            render: RenderConfig { tile_size: 512 },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.paging.max_limit, Some(1000));
        assert!(config.cache.enabled);
        assert!(config.security.jwt_secret.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.paging.max_limit, Some(100));
        assert!(!config.server.enable_cors);
        assert_eq!(config.render.tile_size, 512);
    }

    #[test]
    fn test_result_limit() {
        let config = AppConfig::production();
        assert_eq!(config.result_limit(0), usize::MAX);
        assert_eq!(config.result_limit(10), 10);
        assert_eq!(config.result_limit(5_000), 100);

        let mut open = AppConfig::development();
        open.paging.max_limit = None;
        assert_eq!(open.result_limit(5_000), 5_000);
    }
}
