use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::feature::Feature;
use super::memory::InMemoryFeatureSource;
use super::source::FeatureSource;
use crate::filter::{Filter, FilterError, FilterWhere};
use crate::geometry::{crs::EPSG_4326, Bbox};
use crate::style::NamedStyle;

#[derive(Debug, Error)]
pub enum LayerConfigError {
    #[error("Failed to read layer configuration {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid layer configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid default filter for layer {layer}: {source}")]
    Filter { layer: String, source: FilterError },

    #[error("Duplicate layer id: {0}")]
    Duplicate(String),
}

/// Static description of a vector layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_crs")]
    pub crs: String,
    pub max_extent: Bbox,
    /// Filter always applied to this layer, in JSON filter syntax
    #[serde(default)]
    pub default_filter: Option<Value>,
    #[serde(default)]
    pub styles: Vec<NamedStyle>,
}

fn default_crs() -> String {
    EPSG_4326.to_string()
}

impl LayerInfo {
    pub fn new(id: impl Into<String>, max_extent: Bbox) -> Self {
        Self {
            id: id.into(),
            label: None,
            crs: default_crs(),
            max_extent,
            default_filter: None,
            styles: vec![NamedStyle::new("default")],
        }
    }
}

/// A vector layer: its description plus the feature source behind it
pub struct VectorLayer {
    info: LayerInfo,
    default_filter: Filter,
    source: Arc<dyn FeatureSource>,
}

impl std::fmt::Debug for VectorLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorLayer")
            .field("id", &self.info.id)
            .field("crs", &self.info.crs)
            .finish()
    }
}

impl VectorLayer {
    pub fn new(info: LayerInfo, source: Arc<dyn FeatureSource>) -> Result<Self, LayerConfigError> {
        let default_filter = match &info.default_filter {
            Some(expr) => FilterWhere::parse(expr).map_err(|source| LayerConfigError::Filter {
                layer: info.id.clone(),
                source,
            })?,
            None => Filter::Include,
        };
        Ok(Self {
            info,
            default_filter,
            source,
        })
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &LayerInfo {
        &self.info
    }

    pub fn crs(&self) -> &str {
        &self.info.crs
    }

    pub fn max_extent(&self) -> &Bbox {
        &self.info.max_extent
    }

    pub fn default_filter(&self) -> &Filter {
        &self.default_filter
    }

    pub fn source(&self) -> &Arc<dyn FeatureSource> {
        &self.source
    }

    /// Requested style, or the first configured one when none is requested
    pub fn style(&self, style_id: Option<&str>) -> Option<&NamedStyle> {
        match style_id {
            Some(id) => self.info.styles.iter().find(|s| s.id == id),
            None => self.info.styles.first(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    #[serde(default)]
    layers: Vec<LayerDefinition>,
}

#[derive(Debug, Deserialize)]
struct LayerDefinition {
    #[serde(flatten)]
    info: LayerInfo,
    #[serde(default)]
    features: Vec<Feature>,
}

/// Layers known to the service, keyed by id
#[derive(Debug, Default, Clone)]
pub struct LayerRegistry {
    layers: HashMap<String, Arc<VectorLayer>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layer: VectorLayer) -> Result<(), LayerConfigError> {
        let id = layer.id().to_string();
        if self.layers.contains_key(&id) {
            return Err(LayerConfigError::Duplicate(id));
        }
        tracing::debug!("Registered layer '{}'", id);
        self.layers.insert(id, Arc::new(layer));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<VectorLayer>> {
        self.layers.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.layers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers with inline features, backed by in-memory sources
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LayerConfigError> {
        let file: LayerFile = serde_yaml::from_str(yaml)?;
        let mut registry = Self::new();
        for definition in file.layers {
            let source = Arc::new(InMemoryFeatureSource::new(definition.features));
            registry.register(VectorLayer::new(definition.info, source)?)?;
        }
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LayerConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| LayerConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&yaml)
    }
}
