use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::containers::{GetFeaturesContainer, RasterizingContainer, TileContainer};
use super::engine::{Node, Pipeline, PipelineEngine};
use super::error::PipelineError;
use super::interceptors::{RasterCacheInterceptor, RebuildCacheInterceptor, RebuildRestoreInterceptor};
use super::steps::{
    CrsStep, FeatureEachStep, FillTileStep, FilterStep, GetLayerStep, PrepareTileStep, RasterizeStep,
    TileFeaturesStep,
};
use super::traits::{PipelineInterceptor, PipelineStep};
use crate::cache::CacheStore;
use crate::datastore::LayerRegistry;
use crate::render::Renderer;
use crate::security::SecurityManager;

pub const GET_FEATURES: &str = "getFeatures";
pub const GET_TILE: &str = "getTile";
pub const GET_RASTER: &str = "getRaster";
pub const RASTERIZE: &str = "rasterize";

const DEFAULT_PIPELINES: &str = include_str!("default_pipelines.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Features,
    Tile,
    Raster,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeDefinition {
    Step(String),
    Interceptor {
        interceptor: String,
        steps: Vec<NodeDefinition>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub layer: Option<String>,
    pub response: ResponseKind,
    pub steps: Vec<NodeDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineFile {
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
}

impl PipelineFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        serde_yaml::from_str(yaml).map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    pub fn defaults() -> Result<Self, PipelineError> {
        Self::from_yaml_str(DEFAULT_PIPELINES)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Built-in pipelines with `overrides` layered on top; an override replaces
    /// the definition with the same name and layer
    pub fn merged(mut self, overrides: PipelineFile) -> Self {
        for definition in overrides.pipelines {
            self.pipelines
                .retain(|p| !(p.name == definition.name && p.layer == definition.layer));
            self.pipelines.push(definition);
        }
        self
    }
}

/// Steps and interceptors that pipelines of one response type may reference
pub struct PipelineRegistry<R: Send> {
    steps: HashMap<&'static str, Arc<dyn PipelineStep<R>>>,
    interceptors: HashMap<&'static str, Arc<dyn PipelineInterceptor<R>>>,
}

impl<R: Send + 'static> PipelineRegistry<R> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            interceptors: HashMap::new(),
        }
    }

    pub fn step(mut self, step: Arc<dyn PipelineStep<R>>) -> Self {
        self.steps.insert(step.name(), step);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn PipelineInterceptor<R>>) -> Self {
        self.interceptors.insert(interceptor.name(), interceptor);
        self
    }

    fn build_nodes(&self, pipeline: &str, definitions: &[NodeDefinition]) -> Result<Vec<Node<R>>, PipelineError> {
        definitions
            .iter()
            .map(|definition| match definition {
                NodeDefinition::Step(id) => self
                    .steps
                    .get(id.as_str())
                    .cloned()
                    .map(Node::Step)
                    .ok_or_else(|| {
                        PipelineError::Configuration(format!("pipeline '{}': unknown step '{}'", pipeline, id))
                    }),
                NodeDefinition::Interceptor { interceptor, steps } => {
                    let found = self.interceptors.get(interceptor.as_str()).cloned().ok_or_else(|| {
                        PipelineError::Configuration(format!(
                            "pipeline '{}': unknown interceptor '{}'",
                            pipeline, interceptor
                        ))
                    })?;
                    Ok(Node::Intercepted {
                        interceptor: found,
                        nodes: self.build_nodes(pipeline, steps)?,
                    })
                }
            })
            .collect()
    }

    /// Engine holding every definition of the given response kind
    pub fn build_engine(&self, file: &PipelineFile, kind: ResponseKind) -> Result<PipelineEngine<R>, PipelineError> {
        let mut engine = PipelineEngine::new();
        for definition in file.pipelines.iter().filter(|p| p.response == kind) {
            engine.register(Pipeline {
                name: definition.name.clone(),
                layer_id: definition.layer.clone(),
                nodes: self.build_nodes(&definition.name, &definition.steps)?,
            });
        }
        Ok(engine)
    }
}

impl<R: Send + 'static> Default for PipelineRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators the built-in steps need
#[derive(Clone)]
pub struct PipelineDependencies {
    pub layers: Arc<LayerRegistry>,
    pub cache: Arc<dyn CacheStore>,
    pub security: Arc<SecurityManager>,
    pub renderer: Arc<dyn Renderer>,
    pub tile_size: u32,
    pub rebuild_secret: String,
}

/// One engine per response type, wired from the pipeline definitions
pub struct Pipelines {
    pub features: PipelineEngine<GetFeaturesContainer>,
    pub tiles: PipelineEngine<TileContainer>,
    pub raster: PipelineEngine<RasterizingContainer>,
    rasterize: Arc<RasterizeStep>,
}

impl Pipelines {
    pub fn build(file: &PipelineFile, deps: &PipelineDependencies) -> Result<Self, PipelineError> {
        let get_layer = Arc::new(GetLayerStep::new(deps.layers.clone()));

        let features = PipelineRegistry::<GetFeaturesContainer>::new()
            .step(get_layer.clone())
            .step(Arc::new(CrsStep))
            .step(Arc::new(FilterStep))
            .step(Arc::new(FeatureEachStep))
            .build_engine(file, ResponseKind::Features)?;

        let tiles = PipelineRegistry::<TileContainer>::new()
            .step(get_layer.clone())
            .step(Arc::new(PrepareTileStep))
            .step(Arc::new(CrsStep))
            .step(Arc::new(FilterStep))
            .step(Arc::new(TileFeaturesStep))
            .step(Arc::new(FillTileStep))
            .interceptor(Arc::new(RebuildCacheInterceptor::new(
                deps.cache.clone(),
                deps.rebuild_secret.clone(),
            )))
            .build_engine(file, ResponseKind::Tile)?;

        let rasterize = Arc::new(RasterizeStep::new(deps.renderer.clone(), deps.tile_size));
        let raster = PipelineRegistry::<RasterizingContainer>::new()
            .step(get_layer)
            .step(Arc::new(PrepareTileStep))
            .step(Arc::new(CrsStep))
            .step(Arc::new(FilterStep))
            .step(Arc::new(TileFeaturesStep))
            .step(rasterize.clone())
            .interceptor(Arc::new(RasterCacheInterceptor::new(deps.cache.clone())))
            .interceptor(Arc::new(RebuildRestoreInterceptor::new(
                deps.cache.clone(),
                deps.security.clone(),
                deps.layers.clone(),
            )))
            .build_engine(file, ResponseKind::Raster)?;

        for (name, present) in [
            (GET_FEATURES, features.contains(GET_FEATURES)),
            (GET_TILE, tiles.contains(GET_TILE)),
            (GET_RASTER, raster.contains(GET_RASTER)),
            (RASTERIZE, raster.contains(RASTERIZE)),
        ] {
            if !present {
                return Err(PipelineError::Configuration(format!("pipeline '{}' is not defined", name)));
            }
        }

        Ok(Self {
            features,
            tiles,
            raster,
            rasterize,
        })
    }

    /// Tiles whose rendering failed and were served empty
    pub fn render_failures(&self) -> u64 {
        self.rasterize.failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let file = PipelineFile::defaults().unwrap();
        assert_eq!(file.pipelines.len(), 4);
        let rasterize = file.pipelines.iter().find(|p| p.name == RASTERIZE).unwrap();
        match &rasterize.steps[0] {
            NodeDefinition::Interceptor { interceptor, steps } => {
                assert_eq!(interceptor, "rebuild_restore");
                assert!(matches!(&steps[0], NodeDefinition::Interceptor { .. }));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_override_replaces_same_name_and_layer() {
        let overrides = PipelineFile::from_yaml_str(
            r#"
pipelines:
  - name: getFeatures
    response: features
    steps: [get_layer, filter, feature_each]
  - name: getFeatures
    layer: roads
    response: features
    steps: [get_layer, crs, filter, feature_each]
"#,
        )
        .unwrap();
        let merged = PipelineFile::defaults().unwrap().merged(overrides);
        let generic: Vec<_> = merged
            .pipelines
            .iter()
            .filter(|p| p.name == GET_FEATURES && p.layer.is_none())
            .collect();
        assert_eq!(generic.len(), 1);
        assert_eq!(generic[0].steps.len(), 3);
        assert_eq!(merged.pipelines.len(), 5);
    }

    #[test]
    fn test_unknown_step_rejected() {
        let file = PipelineFile::from_yaml_str(
            "pipelines:\n  - name: getFeatures\n    response: features\n    steps: [get_layer, teleport]\n",
        )
        .unwrap();
        let registry = PipelineRegistry::<GetFeaturesContainer>::new().step(Arc::new(FeatureEachStep));
        assert!(matches!(
            registry.build_engine(&file, ResponseKind::Features),
            Err(PipelineError::Configuration(_))
        ));
    }
}
