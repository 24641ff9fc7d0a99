use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::filter::FilterError;
use crate::geometry::GeometryError;
use crate::security::SecurityError;

/// Failures that abort a pipeline invocation
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("No rebuild record for key {0}")]
    RebuildNotFound(String),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Pipeline configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MissingParameter(_) => "MISSING_PARAMETER",
            PipelineError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PipelineError::UnknownPipeline(_) => "UNKNOWN_PIPELINE",
            PipelineError::LayerNotFound(_) => "LAYER_NOT_FOUND",
            PipelineError::RebuildNotFound(_) => "REBUILD_NOT_FOUND",
            PipelineError::Security(_) => "SECURITY_ERROR",
            PipelineError::Datastore(_) => "DATASTORE_ERROR",
            PipelineError::Configuration(_) => "PIPELINE_CONFIGURATION_ERROR",
        }
    }
}

impl From<FilterError> for PipelineError {
    fn from(error: FilterError) -> Self {
        PipelineError::InvalidArgument(error.to_string())
    }
}

impl From<GeometryError> for PipelineError {
    fn from(error: GeometryError) -> Self {
        PipelineError::InvalidArgument(error.to_string())
    }
}
