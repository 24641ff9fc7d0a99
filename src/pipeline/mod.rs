// Request pipelines: named sequences of steps, optionally wrapped by
// interceptors, executed over a per-request context.

pub mod config;
pub mod containers;
pub mod context;
pub mod engine;
pub mod error;
pub mod interceptors;
pub mod keys;
pub mod steps;
pub mod traits;

pub use config::{PipelineDependencies, PipelineFile, Pipelines};
pub use containers::*;
pub use context::{ContextKey, PipelineContext};
pub use engine::{Node, Pipeline, PipelineEngine};
pub use error::PipelineError;
pub use traits::{ExecutionMode, PipelineInterceptor, PipelineStep};
