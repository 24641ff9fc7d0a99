use async_trait::async_trait;

use super::context::PipelineContext;
use super::error::PipelineError;

/// Decision taken by an interceptor before its wrapped steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    ExecuteAll,
    /// Response already complete; wrapped steps must not run
    ExecuteNone,
}

/// Unit of work in a pipeline producing a response of type `R`
#[async_trait]
pub trait PipelineStep<R: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut PipelineContext, response: &mut R) -> Result<(), PipelineError>;
}

/// Wraps a sub-sequence of steps
#[async_trait]
pub trait PipelineInterceptor<R: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before_steps(&self, ctx: &mut PipelineContext, response: &mut R) -> Result<ExecutionMode, PipelineError>;

    async fn after_steps(&self, ctx: &mut PipelineContext, response: &mut R) -> Result<(), PipelineError>;
}
