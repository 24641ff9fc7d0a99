use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::traits::{ExecutionMode, PipelineInterceptor, PipelineStep};

/// Element of a pipeline: a plain step, or an interceptor around nested nodes
pub enum Node<R: Send> {
    Step(Arc<dyn PipelineStep<R>>),
    Intercepted {
        interceptor: Arc<dyn PipelineInterceptor<R>>,
        nodes: Vec<Node<R>>,
    },
}

impl<R: Send> Node<R> {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Step(step) => step.name(),
            Node::Intercepted { interceptor, .. } => interceptor.name(),
        }
    }
}

/// A named, ordered sequence of nodes
pub struct Pipeline<R: Send> {
    pub name: String,
    pub layer_id: Option<String>,
    pub nodes: Vec<Node<R>>,
}

type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + 'a>>;

/// Pipelines for one response type, resolved per layer
pub struct PipelineEngine<R: Send> {
    pipelines: HashMap<(String, Option<String>), Arc<Pipeline<R>>>,
}

impl<R: Send> Default for PipelineEngine<R> {
    fn default() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }
}

impl<R: Send + 'static> PipelineEngine<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline, replacing any earlier one with the same name and layer
    pub fn register(&mut self, pipeline: Pipeline<R>) {
        let key = (pipeline.name.clone(), pipeline.layer_id.clone());
        tracing::debug!(
            "Registered pipeline '{}' (layer {:?}) with {} nodes",
            pipeline.name,
            pipeline.layer_id,
            pipeline.nodes.len()
        );
        self.pipelines.insert(key, Arc::new(pipeline));
    }

    /// Layer-specific pipeline, else the layer-independent one
    pub fn resolve(&self, name: &str, layer_id: Option<&str>) -> Result<Arc<Pipeline<R>>, PipelineError> {
        layer_id
            .and_then(|layer| self.pipelines.get(&(name.to_string(), Some(layer.to_string()))))
            .or_else(|| self.pipelines.get(&(name.to_string(), None)))
            .cloned()
            .ok_or_else(|| PipelineError::UnknownPipeline(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.keys().any(|(n, _)| n == name)
    }

    pub async fn execute(
        &self,
        name: &str,
        layer_id: Option<&str>,
        ctx: &mut PipelineContext,
        response: &mut R,
    ) -> Result<(), PipelineError> {
        let pipeline = self.resolve(name, layer_id)?;
        tracing::info!(
            "Pipeline '{}' starting: layer={:?} request={}",
            name,
            layer_id,
            ctx.request_id()
        );

        let result = run_nodes(&pipeline.nodes, ctx, response).await;

        match &result {
            Ok(()) => tracing::info!("Pipeline '{}' completed in {:?}", name, ctx.execution_time()),
            Err(e) => tracing::warn!("Pipeline '{}' failed after {:?}: {}", name, ctx.execution_time(), e),
        }
        result
    }
}

fn run_nodes<'a, R: Send + 'static>(
    nodes: &'a [Node<R>],
    ctx: &'a mut PipelineContext,
    response: &'a mut R,
) -> NodeFuture<'a> {
    Box::pin(async move {
        for node in nodes {
            match node {
                Node::Step(step) => {
                    let step_start = Instant::now();
                    step.execute(ctx, response).await?;
                    tracing::debug!("Step: {} completed in {:?}", step.name(), step_start.elapsed());
                }
                Node::Intercepted { interceptor, nodes } => {
                    let mode = interceptor.before_steps(ctx, response).await?;
                    tracing::debug!("Interceptor: {} chose {:?}", interceptor.name(), mode);
                    if mode == ExecutionMode::ExecuteAll {
                        run_nodes(nodes, ctx, response).await?;
                    }
                    interceptor.after_steps(ctx, response).await?;
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecurityContext;
    use async_trait::async_trait;

    struct Push(&'static str);

    #[async_trait]
    impl PipelineStep<Vec<String>> for Push {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn execute(&self, _ctx: &mut PipelineContext, response: &mut Vec<String>) -> Result<(), PipelineError> {
            response.push(self.0.to_string());
            Ok(())
        }
    }

    struct Fail;

    #[async_trait]
    impl PipelineStep<Vec<String>> for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn execute(&self, _ctx: &mut PipelineContext, _response: &mut Vec<String>) -> Result<(), PipelineError> {
            Err(PipelineError::MissingParameter("layer".into()))
        }
    }

    struct Gate(ExecutionMode);

    #[async_trait]
    impl PipelineInterceptor<Vec<String>> for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn before_steps(&self, _ctx: &mut PipelineContext, response: &mut Vec<String>) -> Result<ExecutionMode, PipelineError> {
            response.push("before".into());
            Ok(self.0)
        }

        async fn after_steps(&self, _ctx: &mut PipelineContext, response: &mut Vec<String>) -> Result<(), PipelineError> {
            response.push("after".into());
            Ok(())
        }
    }

    fn pipeline(name: &str, layer: Option<&str>, nodes: Vec<Node<Vec<String>>>) -> Pipeline<Vec<String>> {
        Pipeline {
            name: name.into(),
            layer_id: layer.map(str::to_string),
            nodes,
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(Arc::new(SecurityContext::anonymous()))
    }

    async fn run(engine: &PipelineEngine<Vec<String>>, name: &str, layer: Option<&str>) -> Result<Vec<String>, PipelineError> {
        let mut response = Vec::new();
        engine.execute(name, layer, &mut ctx(), &mut response).await?;
        Ok(response)
    }

    #[tokio::test]
    async fn test_steps_run_in_order_around_interceptor() {
        let mut engine = PipelineEngine::new();
        engine.register(pipeline(
            "p",
            None,
            vec![
                Node::Step(Arc::new(Push("a"))),
                Node::Intercepted {
                    interceptor: Arc::new(Gate(ExecutionMode::ExecuteAll)),
                    nodes: vec![Node::Step(Arc::new(Push("b")))],
                },
                Node::Step(Arc::new(Push("c"))),
            ],
        ));
        assert_eq!(run(&engine, "p", None).await.unwrap(), vec!["a", "before", "b", "after", "c"]);
    }

    #[tokio::test]
    async fn test_execute_none_skips_wrapped_steps() {
        let mut engine = PipelineEngine::new();
        engine.register(pipeline(
            "p",
            None,
            vec![Node::Intercepted {
                interceptor: Arc::new(Gate(ExecutionMode::ExecuteNone)),
                nodes: vec![Node::Step(Arc::new(Push("b"))), Node::Step(Arc::new(Fail))],
            }],
        ));
        assert_eq!(run(&engine, "p", None).await.unwrap(), vec!["before", "after"]);
    }

    #[tokio::test]
    async fn test_layer_specific_pipeline_wins() {
        let mut engine = PipelineEngine::new();
        engine.register(pipeline("p", None, vec![Node::Step(Arc::new(Push("generic")))]));
        engine.register(pipeline("p", Some("roads"), vec![Node::Step(Arc::new(Push("roads")))]));
        assert_eq!(run(&engine, "p", Some("roads")).await.unwrap(), vec!["roads"]);
        assert_eq!(run(&engine, "p", Some("rivers")).await.unwrap(), vec!["generic"]);
        assert!(matches!(
            run(&engine, "missing", None).await,
            Err(PipelineError::UnknownPipeline(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_steps() {
        let mut engine = PipelineEngine::new();
        engine.register(pipeline(
            "p",
            None,
            vec![Node::Step(Arc::new(Fail)), Node::Step(Arc::new(Push("never")))],
        ));
        let mut response = Vec::new();
        let result = engine.execute("p", None, &mut ctx(), &mut response).await;
        assert!(matches!(result, Err(PipelineError::MissingParameter(_))));
        assert!(response.is_empty());
    }
}
