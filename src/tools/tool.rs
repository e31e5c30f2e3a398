//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::arguments::ToolArguments;
use super::invocation::{ContentBlock, ToolDescriptor};
use super::types::AgentToolParameters;
use crate::error::BridgeError;
use crate::session::SessionContext;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Session state of the server instance (or connection) running the call.
    pub session: SessionContext,
}

impl ToolExecutionContext {
    pub fn new(session: SessionContext) -> Self {
        Self { session }
    }
}

/// A named, schema-described operation served by a [`ToolRegistry`](super::ToolRegistry).
///
/// Arguments reaching [`Tool::execute`] have already been validated against
/// [`Tool::parameters`] by the registry. Returning `Err` produces an in-band
/// failure result; it never reaches the transport.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &AgentToolParameters;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<Vec<ContentBlock>, BridgeError>;

    /// Descriptor advertised through discovery.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.parameters().clone())
    }
}

type HandlerResult = Result<Vec<ContentBlock>, BridgeError>;
type BoxedHandler =
    dyn Fn(ToolArguments, ToolExecutionContext) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A tool backed by an async closure. Handy for one-off tools and tests.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<BoxedHandler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| handler(args, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments, ctx: &ToolExecutionContext) -> HandlerResult {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool").field("name", &self.name).finish_non_exhaustive()
    }
}
