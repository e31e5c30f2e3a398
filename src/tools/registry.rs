//! Server-side tool registry and dispatcher.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::invocation::{ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};
use super::tool::{Tool, ToolExecutionContext};
use super::validation::validate_arguments;

/// Name-unique collection of tools with schema-checked dispatch.
///
/// Discovery order is registration order. Re-registering a name swaps the
/// handler in place.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning the one it replaced, if any.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => {
                debug!(tool = tool.name(), "replacing registered tool");
                Some(std::mem::replace(slot, tool))
            }
            None => {
                self.tools.push(tool);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Descriptors of every registered tool.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run one invocation.
    ///
    /// Never panics and never returns an error: unknown tools, schema
    /// violations, handler errors and handler panics all come back as
    /// [`ToolInvocationResult::Failure`].
    pub async fn invoke(
        &self,
        request: &ToolInvocationRequest,
        ctx: &ToolExecutionContext,
    ) -> ToolInvocationResult {
        let name = request.tool_name.as_str();
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "invocation of unknown tool");
            return ToolInvocationResult::failure(format!("Unknown tool '{name}'"));
        };

        if let Err(violation) = validate_arguments(&request.arguments, &tool.parameters().schema) {
            warn!(tool = name, %violation, "rejected invalid arguments");
            return ToolInvocationResult::failure(format!(
                "Invalid arguments for tool '{name}': {violation}"
            ));
        }

        let args = ToolArguments::new(request.arguments.clone());
        match AssertUnwindSafe(tool.execute(&args, ctx)).catch_unwind().await {
            Ok(Ok(content)) => ToolInvocationResult::Success { content },
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "tool execution failed");
                ToolInvocationResult::failure(e.tool_message())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = name, %reason, "tool handler panicked");
                ToolInvocationResult::failure(format!("Tool '{name}' failed unexpectedly: {reason}"))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
