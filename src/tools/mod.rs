//! Tool system: schemas, validation and the server-side registry.

pub mod arguments;
pub mod invocation;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use invocation::{ContentBlock, ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};
pub use registry::ToolRegistry;
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::AgentToolParameters;
