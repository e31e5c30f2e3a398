//! Convenience re-exports for common use.

pub use crate::agent::{Orchestrator, OrchestratorOptions, QueryOutcome};
pub use crate::config::BridgeConfig;
pub use crate::error::{BridgeError, Result};
pub use crate::mcp::{MCPClient, ServerTarget, ToolServer};
pub use crate::provider::{GeminiProvider, ModelProvider};
pub use crate::session::SessionContext;
pub use crate::tools::{
    AgentTool, AgentToolParameters, Tool, ToolArguments, ToolInvocationResult, ToolRegistry,
};
pub use crate::types::{GenerationSettings, ModelMessage, Role, Usage};
