//! MCP client for connecting to MCP servers.

use std::time::Duration;

use tracing::{debug, info};

use super::channel::TransportChannel;
use super::envelope::{methods, JsonRpcErrorObject, PROTOCOL_VERSION};
use super::schema::{
    CallToolResult, Implementation, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult,
};
use super::transport::{MCPTransport, ServerTarget, StdioTransport};
use crate::error::{BridgeError, Result};
use crate::tools::{ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};

/// Upper bound on `tools/list` pages followed for one discovery.
const MAX_LIST_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Connected,
    Initialized,
    Closed,
}

/// Client for a Model Context Protocol server.
#[derive(Debug)]
pub struct MCPClient {
    channel: TransportChannel,
    state: MCPConnectionState,
    server_info: Option<Implementation>,
}

impl MCPClient {
    /// Create a new MCP client with the given transport.
    pub fn new(transport: Box<dyn MCPTransport>, request_timeout: Duration) -> Self {
        Self {
            channel: TransportChannel::new(transport, request_timeout),
            state: MCPConnectionState::Connected,
            server_info: None,
        }
    }

    /// Spawn a server process and wrap its stdio.
    pub fn spawn(target: &ServerTarget, request_timeout: Duration) -> Result<Self> {
        let transport = StdioTransport::spawn(target)?;
        Ok(Self::new(Box::new(transport), request_timeout))
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == MCPConnectionState::Initialized
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Run the `initialize` handshake. Repeated calls are no-ops.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            MCPConnectionState::Initialized => return Ok(()),
            MCPConnectionState::Closed => return Err(closed_error()),
            MCPConnectionState::Connected => {}
        }

        let params = serde_json::to_value(InitializeParams::new(Implementation::this_crate()))?;
        let raw = self.channel.request(methods::INITIALIZE, Some(params)).await?;
        let result: InitializeResult = serde_json::from_value(raw)?;
        if result.protocol_version != PROTOCOL_VERSION {
            debug!(
                server = %result.protocol_version,
                client = PROTOCOL_VERSION,
                "server negotiated a different protocol revision"
            );
        }
        self.channel.notify(methods::INITIALIZED, None).await?;

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "initialized tool server"
        );
        self.server_info = Some(result.server_info);
        self.state = MCPConnectionState::Initialized;
        Ok(())
    }

    /// List available tools from the MCP server, following pagination.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_initialized()?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = serde_json::to_value(ListToolsParams {
                cursor: cursor.take(),
            })?;
            let raw = self.channel.request(methods::TOOLS_LIST, Some(params)).await?;
            let page: ListToolsResult = serde_json::from_value(raw)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }
        Err(BridgeError::Protocol {
            code: JsonRpcErrorObject::INTERNAL_ERROR,
            message: format!("tools/list did not finish within {MAX_LIST_PAGES} pages"),
        })
    }

    /// Execute a tool on the MCP server.
    ///
    /// Tool-level failures come back as [`ToolInvocationResult::Failure`];
    /// only transport and protocol problems are errors.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolInvocationResult> {
        self.ensure_initialized()?;
        let arguments = coerce_tool_arguments(arguments)?;
        let params = serde_json::to_value(ToolInvocationRequest::new(name, arguments))?;
        let raw = self.channel.request(methods::TOOLS_CALL, Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(raw)?;
        Ok(result.into())
    }

    /// Liveness check.
    pub async fn ping(&mut self) -> Result<()> {
        if self.state == MCPConnectionState::Closed {
            return Err(closed_error());
        }
        self.channel.request(methods::PING, None).await.map(|_| ())
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == MCPConnectionState::Closed {
            return Ok(());
        }
        self.state = MCPConnectionState::Closed;
        self.channel.close().await
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            MCPConnectionState::Initialized => Ok(()),
            MCPConnectionState::Closed => Err(closed_error()),
            MCPConnectionState::Connected => Err(BridgeError::State(
                "MCP client must be initialized first".into(),
            )),
        }
    }
}

fn closed_error() -> BridgeError {
    BridgeError::transport("MCP session is closed")
}

/// Normalize model-produced arguments into a JSON object.
///
/// Models sometimes send arguments as a JSON-encoded string, or nothing at all.
fn coerce_tool_arguments(value: serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Null => Ok(serde_json::json!({})),
        serde_json::Value::Object(map) => Ok(serde_json::Value::Object(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(serde_json::json!({}));
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                BridgeError::InvalidArgument(format!("tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(BridgeError::InvalidArgument(format!(
            "tool arguments must be a JSON object; got {other}"
        ))),
    }
}
