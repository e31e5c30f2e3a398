//! Tool server: answers JSON-RPC requests from a registry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::envelope::{
    methods, JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use super::schema::{CallToolResult, Implementation, InitializeResult, ListToolsResult};
use super::transport::{LineTransport, MCPTransport};
use crate::error::{BridgeError, Result};
use crate::session::SessionContext;
use crate::tools::{ToolExecutionContext, ToolInvocationRequest, ToolRegistry};

/// Serves one registry over a transport.
///
/// Requests on a connection are handled one at a time, in arrival order.
/// The session context lives as long as the server value.
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    session: SessionContext,
    info: Implementation,
    instructions: Option<String>,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry, session: SessionContext) -> Self {
        Self {
            registry: Arc::new(registry),
            session,
            info: Implementation::this_crate(),
            instructions: None,
        }
    }

    /// Override the name and version reported by `initialize`.
    pub fn with_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.info = Implementation::new(name, version);
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Serve over this process's stdin and stdout until the client hangs up.
    pub async fn serve_stdio(&self) -> Result<()> {
        let mut transport = LineTransport::new(tokio::io::stdin(), tokio::io::stdout());
        self.serve(&mut transport).await
    }

    /// Serve until the peer closes the transport.
    ///
    /// Malformed lines are answered with a parse error and skipped. Only
    /// transport failures end the loop early.
    pub async fn serve(&self, transport: &mut dyn MCPTransport) -> Result<()> {
        info!(server = %self.info.name, tools = self.registry.len(), "tool server ready");
        loop {
            let message = match transport.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("client disconnected");
                    return Ok(());
                }
                Err(BridgeError::Protocol { code, message }) => {
                    warn!(%message, "rejecting malformed message");
                    let reply = JsonRpcMessage::error(None, JsonRpcErrorObject::new(code, message));
                    transport.send(&reply).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match message {
                JsonRpcMessage::Request(request) => {
                    let reply = self.handle_request(request).await;
                    transport.send(&reply).await?;
                }
                JsonRpcMessage::Notification(notification) => {
                    debug!(method = %notification.method, "notification received");
                }
                JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                    debug!("ignoring response sent to the server");
                }
            }
        }
    }

    /// Answer a single request with a response or error envelope.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let JsonRpcRequest {
            jsonrpc,
            id,
            method,
            params,
        } = request;

        if jsonrpc != JSONRPC_VERSION {
            return JsonRpcMessage::error(
                Some(id),
                JsonRpcErrorObject::new(
                    JsonRpcErrorObject::INVALID_REQUEST,
                    format!("unsupported jsonrpc version '{jsonrpc}'"),
                ),
            );
        }

        debug!(%id, %method, "handling request");
        let outcome = match method.as_str() {
            methods::INITIALIZE => self.initialize_result(),
            methods::PING => Ok(serde_json::json!({})),
            methods::TOOLS_LIST => serde_json::to_value(ListToolsResult {
                tools: self.registry.list_tools(),
                next_cursor: None,
            })
            .map_err(internal_error),
            methods::TOOLS_CALL => self.call_tool(params).await,
            other => Err(JsonRpcErrorObject::new(
                JsonRpcErrorObject::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        match outcome {
            Ok(result) => JsonRpcMessage::response(id, result),
            Err(error) => JsonRpcMessage::error(Some(id), error),
        }
    }

    fn initialize_result(&self) -> std::result::Result<serde_json::Value, JsonRpcErrorObject> {
        serde_json::to_value(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({ "tools": { "listChanged": false } }),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
        .map_err(internal_error)
    }

    async fn call_tool(
        &self,
        params: Option<serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, JsonRpcErrorObject> {
        let request: ToolInvocationRequest =
            serde_json::from_value(params.unwrap_or(serde_json::Value::Null)).map_err(|e| {
                JsonRpcErrorObject::new(
                    JsonRpcErrorObject::INVALID_PARAMS,
                    format!("invalid tools/call params: {e}"),
                )
            })?;

        let ctx = ToolExecutionContext::new(self.session.clone());
        let result = self.registry.invoke(&request, &ctx).await;
        debug!(tool = %request.tool_name, success = result.is_success(), "tool call finished");
        serde_json::to_value(CallToolResult::from(result)).map_err(internal_error)
    }
}

fn internal_error(e: serde_json::Error) -> JsonRpcErrorObject {
    JsonRpcErrorObject::new(JsonRpcErrorObject::INTERNAL_ERROR, e.to_string())
}
