//! Client orchestrator: drives the model and routes its tool calls to
//! connected tool servers.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::conversation::Conversation;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::mcp::{MCPClient, MCPTransport, ServerTarget};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{ToolDescriptor, ToolInvocationResult};
use crate::types::{AgentToolCall, AgentToolResult, GenerationSettings, ModelMessage, Usage};
use crate::util::with_timeout;

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone, Builder)]
pub struct OrchestratorOptions {
    /// Model rounds that may request tools before a final answer is forced.
    #[builder(default = 10)]
    pub max_tool_iterations: usize,
    /// Bound on a single model call.
    #[builder(default = Duration::from_secs(120))]
    pub model_timeout: Duration,
    /// Bound on a single request to a tool server.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
    #[builder(into)]
    pub system_prompt: Option<String>,
    #[builder(default)]
    pub settings: GenerationSettings,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&BridgeConfig> for OrchestratorOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            max_tool_iterations: config.max_tool_iterations,
            model_timeout: config.model_timeout(),
            request_timeout: config.request_timeout(),
            system_prompt: config.system_prompt.clone(),
            settings: GenerationSettings::default(),
        }
    }
}

/// What happened to one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The model answered; the exchange was appended to the history.
    Committed(String),
    /// The model produced nothing usable; the history is unchanged.
    RolledBack,
    /// The query failed; an error turn was appended and its text returned.
    Failed(String),
}

impl QueryOutcome {
    /// Text shown to the user, if any.
    pub fn into_reply(self) -> Option<String> {
        match self {
            Self::Committed(text) | Self::Failed(text) => Some(text),
            Self::RolledBack => None,
        }
    }
}

struct ServerConnection {
    label: String,
    client: Mutex<MCPClient>,
    tools: Vec<ToolDescriptor>,
}

/// One user-facing conversation over any number of tool servers.
///
/// Queries are serialized by `&mut self`. Each server connection has its own
/// lock, so tool calls bound for different servers can run concurrently.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    options: OrchestratorOptions,
    connections: Vec<ServerConnection>,
    conversation: Conversation,
    usage: Usage,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>, options: OrchestratorOptions) -> Self {
        Self {
            provider,
            options,
            connections: Vec::new(),
            conversation: Conversation::new(),
            usage: Usage::default(),
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Tokens spent across every model call so far.
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Spawn a server process, complete the handshake and merge its tools.
    pub async fn connect(&mut self, target: &ServerTarget) -> Result<Vec<ToolDescriptor>> {
        let client = MCPClient::spawn(target, self.options.request_timeout)?;
        self.connect_client(target.label(), client).await
    }

    /// Connect over an already established transport.
    pub async fn connect_transport(
        &mut self,
        label: impl Into<String>,
        transport: Box<dyn MCPTransport>,
    ) -> Result<Vec<ToolDescriptor>> {
        let client = MCPClient::new(transport, self.options.request_timeout);
        self.connect_client(label, client).await
    }

    /// Initialize a client, discover its tools and add it to the routing table.
    ///
    /// On failure the client is closed and nothing is added. When two servers
    /// offer the same tool name, the one connected first keeps it.
    pub async fn connect_client(
        &mut self,
        label: impl Into<String>,
        mut client: MCPClient,
    ) -> Result<Vec<ToolDescriptor>> {
        let label = label.into();
        let discovered = match Self::handshake(&mut client).await {
            Ok(tools) => tools,
            Err(e) => {
                error!(server = %label, error = %e, "failed to connect to tool server");
                if let Err(close_err) = client.close().await {
                    debug!(server = %label, error = %close_err, "close after failed connect");
                }
                return Err(e);
            }
        };

        for tool in &discovered {
            if let Some(owner) = self.route(&tool.name) {
                warn!(
                    tool = %tool.name,
                    owner = %owner.label,
                    ignored = %label,
                    "duplicate tool name, keeping the earlier server"
                );
            }
        }
        let names: Vec<&str> = discovered.iter().map(|t| t.name.as_str()).collect();
        info!(server = %label, tools = ?names, "connected to tool server");

        self.connections.push(ServerConnection {
            label,
            client: Mutex::new(client),
            tools: discovered.clone(),
        });
        Ok(discovered)
    }

    async fn handshake(client: &mut MCPClient) -> Result<Vec<ToolDescriptor>> {
        client.initialize().await?;
        client.list_tools().await
    }

    /// Tools the model may call, first owner of each name only.
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        let mut seen = std::collections::HashSet::new();
        self.connections
            .iter()
            .flat_map(|c| c.tools.iter())
            .filter(|t| seen.insert(t.name.as_str()))
            .cloned()
            .collect()
    }

    pub fn server_count(&self) -> usize {
        self.connections.len()
    }

    fn route(&self, tool_name: &str) -> Option<&ServerConnection> {
        self.connections
            .iter()
            .find(|c| c.tools.iter().any(|t| t.name == tool_name))
    }

    /// Run one query and return the text to show the user.
    ///
    /// `None` means the model gave no usable answer and nothing was recorded.
    pub async fn process_query(&mut self, query: &str) -> Option<String> {
        self.query(query).await.into_reply()
    }

    /// Run one query.
    ///
    /// The user turn is only committed together with the turn that answers
    /// it: a successful reply, or an error description.
    pub async fn query(&mut self, query: &str) -> QueryOutcome {
        info!(chars = query.len(), "processing query");
        match self.resolve_reply(query).await {
            Ok(Some(reply)) => {
                self.conversation.commit(query, reply.clone());
                QueryOutcome::Committed(reply)
            }
            Ok(None) => {
                warn!("model returned no usable reply, discarding the query");
                QueryOutcome::RolledBack
            }
            Err(e) => {
                error!(error = %e, category = ?e.category(), "query failed");
                let text = format!("There was an error processing your request:\n{e}");
                self.conversation.commit(query, text.clone());
                QueryOutcome::Failed(text)
            }
        }
    }

    /// Call a tool directly, bypassing the model.
    pub async fn manual_tool_call(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolInvocationResult> {
        let connection = self.route(tool_name).ok_or_else(|| {
            BridgeError::Validation(format!("No connected server provides tool '{tool_name}'"))
        })?;
        debug!(tool = tool_name, server = %connection.label, "manual tool call");
        connection
            .client
            .lock()
            .await
            .call_tool(tool_name, arguments)
            .await
    }

    /// Close every server connection. Safe with none or some already closed.
    pub async fn cleanup(&mut self) {
        for connection in self.connections.drain(..) {
            let mut client = connection.client.into_inner();
            match client.close().await {
                Ok(()) => debug!(server = %connection.label, "closed tool server"),
                Err(e) => warn!(server = %connection.label, error = %e, "error closing tool server"),
            }
        }
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        let tools = self.tools();
        if tools.is_empty() {
            None
        } else {
            Some(tools.iter().map(ToolDefinition::from).collect())
        }
    }

    /// Model/tool loop for one query. `Ok(None)` means an empty reply.
    async fn resolve_reply(&mut self, query: &str) -> Result<Option<String>> {
        let mut messages: Vec<ModelMessage> = Vec::with_capacity(self.conversation.len() + 2);
        if let Some(prompt) = &self.options.system_prompt {
            messages.push(ModelMessage::system(prompt.clone()));
        }
        messages.extend(self.conversation.turns().iter().cloned());
        messages.push(ModelMessage::user(query));

        let tool_defs = self.tool_definitions();
        let max_iterations = self.options.max_tool_iterations;

        for iteration in 0..=max_iterations {
            let offer_tools = iteration < max_iterations;
            let request = ProviderRequest {
                messages: messages.clone(),
                settings: self.options.settings.clone(),
                tools: if offer_tools { tool_defs.clone() } else { None },
            };

            debug!(iteration, offer_tools, "calling model");
            let response = with_timeout(
                self.options.model_timeout,
                self.provider.generate_text(&request),
            )
            .await?;
            self.usage.merge(&response.usage);

            if response.tool_calls.is_empty() || !offer_tools {
                if !response.tool_calls.is_empty() {
                    warn!(iteration, "tool budget spent, ignoring further tool calls");
                }
                let reply = response.text.trim();
                return Ok((!reply.is_empty()).then(|| reply.to_string()));
            }

            messages.push(ModelMessage::assistant_tool_calls(
                &response.text,
                &response.tool_calls,
            ));
            let results = self.dispatch_all(&response.tool_calls).await?;
            messages.extend(results.into_iter().map(ModelMessage::tool_result));
        }

        Ok(None)
    }

    /// Run one round of tool calls. Results keep the order of the calls.
    ///
    /// Calls for the same server queue on its lock in order; calls for
    /// different servers overlap. A transport failure aborts the round.
    async fn dispatch_all(&self, calls: &[AgentToolCall]) -> Result<Vec<AgentToolResult>> {
        let outcomes = join_all(calls.iter().map(|call| self.dispatch(call))).await;
        calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| {
                let result = outcome?;
                Ok(AgentToolResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result: result.to_model_value(),
                    is_error: !result.is_success(),
                })
            })
            .collect()
    }

    async fn dispatch(&self, call: &AgentToolCall) -> Result<ToolInvocationResult> {
        let Some(connection) = self.route(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return Ok(ToolInvocationResult::failure(format!(
                "Unknown tool '{}'",
                call.name
            )));
        };

        debug!(tool = %call.name, server = %connection.label, "dispatching tool call");
        let result = connection
            .client
            .lock()
            .await
            .call_tool(&call.name, call.arguments.clone())
            .await;
        match result {
            Ok(r) => {
                if !r.is_success() {
                    warn!(tool = %call.name, message = %r.text(), "tool reported failure");
                }
                Ok(r)
            }
            // Arguments the model mangled never left the client; let it retry.
            Err(BridgeError::InvalidArgument(message)) => {
                warn!(tool = %call.name, %message, "unusable tool arguments");
                Ok(ToolInvocationResult::failure(message))
            }
            Err(e) => {
                error!(tool = %call.name, error = %e, "tool call failed");
                Err(e)
            }
        }
    }
}
