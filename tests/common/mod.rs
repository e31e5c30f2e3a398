//! Shared test helpers: a scripted model provider and in-process tool servers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use deckbridge::error::{BridgeError, Result};
use deckbridge::mcp::{memory_pair, MemoryTransport, ToolServer};
use deckbridge::provider::{ModelProvider, ProviderRequest, ProviderResponse};
use deckbridge::session::SessionContext;
use deckbridge::slides::{slides_registry, MemorySlides};
use deckbridge::tools::ToolRegistry;
use deckbridge::types::*;

pub const ACME_CSV: &str = "Name,ARR\nAcme,100\nGlobex,250";

/// A provider that replays queued replies and records every request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderResponse>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a plain text reply.
    pub fn queue_text(&self, text: &str) {
        self.push(Ok(ProviderResponse {
            text: text.to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
            },
            tool_calls: vec![],
            finish_reason: Some(FinishReason::Stop),
        }));
    }

    /// Queue a reply requesting one tool call.
    pub fn queue_tool_call(&self, name: &str, args: serde_json::Value) {
        self.queue_tool_calls(&[(name, args)]);
    }

    /// Queue a reply requesting several tool calls at once.
    pub fn queue_tool_calls(&self, calls: &[(&str, serde_json::Value)]) {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| AgentToolCall {
                id: format!("call-{i}-{name}"),
                name: name.to_string(),
                arguments: args.clone(),
            })
            .collect();
        self.push(Ok(ProviderResponse {
            text: String::new(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
            tool_calls,
            finish_reason: Some(FinishReason::ToolCalls),
        }));
    }

    pub fn queue_error(&self, error: BridgeError) {
        self.push(Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests().pop().expect("provider was never called")
    }

    fn push(&self, reply: Result<ProviderResponse>) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ProviderResponse {
                    text: "Mock response".to_string(),
                    ..Default::default()
                })
            })
    }
}

/// A tool server running on a background task.
pub struct RunningServer {
    pub transport: MemoryTransport,
    pub session: SessionContext,
    pub handle: JoinHandle<Result<()>>,
}

/// Serve `registry` in-process; the returned transport is the client end.
pub fn spawn_server(registry: ToolRegistry) -> RunningServer {
    let (client_end, mut server_end) = memory_pair();
    let session = SessionContext::new();
    let server = ToolServer::new(registry, session.clone()).with_info("test-server", "0.0.0");
    let handle = tokio::spawn(async move { server.serve(&mut server_end).await });
    RunningServer {
        transport: client_end,
        session,
        handle,
    }
}

/// The presentation toolset over an in-memory backend.
pub fn spawn_slides_server() -> (RunningServer, Arc<MemorySlides>) {
    let backend = Arc::new(MemorySlides::new());
    let running = spawn_server(slides_registry(backend.clone()));
    (running, backend)
}

/// Text of the last tool result the orchestrator fed back to the model.
pub fn last_tool_result(request: &ProviderRequest) -> Option<AgentToolResult> {
    request
        .messages
        .iter()
        .rev()
        .flat_map(|m| m.content.iter())
        .find_map(|part| match part {
            ContentPart::ToolResult(result) => Some(result.clone()),
            _ => None,
        })
}
