//! Google Gemini API provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::BridgeError;
use crate::types::*;

use super::http::{api_key_headers, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest, ProviderResponse, ToolDefinition};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Schema keywords the Gemini function-declaration dialect rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties", "$defs", "default"];

pub struct GeminiProvider {
    model_id: String,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(model_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let mut system_instruction = None;
        let mut contents: Vec<Value> = Vec::new();
        let mut open_function_responses = false;

        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    system_instruction = Some(json!({ "parts": [{ "text": msg.text() }] }));
                }
                Role::User => {
                    contents.push(json!({ "role": "user", "parts": [{ "text": msg.text() }] }));
                }
                Role::Assistant => {
                    contents.push(json!({ "role": "model", "parts": model_parts(&msg.content) }));
                }
                Role::Tool => {
                    let responses: Vec<Value> = msg
                        .content
                        .iter()
                        .filter_map(|part| match part {
                            ContentPart::ToolResult(result) => Some(function_response(result)),
                            _ => None,
                        })
                        .collect();
                    // Results of one model turn share a single content entry.
                    let previous = contents
                        .last_mut()
                        .filter(|_| open_function_responses)
                        .and_then(|last| last["parts"].as_array_mut());
                    match previous {
                        Some(parts) => parts.extend(responses),
                        None => contents.push(json!({ "role": "user", "parts": responses })),
                    }
                }
            }
            open_function_responses = msg.role == Role::Tool;
        }

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(contents));
        if let Some(sys) = system_instruction {
            body.insert("systemInstruction".into(), sys);
        }

        let mut gen_config = Map::new();
        if let Some(max) = request.settings.max_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = request.settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = request.settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if let Some(ref stops) = request.settings.stop_sequences {
            gen_config.insert("stopSequences".into(), json!(stops));
        }
        if !gen_config.is_empty() {
            body.insert("generationConfig".into(), Value::Object(gen_config));
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
            let declarations: Vec<Value> = tools.iter().map(function_declaration).collect();
            body.insert(
                "tools".into(),
                json!([{ "functionDeclarations": declarations }]),
            );
        }

        Value::Object(body)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, BridgeError> {
        let body = self.build_request_body(request);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);

        debug!(
            model = %self.model_id,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Gemini generate_text"
        );

        let resp = shared_client()
            .post(&url)
            .headers(api_key_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: GeminiResponse = resp.json().await?;
        Ok(parse_response(data))
    }
}

fn model_parts(content: &[ContentPart]) -> Vec<Value> {
    content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({ "text": text })),
            ContentPart::ToolCall(call) => Some(json!({
                "functionCall": { "name": call.name, "args": call.arguments }
            })),
            ContentPart::ToolResult(_) => None,
        })
        .collect()
}

fn function_response(result: &AgentToolResult) -> Value {
    // Gemini requires the response to be an object.
    let response = match &result.result {
        Value::Object(_) => result.result.clone(),
        other => json!({ "content": other }),
    };
    json!({ "functionResponse": { "name": result.tool_name, "response": response } })
}

fn function_declaration(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": gemini_schema(&tool.parameters),
    })
}

/// Strip schema keywords Gemini does not accept, recursively.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

fn parse_response(data: GeminiResponse) -> ProviderResponse {
    let usage = data
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    // A blocked prompt comes back without candidates: treat it as an empty reply.
    let Some(candidate) = data.candidates.into_iter().next() else {
        return ProviderResponse {
            usage,
            finish_reason: Some(FinishReason::ContentFilter),
            ..Default::default()
        };
    };

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(fc) = part.function_call {
            tool_calls.push(AgentToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: fc.name,
                arguments: fc.args.unwrap_or_else(|| json!({})),
            });
        }
    }

    let finish_reason = if !tool_calls.is_empty() {
        Some(FinishReason::ToolCalls)
    } else {
        match candidate.finish_reason.as_deref() {
            Some("STOP") => Some(FinishReason::Stop),
            Some("MAX_TOKENS") => Some(FinishReason::Length),
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => Some(FinishReason::ContentFilter),
            Some(_) => Some(FinishReason::Error),
            None => None,
        }
    };

    ProviderResponse {
        text,
        usage,
        tool_calls,
        finish_reason,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
