// ABOUTME: OpenAI-compatible Chat Completions adapter implementing the ModelBackend trait.
// ABOUTME: Serves the azure, github, ollama and openai profiles with function calling.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{CapabilityCall, Message};

use crate::providers::{check_status, transport_error};
use crate::runtime::{BackendError, BackendResponse, CompletionRequest, ModelBackend};

const MAX_TOKENS: u32 = 4096;

/// How the adapter authenticates.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `api-key: <key>`, as Azure OpenAI expects.
    ApiKeyHeader(String),
    None,
}

/// Chat Completions runtime adapter. Sends capability descriptors as
/// function tools and maps `tool_calls` back to capability calls.
pub struct OpenAiBackend {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    model: String,
    auth: Auth,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        auth: Auth,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ProviderError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            auth,
            timeout,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": request.instructions
        })];

        for message in request.conversation {
            messages.push(match message {
                Message::User { content } => json!({
                    "role": "user",
                    "content": content
                }),
                Message::Assistant { text, calls } => {
                    let mut msg = json!({
                        "role": "assistant",
                        "content": text
                    });
                    if !calls.is_empty() {
                        msg["tool_calls"] = Value::Array(calls.iter().map(tool_call_json).collect());
                    }
                    msg
                }
                Message::CapabilityResult {
                    call_id,
                    content,
                    is_error,
                    ..
                } => json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": if *is_error { format!("Error: {}", content) } else { content.clone() }
                }),
            });
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages
        });

        if !request.capabilities.is_empty() {
            body["tools"] = Value::Array(
                request
                    .capabilities
                    .iter()
                    .map(|c| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "description": c.description,
                                "parameters": c.parameters
                            }
                        })
                    })
                    .collect(),
            );
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// Parse a Chat Completions response into a BackendResponse.
    pub fn parse_response(response_body: &Value) -> Result<BackendResponse, BackendError> {
        let choice = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                BackendError::InvalidResponse("missing choices array in response".to_string())
            })?
            .first()
            .ok_or_else(|| BackendError::InvalidResponse("empty choices array".to_string()))?;

        let message = choice.get("message").ok_or_else(|| {
            BackendError::InvalidResponse("missing message in choice".to_string())
        })?;

        let calls = match message.get("tool_calls").and_then(|t| t.as_array()) {
            Some(tool_calls) => tool_calls
                .iter()
                .enumerate()
                .map(|(i, tc)| parse_tool_call(i, tc))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(String::from);

        Ok(BackendResponse { text, calls })
    }
}

fn tool_call_json(call: &CapabilityCall) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": call.arguments.to_string()
        }
    })
}

/// Parse a single tool_call entry. Arguments arrive as a JSON-encoded string.
fn parse_tool_call(index: usize, tool_call: &Value) -> Result<CapabilityCall, BackendError> {
    let function = tool_call.get("function").ok_or_else(|| {
        BackendError::InvalidResponse("tool_call missing function".to_string())
    })?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| BackendError::InvalidResponse("function missing name".to_string()))?;

    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            BackendError::InvalidResponse(format!("failed to parse function arguments: {}", e))
        })?,
        Some(other) => other.clone(),
        None => json!({}),
    };

    let id = tool_call
        .get("id")
        .and_then(|i| i.as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("call_{}", index));

    Ok(CapabilityCall {
        id,
        name: name.to_string(),
        arguments,
    })
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<BackendResponse, BackendError> {
        let body = self.build_request_body(request);

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body);
        builder = match &self.auth {
            Auth::Bearer(token) => builder.header("Authorization", format!("Bearer {}", token)),
            Auth::ApiKeyHeader(key) => builder.header("api-key", key.as_str()),
            Auth::None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let response = check_status(response, &format!("{} credentials", self.provider)).await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
