// ABOUTME: Anthropic Claude API adapter implementing the ModelBackend trait.
// ABOUTME: Translates conversations into Messages API calls and parses tool_use blocks back.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{CapabilityCall, Message};

use crate::providers::{check_status, transport_error};
use crate::runtime::{BackendError, BackendResponse, CompletionRequest, ModelBackend};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Claude runtime adapter. Calls the Messages API with capability
/// descriptors as tools and maps tool_use blocks back to capability calls.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl AnthropicBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ProviderError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }

    /// Build the JSON request body for the Anthropic Messages API.
    pub fn build_request_body(&self, request: &CompletionRequest<'_>) -> Value {
        let mut messages = Vec::new();

        for message in request.conversation {
            match message {
                Message::User { content } => messages.push(json!({
                    "role": "user",
                    "content": [{"type": "text", "text": content}]
                })),
                Message::Assistant { text, calls } => {
                    let mut blocks = Vec::new();
                    if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                    for call in calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments
                        }));
                    }
                    if !blocks.is_empty() {
                        messages.push(json!({"role": "assistant", "content": blocks}));
                    }
                }
                Message::CapabilityResult {
                    call_id,
                    content,
                    is_error,
                    ..
                } => messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": call_id,
                        "content": content,
                        "is_error": is_error
                    }]
                })),
            }
        }

        // Parallel tool results arrive as separate user turns.
        let messages = coalesce_messages(messages);

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": messages
        });

        if !request.instructions.is_empty() {
            body["system"] = json!(request.instructions);
        }

        if !request.capabilities.is_empty() {
            body["tools"] = Value::Array(
                request
                    .capabilities
                    .iter()
                    .map(|c| {
                        json!({
                            "name": c.name,
                            "description": c.description,
                            "input_schema": c.parameters
                        })
                    })
                    .collect(),
            );
        }

        body
    }

    /// Parse an Anthropic Messages API response into a BackendResponse.
    pub fn parse_response(response_body: &Value) -> Result<BackendResponse, BackendError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                BackendError::InvalidResponse("missing content array in response".to_string())
            })?;

        let mut text_parts = Vec::new();
        let mut calls = Vec::new();

        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("tool_use") => calls.push(parse_tool_use(block)?),
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str())
                        && !text.is_empty()
                    {
                        text_parts.push(text);
                    }
                }
                _ => {}
            }
        }

        let text = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };

        Ok(BackendResponse { text, calls })
    }
}

fn parse_tool_use(block: &Value) -> Result<CapabilityCall, BackendError> {
    let id = block
        .get("id")
        .and_then(|i| i.as_str())
        .ok_or_else(|| BackendError::InvalidResponse("tool_use block missing id".to_string()))?;
    let name = block
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| BackendError::InvalidResponse("tool_use block missing name".to_string()))?;

    Ok(CapabilityCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: block.get("input").cloned().unwrap_or(json!({})),
    })
}

/// Coalesce consecutive messages with the same role by concatenating their
/// content blocks. The Anthropic API requires alternating user/assistant turns.
fn coalesce_messages(messages: Vec<Value>) -> Vec<Value> {
    let mut result: Vec<Value> = Vec::new();

    for msg in messages {
        if let Some(last) = result.last_mut()
            && last.get("role") == msg.get("role")
            && let (Some(prev), Some(next)) = (
                last.get_mut("content").and_then(|c| c.as_array_mut()),
                msg.get("content").and_then(|c| c.as_array()),
            )
        {
            prev.extend(next.iter().cloned());
            continue;
        }
        result.push(msg);
    }

    result
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<BackendResponse, BackendError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let response = check_status(response, "ANTHROPIC_API_KEY").await?;

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("failed to parse JSON: {}", e)))?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
