// ABOUTME: Defines the ModelBackend trait that all LLM provider adapters implement.
// ABOUTME: Also defines the completion request/response shapes and BackendError.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_core::{CapabilityCall, CapabilityDescriptor, Message};

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub instructions: &'a str,
    pub capabilities: &'a [CapabilityDescriptor],
    pub conversation: &'a [Message],
}

/// What the model produced: optional text plus zero or more capability calls.
/// A response with no calls is a final answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackendResponse {
    pub text: Option<String>,
    pub calls: Vec<CapabilityCall>,
}

impl BackendResponse {
    /// A final answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            calls: Vec::new(),
        }
    }

    /// A single capability call with a generated id.
    pub fn call(name: impl Into<String>, arguments: Value) -> Self {
        let name = name.into();
        Self {
            text: None,
            calls: vec![CapabilityCall {
                id: format!("call_{}", name),
                name,
                arguments,
            }],
        }
    }

    pub fn is_final(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Errors that can occur while talking to a model provider.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl From<BackendError> for switchboard_core::Error {
    fn from(err: BackendError) -> Self {
        switchboard_core::Error::Backend(err.to_string())
    }
}

/// Trait that all LLM provider adapters must implement. Each provider
/// translates a CompletionRequest into its API and parses the reply into a
/// BackendResponse.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<BackendResponse, BackendError>;

    /// Provider name for logging (e.g. "github", "ollama").
    fn provider_name(&self) -> &str;

    /// Model identifier in use.
    fn model_name(&self) -> &str;
}
