// ABOUTME: Test utilities for switchboard-agent: a scripted model backend and in-memory tools.
// ABOUTME: Used in tests to drive agents and supervisors without real providers or MCP servers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{CapabilityDescriptor, InvocationError, Message, Tool, ToolSource};

use crate::runtime::{BackendError, BackendResponse, CompletionRequest, ModelBackend};

/// What a ScriptedBackend saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub instructions: String,
    pub capabilities: Vec<String>,
    pub conversation: Vec<Message>,
}

type Responder = dyn Fn(&CompletionRequest<'_>) -> Result<BackendResponse, BackendError> + Send + Sync;

/// A model backend whose replies come from a closure. Every request is
/// recorded so tests can assert on what the agent submitted.
pub struct ScriptedBackend {
    responder: Box<Responder>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    /// Reply by calling `responder` with each request.
    pub fn new(
        responder: impl Fn(&CompletionRequest<'_>) -> Result<BackendResponse, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Reply with each response in order, then fail once the script runs out.
    pub fn sequence(responses: Vec<BackendResponse>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .map_err(|_| BackendError::ProviderError("script lock poisoned".to_string()))?
                .pop_front()
                .ok_or_else(|| BackendError::ProviderError("script exhausted".to_string()))
        })
    }

    /// Always reply with the same final text.
    pub fn text(text: &str) -> Arc<Self> {
        let text = text.to_owned();
        Self::new(move |_| Ok(BackendResponse::text(text.clone())))
    }

    /// Sleep before every reply. Useful for timeout and cancellation tests.
    pub fn delayed(
        delay: Duration,
        responder: impl Fn(&CompletionRequest<'_>) -> Result<BackendResponse, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            delay: Some(delay),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<BackendResponse, BackendError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                instructions: request.instructions.to_owned(),
                capabilities: request.capabilities.iter().map(|c| c.name.clone()).collect(),
                conversation: request.conversation.to_vec(),
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(request)
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

type Handler = dyn Fn(&Value) -> Result<String, InvocationError> + Send + Sync;

/// An in-memory tool with a fixed descriptor and a handler closure.
/// Records the arguments of every invocation.
pub struct StaticTool {
    descriptor: CapabilityDescriptor,
    handler: Box<Handler>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Value>>,
}

impl StaticTool {
    pub fn new(
        name: &str,
        handler: impl Fn(&Value) -> Result<String, InvocationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                name,
                format!("Test tool {}", name),
                json!({"type": "object", "properties": {}}),
            ),
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A tool that always succeeds with `output`.
    pub fn ok(name: &str, output: &str) -> Self {
        let output = output.to_owned();
        Self::new(name, move |_| Ok(output.clone()))
    }

    /// A tool that always fails with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        let message = message.to_owned();
        Self::new(name, move |_| Err(InvocationError::new(message.clone())))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: Value) -> Result<String, InvocationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(arguments.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&arguments)
    }
}

/// A ToolSource over in-memory tools that remembers how often it was closed.
pub struct MemoryToolSource {
    tools: Vec<Arc<dyn Tool>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MemoryToolSource {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Arc<Self> {
        Arc::new(Self {
            tools,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolSource for MemoryToolSource {
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_replays_then_exhausts() {
        let backend = ScriptedBackend::sequence(vec![
            BackendResponse::call("get_issue", json!({"key": "A-1"})),
            BackendResponse::text("done"),
        ]);
        let conversation = vec![Message::user("hi")];
        let request = CompletionRequest {
            instructions: "test",
            capabilities: &[],
            conversation: &conversation,
        };

        assert!(!backend.complete(&request).await.unwrap().is_final());
        assert!(backend.complete(&request).await.unwrap().is_final());
        assert!(backend.complete(&request).await.is_err());
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.requests()[0].instructions, "test");
    }

    #[tokio::test]
    async fn static_tool_records_arguments() {
        let tool = StaticTool::ok("get_issue", "{\"status\":\"Open\"}");
        let out = tool.invoke(json!({"key": "A-1"})).await.unwrap();
        assert_eq!(out, "{\"status\":\"Open\"}");
        assert_eq!(tool.calls(), vec![json!({"key": "A-1"})]);

        let failing = StaticTool::failing("get_issue", "not found");
        assert_eq!(failing.invoke(json!({})).await.unwrap_err().message, "not found");
    }

    #[tokio::test]
    async fn memory_source_tracks_close() {
        let source = MemoryToolSource::new(vec![Arc::new(StaticTool::ok("a", "x"))]);
        assert_eq!(source.tools().len(), 1);
        source.close().await;
        source.close().await;
        assert!(source.is_closed());
        assert_eq!(source.close_calls(), 2);
    }
}
