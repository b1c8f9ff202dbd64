// ABOUTME: HTTP transport: POSTs JSON-RPC messages to an MCP endpoint.
// ABOUTME: Accepts plain JSON or server-sent-event replies and tracks the Mcp-Session-Id header.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::Transport;
use crate::error::ToolError;
use crate::protocol::{self, Incoming};

const SESSION_HEADER: &str = "mcp-session-id";

/// Bound on the session DELETE sent when the transport closes.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-RPC over HTTP POST, one request per call.
pub struct HttpTransport {
    server: String,
    client: reqwest::Client,
    url: String,
    headers: BTreeMap<String, String>,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        server: &str,
        url: &str,
        headers: BTreeMap<String, String>,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ToolError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            server: server.to_string(),
            client,
            url: url.to_string(),
            headers,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        })
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    fn current_session(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolError::Closed);
        }

        let mut builder = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(session) = self.current_session() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ToolError::Transport(format!("HTTP request failed: {}", e)))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            && let Ok(mut slot) = self.session_id.lock()
        {
            *slot = Some(session.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Transport(format!(
                "server responded {}: {}",
                status, body
            )));
        }
        Ok(response)
    }
}

/// Extract the JSON payloads carried by an SSE body's `data:` lines.
fn sse_messages(body: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut data = String::new();
    for line in body.lines().chain(std::iter::once("")) {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        } else if line.is_empty() && !data.is_empty() {
            if let Ok(value) = serde_json::from_str(&data) {
                messages.push(value);
            }
            data.clear();
        }
    }
    messages
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self.post(&protocol::request(id, method, params)).await?;

        let is_sse = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);

        let messages = if is_sse {
            let body = response
                .text()
                .await
                .map_err(|e| ToolError::Transport(format!("failed to read event stream: {}", e)))?;
            sse_messages(&body)
        } else {
            let body: Value = response
                .json()
                .await
                .map_err(|e| ToolError::Protocol(format!("invalid JSON reply: {}", e)))?;
            match body {
                Value::Array(batch) => batch,
                single => vec![single],
            }
        };

        for message in &messages {
            if let Some(Incoming::Response { id: got, result }) = Incoming::classify(message)
                && got == id
            {
                return protocol::into_result(result);
            }
        }
        Err(ToolError::Protocol(format!(
            "no response for request {} ({}) from '{}'",
            id, method, self.server
        )))
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ToolError> {
        self.post(&protocol::notification(method, params)).await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(session) = self.current_session() {
            let result = self
                .client
                .delete(&self.url)
                .header(SESSION_HEADER, session)
                .timeout(self.close_timeout)
                .send()
                .await;
            if let Err(e) = result {
                tracing::debug!(server = %self.server, error = %e, "session delete failed");
            }
        }
        tracing::info!(server = %self.server, "closed tool server session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_sse_data_lines() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n: keep-alive\n\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\n";
        let messages = sse_messages(body);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["id"], 1);
    }

    #[tokio::test]
    async fn request_returns_matching_result_and_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "sess-42")
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"protocolVersion": "2024-11-05"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("mcp-session-id", "sess-42"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 2, "result": {"tools": []}})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new("remote", &server.uri(), BTreeMap::new()).unwrap();
        let init = transport
            .request("initialize", protocol::initialize_params())
            .await
            .unwrap();
        assert_eq!(init["protocolVersion"], "2024-11-05");

        let tools = transport.request("tools/list", json!({})).await.unwrap();
        assert!(tools["tools"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rpc_error_and_http_error_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "unknown tool"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "broken"})))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new("remote", &server.uri(), BTreeMap::new()).unwrap();
        let err = transport.request("tools/call", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Rpc { code: -32602, .. }));

        let err = transport.request("broken", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("500"), "got: {}", err);
    }

    #[tokio::test]
    async fn close_gives_up_on_a_slow_session_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "s1")
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(header("mcp-session-id", "s1"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(8)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new("remote", &server.uri(), BTreeMap::new())
            .unwrap()
            .with_close_timeout(Duration::from_millis(200));
        transport
            .request("initialize", protocol::initialize_params())
            .await
            .unwrap();

        let started = std::time::Instant::now();
        transport.close().await;
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "close took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn closed_transport_rejects_requests() {
        let transport =
            HttpTransport::new("remote", "http://127.0.0.1:9/mcp", BTreeMap::new()).unwrap();
        transport.close().await;
        let err = transport.request("tools/list", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Closed));
    }
}
