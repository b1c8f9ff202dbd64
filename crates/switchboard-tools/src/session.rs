// ABOUTME: One initialized MCP session: handshake, paginated tool listing and tool calls.
// ABOUTME: Every request is bounded by a timeout so a silent server cannot hang a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use switchboard_core::{CapabilityDescriptor, InvocationError};

use crate::config::ServerConfig;
use crate::error::ToolError;
use crate::protocol::{self, CallToolResult, ListToolsResult};
use crate::transport::{self, Transport};

/// Upper bound on `tools/list` pages, guarding against a server that keeps
/// returning a cursor.
const MAX_LIST_PAGES: usize = 100;

/// A live, initialized connection to a single MCP server.
pub struct McpSession {
    server: String,
    transport: Box<dyn Transport>,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl McpSession {
    /// Connect and run the `initialize` handshake within `connect_timeout`.
    /// The transport is closed again if the handshake does not complete.
    pub async fn open(
        server: &str,
        config: &ServerConfig,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ToolError> {
        let transport = transport::connect(server, &config.transport)?;
        let session = Self {
            server: server.to_string(),
            transport,
            request_timeout,
            closed: AtomicBool::new(false),
        };

        match tokio::time::timeout(connect_timeout, session.handshake()).await {
            Ok(Ok(())) => Ok(session),
            Ok(Err(e)) => {
                session.close().await;
                Err(ToolError::Handshake(format!("server '{}': {}", server, e)))
            }
            Err(_) => {
                session.close().await;
                Err(ToolError::Handshake(format!(
                    "server '{}': no reply within {:?}",
                    server, connect_timeout
                )))
            }
        }
    }

    async fn handshake(&self) -> Result<(), ToolError> {
        let init = self
            .transport
            .request("initialize", protocol::initialize_params())
            .await?;
        let version = init
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        tracing::debug!(server = %self.server, protocol_version = version, "initialized tool server");
        self.transport
            .notify("notifications/initialized", json!({}))
            .await
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        if self.is_closed() {
            return Err(ToolError::Closed);
        }
        tokio::time::timeout(self.request_timeout, self.transport.request(method, params))
            .await
            .map_err(|_| ToolError::Timeout(self.request_timeout))?
    }

    /// List every tool the server offers, following `nextCursor`.
    pub async fn list_tools(&self) -> Result<Vec<CapabilityDescriptor>, ToolError> {
        let mut descriptors = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?).map_err(
                    |e| ToolError::Protocol(format!("invalid tools/list result: {}", e)),
                )?;
            descriptors.extend(page.tools.into_iter().map(|t| t.into_descriptor()));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(descriptors),
            }
        }

        Err(ToolError::Protocol(format!(
            "server '{}' kept paginating past {} pages",
            self.server, MAX_LIST_PAGES
        )))
    }

    /// Call a tool. Remote errors, `isError` results and timeouts all come
    /// back as `InvocationError`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, InvocationError> {
        let raw = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
            .map_err(|e| InvocationError::new(e.to_string()))?;

        let result: CallToolResult = serde_json::from_value(raw)
            .map_err(|e| InvocationError::new(format!("invalid tools/call result: {}", e)))?;

        let text = result.text();
        if result.is_error {
            Err(InvocationError::new(if text.is_empty() {
                format!("tool '{}' reported an error", name)
            } else {
                text
            }))
        } else {
            Ok(text)
        }
    }

    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.close().await;
    }
}
