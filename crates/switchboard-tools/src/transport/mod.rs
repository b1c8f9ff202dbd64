// ABOUTME: Transport seam for MCP sessions: one JSON-RPC request/response channel per server.
// ABOUTME: Concrete transports are a stdio subprocess and an HTTP endpoint.

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TransportConfig;
use crate::error::ToolError;

/// A bidirectional JSON-RPC channel to one MCP server. Implementations must
/// allow concurrent `request` calls from multiple tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its matching response.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: Value) -> Result<(), ToolError>;

    /// Tear the channel down. Pending and later requests fail with `Closed`.
    async fn close(&self);
}

/// Establish the transport described by `config` for the named server.
pub fn connect(server: &str, config: &TransportConfig) -> Result<Box<dyn Transport>, ToolError> {
    match config {
        TransportConfig::Stdio { command, args, env } => Ok(Box::new(StdioTransport::spawn(
            server, command, args, env,
        )?)),
        TransportConfig::Http { url, headers } => {
            Ok(Box::new(HttpTransport::new(server, url, headers.clone())?))
        }
    }
}
